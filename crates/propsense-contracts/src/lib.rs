pub mod decision;
pub mod events;
pub mod failure;
pub mod models;
pub mod objects;
pub mod result;
