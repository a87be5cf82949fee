use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed category set from the perception schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectName {
    Cup,
    Tray,
    Plate,
    Bottle,
    Badge,
    Utensil,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectColor {
    Blue,
    Red,
    Green,
    White,
    Black,
    Silver,
    Transparent,
    Other,
}

/// Normalized top-left-anchored rectangle. All four fields must land in
/// `[0,1]`; out-of-range boxes invalidate the whole object rather than
/// being clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn in_range(&self) -> bool {
        [self.x, self.y, self.w, self.h]
            .iter()
            .all(|value| (0.0..=1.0).contains(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub id: String,
    pub name: ObjectName,
    pub color: ObjectColor,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

impl DetectedObject {
    fn check(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("object has an empty id".to_string());
        }
        if !self.bbox.in_range() {
            return Err(format!(
                "object '{}' has bbox coordinates outside [0,1]",
                self.id
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "object '{}' has confidence {} outside [0,1]",
                self.id, self.confidence
            ));
        }
        Ok(())
    }
}

/// Everything one perception call saw, after validation. Built once and
/// never mutated; grounding reads it, and drop accounting stays visible
/// for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRegistry {
    objects: Vec<DetectedObject>,
    notes: String,
    #[serde(skip)]
    drop_reasons: Vec<String>,
}

impl ObjectRegistry {
    /// Validates raw perception elements one by one. Elements that fail to
    /// deserialize, violate field ranges, or reuse an id are dropped with a
    /// recorded reason. An all-dropped result is an empty registry, not an
    /// error: "nothing detected" is a legitimate state.
    pub fn from_raw_parts(raw_objects: Vec<Value>, notes: String) -> Self {
        let mut objects: Vec<DetectedObject> = Vec::new();
        let mut drop_reasons = Vec::new();

        for (index, raw) in raw_objects.into_iter().enumerate() {
            let object = match serde_json::from_value::<DetectedObject>(raw) {
                Ok(object) => object,
                Err(err) => {
                    drop_reasons.push(format!("object #{index} rejected: {err}"));
                    continue;
                }
            };
            if let Err(reason) = object.check() {
                drop_reasons.push(reason);
                continue;
            }
            if objects.iter().any(|existing| existing.id == object.id) {
                drop_reasons.push(format!("object '{}' reuses an existing id", object.id));
                continue;
            }
            objects.push(object);
        }

        Self {
            objects,
            notes,
            drop_reasons,
        }
    }

    pub fn objects(&self) -> &[DetectedObject] {
        &self.objects
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.iter().any(|object| object.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&DetectedObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn dropped(&self) -> usize {
        self.drop_reasons.len()
    }

    pub fn drop_reasons(&self) -> &[String] {
        &self.drop_reasons
    }

    /// Pretty JSON used verbatim inside the grounding prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_object(id: &str, name: &str, color: &str, x: f64) -> Value {
        json!({
            "id": id,
            "name": name,
            "color": color,
            "bbox": {"x": x, "y": 0.2, "w": 0.1, "h": 0.1},
            "confidence": 0.9,
        })
    }

    #[test]
    fn valid_objects_survive_in_order() {
        let registry = ObjectRegistry::from_raw_parts(
            vec![
                raw_object("o1", "cup", "white", 0.1),
                raw_object("o2", "bottle", "green", 0.5),
            ],
            "two props".to_string(),
        );
        let ids: Vec<&str> = registry
            .objects()
            .iter()
            .map(|object| object.id.as_str())
            .collect();
        assert_eq!(ids, vec!["o1", "o2"]);
        assert_eq!(registry.notes(), "two props");
        assert_eq!(registry.dropped(), 0);
    }

    #[test]
    fn out_of_range_bbox_is_dropped_not_clamped() {
        let registry = ObjectRegistry::from_raw_parts(
            vec![
                raw_object("o1", "cup", "white", 1.4),
                raw_object("o2", "plate", "red", 0.3),
            ],
            String::new(),
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("o2"));
        assert_eq!(registry.dropped(), 1);
        assert!(registry.drop_reasons()[0].contains("o1"));
    }

    #[test]
    fn unknown_category_is_dropped() {
        let registry = ObjectRegistry::from_raw_parts(
            vec![raw_object("o1", "forklift", "red", 0.1)],
            String::new(),
        );
        assert!(registry.is_empty());
        assert_eq!(registry.dropped(), 1);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let registry = ObjectRegistry::from_raw_parts(
            vec![
                raw_object("o1", "cup", "white", 0.1),
                raw_object("o1", "cup", "blue", 0.6),
            ],
            String::new(),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("o1").unwrap().color, ObjectColor::White);
        assert_eq!(registry.dropped(), 1);
    }

    #[test]
    fn empty_id_and_bad_confidence_are_dropped() {
        let mut bad_confidence = raw_object("o2", "tray", "silver", 0.1);
        bad_confidence["confidence"] = json!(1.7);
        let registry = ObjectRegistry::from_raw_parts(
            vec![raw_object("  ", "cup", "white", 0.1), bad_confidence],
            String::new(),
        );
        assert!(registry.is_empty());
        assert_eq!(registry.dropped(), 2);
    }

    #[test]
    fn all_dropped_is_an_empty_registry() {
        let registry =
            ObjectRegistry::from_raw_parts(vec![json!("not an object")], "noise".to_string());
        assert!(registry.is_empty());
        assert_eq!(registry.dropped(), 1);
        assert_eq!(registry.notes(), "noise");
    }

    #[test]
    fn prompt_json_round_trips_through_serde() {
        let registry = ObjectRegistry::from_raw_parts(
            vec![raw_object("o1", "cup", "white", 0.1)],
            "note".to_string(),
        );
        let value: Value = serde_json::from_str(&registry.to_prompt_json()).unwrap();
        assert_eq!(value["objects"][0]["id"], json!("o1"));
        assert_eq!(value["objects"][0]["name"], json!("cup"));
        assert_eq!(value["notes"], json!("note"));
    }
}
