use serde_json::{json, Value};

use crate::image::ImagePayload;
use crate::oracle::{ModelOracle, OracleConfig, OracleError};
use crate::prompts::{OBJECTS_HEADER, QUERY_HEADER};

/// Offline oracle for demos and tests. Perception always reports the same
/// tabletop scene; grounding does naive keyword matching over the registry
/// JSON embedded in the prompt, so its decisions are deterministic and
/// always satisfy the decision invariants.
pub struct DryrunOracle;

impl DryrunOracle {
    pub fn new(_config: OracleConfig) -> Self {
        Self
    }

    fn scene_json() -> String {
        json!({
            "objects": [
                {
                    "id": "o1",
                    "name": "cup",
                    "color": "white",
                    "bbox": {"x": 0.12, "y": 0.38, "w": 0.08, "h": 0.12},
                    "confidence": 0.93,
                },
                {
                    "id": "o2",
                    "name": "cup",
                    "color": "red",
                    "bbox": {"x": 0.41, "y": 0.36, "w": 0.08, "h": 0.13},
                    "confidence": 0.88,
                },
                {
                    "id": "o3",
                    "name": "bottle",
                    "color": "green",
                    "bbox": {"x": 0.69, "y": 0.22, "w": 0.10, "h": 0.31},
                    "confidence": 0.81,
                },
            ],
            "notes": "dryrun tabletop scene",
        })
        .to_string()
    }

    fn split_prompt(user: &str) -> (Vec<Value>, String) {
        let objects = user
            .split_once(OBJECTS_HEADER)
            .map(|(_, tail)| tail)
            .and_then(|tail| tail.split_once(QUERY_HEADER))
            .map(|(objects_json, _)| objects_json.trim())
            .and_then(|text| serde_json::from_str::<Value>(text).ok())
            .and_then(|value| value.get("objects").and_then(Value::as_array).cloned())
            .unwrap_or_default();
        // The query occupies its own paragraph after the header, wrapped in
        // quotes by the prompt template. Cut at the paragraph break rather
        // than the closing quote so quotes inside the query survive.
        let query = user
            .split_once(QUERY_HEADER)
            .map(|(_, tail)| {
                let paragraph = tail.trim_start();
                let paragraph = paragraph.split("\n\n").next().unwrap_or(paragraph);
                paragraph.trim().trim_matches('"').to_string()
            })
            .unwrap_or_default();
        (objects, query)
    }

    fn matches(query: &str, object: &Value) -> bool {
        let name = object.get("name").and_then(Value::as_str).unwrap_or("");
        if name.is_empty() || !query.contains(name) {
            return false;
        }
        let color = object.get("color").and_then(Value::as_str).unwrap_or("");
        let colors = [
            "blue",
            "red",
            "green",
            "white",
            "black",
            "silver",
            "transparent",
        ];
        let mentioned: Vec<&str> = colors
            .iter()
            .copied()
            .filter(|candidate| query.contains(candidate))
            .collect();
        mentioned.is_empty() || mentioned.contains(&color)
    }

    fn clarify(reason: &str, message: &str) -> Value {
        json!({
            "selection": {"reason": reason, "object_id": null},
            "action": {"type": "clarify", "target_object_id": null, "destination": "unknown"},
            "safety": {"need_clarification": true, "message_if_any": message},
            "spoken_reply": message,
        })
    }

    fn decide(user: &str) -> Value {
        let (objects, raw_query) = Self::split_prompt(user);
        let query = raw_query.to_ascii_lowercase();
        if objects.is_empty() {
            return Self::clarify(
                "no objects detected in the scene",
                "I cannot see any objects right now. Could you describe where to look?",
            );
        }

        let candidates: Vec<&Value> = objects
            .iter()
            .filter(|object| Self::matches(&query, object))
            .collect();

        match candidates.as_slice() {
            [] => Self::clarify(
                "no detected object matches the request",
                "I do not see a matching object. Could you describe it differently?",
            ),
            [only] => {
                let id = only.get("id").and_then(Value::as_str).unwrap_or("o?");
                let name = only.get("name").and_then(Value::as_str).unwrap_or("object");
                let color = only.get("color").and_then(Value::as_str).unwrap_or("");
                let (action, destination) = if query.contains("hand")
                    || query.contains("give")
                    || query.contains("pass")
                {
                    ("hand_over", "to_user")
                } else if query.contains("point") || query.contains("show") {
                    ("point_at", "stay")
                } else if query.contains("cart") {
                    ("pick_and_place", "cart")
                } else if query.contains("left") {
                    ("pick_and_place", "left_side")
                } else if query.contains("right") {
                    ("pick_and_place", "right_side")
                } else {
                    ("pick_and_place", "unknown")
                };
                json!({
                    "selection": {
                        "reason": format!("only the {color} {name} matches the request"),
                        "object_id": id,
                    },
                    "action": {
                        "type": action,
                        "target_object_id": id,
                        "destination": destination,
                    },
                    "safety": {"need_clarification": false, "message_if_any": null},
                    "spoken_reply": format!("Sure, the {color} {name} it is."),
                })
            }
            several => {
                let options: Vec<String> = several
                    .iter()
                    .map(|object| {
                        format!(
                            "{} {}",
                            object.get("color").and_then(Value::as_str).unwrap_or("?"),
                            object.get("name").and_then(Value::as_str).unwrap_or("?"),
                        )
                    })
                    .collect();
                Self::clarify(
                    "multiple detected objects match the request",
                    &format!("I see more than one match: {}. Which one?", options.join(", ")),
                )
            }
        }
    }
}

impl ModelOracle for DryrunOracle {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn vision_completion(
        &self,
        _system: &str,
        _user: &str,
        _image: &ImagePayload,
    ) -> Result<String, OracleError> {
        Ok(Self::scene_json())
    }

    fn text_completion(&self, _system: &str, user: &str) -> Result<String, OracleError> {
        Ok(Self::decide(user).to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::prompts::grounding_user_prompt;

    use super::*;

    fn decide_for(objects_json: &str, query: &str) -> Value {
        DryrunOracle::decide(&grounding_user_prompt(objects_json, query))
    }

    fn scene() -> String {
        DryrunOracle::scene_json()
    }

    #[test]
    fn unique_match_hands_over() {
        let decision = decide_for(&scene(), "hand me the white cup");
        assert_eq!(decision["action"]["type"], json!("hand_over"));
        assert_eq!(decision["action"]["target_object_id"], json!("o1"));
        assert_eq!(decision["safety"]["need_clarification"], json!(false));
    }

    #[test]
    fn ambiguous_match_clarifies() {
        let decision = decide_for(&scene(), "hand me the cup");
        assert_eq!(decision["action"]["type"], json!("clarify"));
        assert_eq!(decision["action"]["target_object_id"], json!(null));
        assert_eq!(decision["safety"]["need_clarification"], json!(true));
        let message = decision["safety"]["message_if_any"].as_str().unwrap();
        assert!(message.contains("white cup"));
        assert!(message.contains("red cup"));
    }

    #[test]
    fn empty_scene_never_targets_an_object() {
        let decision = decide_for("{\"objects\": [], \"notes\": \"\"}", "hand me the cup");
        assert_eq!(decision["action"]["type"], json!("clarify"));
        assert_eq!(decision["action"]["target_object_id"], json!(null));
    }

    #[test]
    fn quotes_inside_the_query_do_not_truncate_it() {
        let decision = decide_for(&scene(), "hand me the cup. the \"white\" one please");
        assert_eq!(decision["action"]["type"], json!("hand_over"));
        assert_eq!(decision["action"]["target_object_id"], json!("o1"));
    }

    #[test]
    fn destination_keywords_steer_pick_and_place() {
        let decision = decide_for(&scene(), "put the green bottle in the cart");
        assert_eq!(decision["action"]["type"], json!("pick_and_place"));
        assert_eq!(decision["action"]["destination"], json!("cart"));
        assert_eq!(decision["action"]["target_object_id"], json!("o3"));
    }

    #[test]
    fn decisions_are_deterministic() {
        let first = decide_for(&scene(), "point at the red cup");
        let second = decide_for(&scene(), "point at the red cup");
        assert_eq!(first, second);
        assert_eq!(first["action"]["type"], json!("point_at"));
    }
}
