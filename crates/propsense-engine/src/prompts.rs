/// Bump when either schema prompt changes shape.
pub const PROMPT_VERSION: &str = "v1";

pub const PERCEPTION_SYSTEM: &str = "\
You are a careful vision-to-JSON annotator.
Your task is to look at a scene image and output only a strict JSON object.
The JSON must contain a list of portable tabletop objects you detect, with their attributes.
Do not include explanations or extra text outside of JSON.";

pub const PERCEPTION_INSTRUCTIONS: &str = r#"Analyze this scene and return the objects as JSON with the schema:
{
  "objects": [
    {
      "id": "o1",
      "name": "cup|tray|plate|bottle|badge|utensil|other",
      "color": "blue|red|green|white|black|silver|transparent|other",
      "bbox": {"x": <0..1>, "y": <0..1>, "w": <0..1>, "h": <0..1>},
      "confidence": 0.0-1.0
    }
  ],
  "notes": "very short rationale"
}

Constraints:
- "id" must be short and unique within the list.
- Coordinates must be normalized (0..1 range), top-left anchored.
- If unsure, make a best guess and lower the confidence.
- Only include small/portable objects, not the table or walls."#;

pub const GROUNDING_SYSTEM: &str = "\
You convert natural language commands into structured robot actions.
Always select the best matching object from a provided JSON list and output a strict JSON object.
If the request is ambiguous, propose a clarifying question inside the JSON.
Do not include any extra explanation outside of JSON.";

pub const OBJECTS_HEADER: &str = "Objects detected in the scene:";
pub const QUERY_HEADER: &str = "User request:";

pub fn grounding_user_prompt(objects_json: &str, query: &str) -> String {
    format!(
        r#"{OBJECTS_HEADER}
{objects_json}

{QUERY_HEADER}
"{query}"

Return JSON with the schema:

{{
  "selection": {{
    "reason": "short explanation of why this object was chosen",
    "object_id": "oX or null if none fits"
  }},
  "action": {{
    "type": "pick_and_place|hand_over|point_at|clarify",
    "target_object_id": "oX, or null when clarifying",
    "destination": "to_user|cart|left_side|right_side|stay|unknown"
  }},
  "safety": {{
    "need_clarification": true|false,
    "message_if_any": "a short question to ask the user if clarification is needed"
  }},
  "spoken_reply": "a friendly one-sentence reply to the user"
}}

Constraints:
- Match the user request to objects by color, name, or attributes.
- If multiple objects match, set need_clarification=true and type=clarify.
- If no object fits, set need_clarification=true and type=clarify.
- The spoken_reply should be polite and natural."#
    )
}
