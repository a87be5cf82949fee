use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

/// Append-only JSONL record of one pipeline invocation.
///
/// Every line gets `event`, `invocation_id`, and `ts` first; the caller
/// payload is merged afterwards and may override them. Cloning shares the
/// underlying file and invocation id.
#[derive(Debug, Clone)]
pub struct InvocationLog {
    inner: Arc<InvocationLogInner>,
}

#[derive(Debug)]
struct InvocationLogInner {
    path: PathBuf,
    invocation_id: String,
    lock: Mutex<()>,
}

impl InvocationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_invocation_id(path, Uuid::new_v4().to_string())
    }

    pub fn with_invocation_id(path: impl Into<PathBuf>, invocation_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(InvocationLogInner {
                path: path.into(),
                invocation_id: invocation_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn invocation_id(&self) -> &str {
        &self.inner.invocation_id
    }

    pub fn record(&self, event: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut line_object = Map::new();
        line_object.insert("event".to_string(), Value::String(event.to_string()));
        line_object.insert(
            "invocation_id".to_string(),
            Value::String(self.inner.invocation_id.clone()),
        );
        line_object.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        for (key, value) in payload {
            line_object.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&line_object)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("invocation log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(line_object))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    #[test]
    fn record_writes_one_compact_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("invocation.jsonl");
        let log = InvocationLog::with_invocation_id(&path, "inv-7");

        let mut payload = EventPayload::new();
        payload.insert("objects".to_string(), json!(3));
        payload.insert("dropped".to_string(), json!(1));
        let emitted = log.record("perception_completed", payload)?;
        log.record("grounding_completed", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0])?;
        assert_eq!(first, emitted);
        assert_eq!(first["event"], json!("perception_completed"));
        assert_eq!(first["invocation_id"], json!("inv-7"));
        assert_eq!(first["dropped"], json!(1));
        DateTime::parse_from_rfc3339(first["ts"].as_str().unwrap_or(""))?;

        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(second["event"], json!("grounding_completed"));
        Ok(())
    }

    #[test]
    fn fresh_log_gets_a_uuid_invocation_id() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = InvocationLog::new(temp.path().join("invocation.jsonl"));
        Uuid::parse_str(log.invocation_id())?;
        Ok(())
    }

    #[test]
    fn payload_may_override_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = InvocationLog::with_invocation_id(temp.path().join("i.jsonl"), "inv-1");
        let mut payload = EventPayload::new();
        payload.insert("invocation_id".to_string(), json!("other"));
        let emitted = log.record("stage_failed", payload)?;
        assert_eq!(emitted["invocation_id"], json!("other"));
        Ok(())
    }
}
