use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// One spoken-form to written-form correction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VocabEntry {
    pub spoken: String,
    pub written: String,
}

/// In-core vocabulary collaborator behind the opaque `VOCABULARY_API` RPC.
/// Entries feed the transcript cleaner as whole-word corrections.
#[derive(Debug, Default)]
pub struct VocabularyStore {
    entries: Vec<VocabEntry>,
}

impl VocabularyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|e| (e.spoken.clone(), e.written.clone()))
            .collect()
    }

    /// Execute one RPC. The payload carries `{"command": ..., "data": ...}`;
    /// unknown commands fail without side effects.
    pub fn handle(&mut self, payload: &Value) -> Value {
        let command = payload
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let data = payload.get("data").cloned().unwrap_or(Value::Null);

        match command {
            "add_entry" => match serde_json::from_value::<VocabEntry>(data) {
                Ok(entry) if !entry.spoken.trim().is_empty() => {
                    info!("vocabulary: adding {:?} -> {:?}", entry.spoken, entry.written);
                    self.entries.retain(|e| e.spoken != entry.spoken);
                    self.entries.push(entry);
                    json!({"success": true, "count": self.entries.len()})
                }
                Ok(_) => json!({"success": false, "error": "empty spoken form"}),
                Err(e) => json!({"success": false, "error": e.to_string()}),
            },
            "remove_entry" => {
                let spoken = data.get("spoken").and_then(Value::as_str).unwrap_or_default();
                let before = self.entries.len();
                self.entries.retain(|e| e.spoken != spoken);
                json!({"success": before != self.entries.len(), "count": self.entries.len()})
            }
            "list_entries" => json!({
                "success": true,
                "entries": self.entries.iter().map(|e| {
                    json!({"spoken": e.spoken, "written": e.written})
                }).collect::<Vec<_>>(),
            }),
            "clear" => {
                self.entries.clear();
                json!({"success": true, "count": 0})
            }
            other => json!({"success": false, "error": format!("unknown command: {other}")}),
        }
    }
}
