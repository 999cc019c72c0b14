// Task data model and the JSON blob codec

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A single entry in the task list
///
/// Field names on the wire are `task` and `isDone` so blobs written by the
/// browser version of the list load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "task")]
    pub text: String,
    #[serde(rename = "isDone")]
    pub done: bool,
}

impl Task {
    /// Create a not-yet-done task with a fresh time-ordered id
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            done: false,
        }
    }
}

/// The task currently being edited and its unsaved text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub id: String,
    pub draft: String,
}

/// Generate a fresh task id
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Serialize the list as a JSON array, preserving order
pub fn encode(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize task list")
}

/// Decode a persisted blob, never failing
///
/// A blob that is not a JSON array decodes to an empty list. Elements that do
/// not look like a task are skipped, as are elements repeating an id seen
/// earlier in the array.
pub fn decode(blob: &str) -> Vec<Task> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(blob) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = ?e, "Persisted task list is malformed, starting empty");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(values.len());

    for (index, value) in values.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(value) {
            Ok(t) => t,
            Err(e) => {
                warn!(index, error = ?e, "Failed to parse task, skipping");
                continue;
            }
        };

        if !seen.insert(task.id.clone()) {
            warn!(index, id = %task.id, "Duplicate task id, skipping");
            continue;
        }

        tasks.push(task);
    }

    debug!(count = tasks.len(), "Decoded task list");
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, text: &str, done: bool) -> Task {
        Task {
            id: id.to_string(),
            text: text.to_string(),
            done,
        }
    }

    #[test]
    fn test_new_task_defaults() {
        let t = Task::new("water plants");
        assert_eq!(t.text, "water plants");
        assert!(!t.done);
        assert!(!t.id.is_empty());
    }

    #[test]
    fn test_new_ids_are_unique() {
        let ids: HashSet<String> = (0..100).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_task_wire_field_names() {
        let json = serde_json::to_string(&task("a", "buy milk", true)).unwrap();
        assert_eq!(json, r#"{"id":"a","task":"buy milk","isDone":true}"#);
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let tasks = vec![task("b", "second", false), task("a", "first", true), task("c", "", false)];

        let blob = encode(&tasks).unwrap();
        assert_eq!(decode(&blob), tasks);
    }

    #[test]
    fn test_decode_browser_blob() {
        let blob = r#"[{"task":"buy milk","id":"0b6f","isDone":false},{"task":"call mum","id":"77aa","isDone":true}]"#;

        let tasks = decode(blob);
        assert_eq!(tasks, vec![task("0b6f", "buy milk", false), task("77aa", "call mum", true)]);
    }

    #[test]
    fn test_decode_not_json() {
        assert!(decode("{not json").is_empty());
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_decode_not_an_array() {
        assert!(decode(r#"{"id":"a","task":"x","isDone":false}"#).is_empty());
        assert!(decode("null").is_empty());
    }

    #[test]
    fn test_decode_skips_placeholder_entry() {
        // The browser version seeded an empty object when nothing was stored
        let blob = r#"[{},{"task":"real","id":"r1","isDone":false}]"#;

        let tasks = decode(blob);
        assert_eq!(tasks, vec![task("r1", "real", false)]);
    }

    #[test]
    fn test_decode_drops_duplicate_ids() {
        let blob = r#"[{"task":"one","id":"x","isDone":false},{"task":"two","id":"x","isDone":true}]"#;

        let tasks = decode(blob);
        assert_eq!(tasks, vec![task("x", "one", false)]);
    }
}
