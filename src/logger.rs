use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::Error;
use crate::types::CommandKind;

pub enum MessageLogMode {
    Full,
    /// First poll of each device in full, then only the top-level fields
    /// whose values changed.
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_states: HashMap<i64, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_states: HashMap::new(),
        })
    }

    /// The login request is logged without its body; it carries the password.
    pub fn log_request(&mut self, method: &str, path: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, status: u16, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "path": path,
            "status": status,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, id: Uuid, device_id: i64, kind: CommandKind, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "id": id.to_string(),
            "device": device_id,
            "kind": format!("{kind:?}"),
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, device_id: i64, status: u16, body: &Value) {
        match self.mode {
            MessageLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "device": device_id,
                    "status": status,
                    "body": body,
                });
                self.write_line(&entry);
            }
            MessageLogMode::Diffed => {
                let entry = match self.previous_states.get(&device_id) {
                    None => json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "poll",
                        "device": device_id,
                        "status": status,
                        "full": true,
                        "body": body,
                    }),
                    Some(prev) => json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "poll",
                        "device": device_id,
                        "status": status,
                        "changed": changed_fields(prev, body),
                    }),
                };
                self.write_line(&entry);
                self.previous_states.insert(device_id, body.clone());
            }
        }
    }

    /// A failed fetch. The last good body stays the diff baseline.
    pub fn log_poll_failure(&mut self, device_id: i64, error: &Error) {
        let status = match error {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        };
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "poll",
            "device": device_id,
            "status": status,
            "error": error.to_string(),
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

/// Device state payloads are flat, so fields are compared whole. A field
/// missing from `current` is reported with a `null` new value.
fn changed_fields(previous: &Value, current: &Value) -> Map<String, Value> {
    let empty = Map::new();
    let prev = previous.as_object().unwrap_or(&empty);
    let curr = current.as_object().unwrap_or(&empty);

    let mut changed = Map::new();
    for (field, new) in curr {
        let old = prev.get(field).unwrap_or(&Value::Null);
        if old != new {
            changed.insert(field.clone(), json!({ "old": old, "new": new }));
        }
    }
    for (field, old) in prev {
        if !curr.contains_key(field) {
            changed.insert(field.clone(), json!({ "old": old, "new": null }));
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_omits_body() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request("POST", "/Login/ClientLogin");

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "POST");
        assert!(lines[0].get("body").is_none());
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_tracks_each_device_separately() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_poll(1, 200, &json!({"RoomTemperature": 20.0, "Power": true}));
        logger.log_poll(2, 200, &json!({"RoomTemperature": 18.0}));
        logger.log_poll(1, 200, &json!({"RoomTemperature": 20.5, "Power": true}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert_eq!(lines[1]["full"], true);
        assert_eq!(lines[1]["device"], 2);
        let changed = lines[2]["changed"].as_object().unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed["RoomTemperature"], json!({"old": 20.0, "new": 20.5}));
    }

    #[test]
    fn diffed_mode_no_changes_logs_empty_object() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        let body = json!({"Power": false});
        logger.log_poll(7, 200, &body);
        logger.log_poll(7, 200, &body);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert!(lines[1]["changed"].as_object().unwrap().is_empty());
    }

    #[test]
    fn log_command_captures_id_and_kind() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        let id = Uuid::new_v4();
        logger.log_command(id, 55, CommandKind::Power, &json!({"Power": true}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["id"], id.to_string());
        assert_eq!(lines[0]["device"], 55);
        assert_eq!(lines[0]["kind"], "Power");
    }

    #[test]
    fn changed_fields_reports_added_and_removed() {
        let changed = changed_fields(
            &json!({"Power": true, "ErrorMessage": "E1"}),
            &json!({"Power": true, "Offline": true}),
        );
        assert_eq!(changed.len(), 2);
        assert_eq!(changed["Offline"], json!({"old": null, "new": true}));
        assert_eq!(changed["ErrorMessage"], json!({"old": "E1", "new": null}));
    }

    #[test]
    fn failed_poll_is_logged_and_keeps_diff_baseline() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_poll(3, 200, &json!({"RoomTemperature": 20.0}));
        logger.log_poll_failure(3, &Error::Status { status: 401, body: String::new() });
        logger.log_poll_failure(3, &Error::Timeout);
        logger.log_poll(3, 200, &json!({"RoomTemperature": 21.0}));

        let lines = read_lines(path);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1]["status"], 401);
        assert!(lines[1]["error"].as_str().unwrap().contains("401"));
        assert!(lines[2]["status"].is_null());
        assert_eq!(lines[3]["changed"]["RoomTemperature"]["old"], 20.0);
    }
}
