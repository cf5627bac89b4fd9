/// ResponseConsole: holds the one timestamped record describing the most
/// recent action.
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{ActionError, ErrorKind};

pub const IDLE_PLACEHOLDER: &str = "ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Idle,
    Running,
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleRecord {
    /// None only for the idle placeholder.
    pub timestamp: Option<DateTime<Utc>>,
    pub title: String,
    pub body: String,
    pub state: RecordState,
    pub error_kind: Option<ErrorKind>,
}

impl ConsoleRecord {
    fn idle() -> Self {
        Self {
            timestamp: None,
            title: String::new(),
            body: IDLE_PLACEHOLDER.to_string(),
            state: RecordState::Idle,
            error_kind: None,
        }
    }

    fn stamped(title: String, body: &Value, state: RecordState, error_kind: Option<ErrorKind>) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            title,
            body: pretty(body),
            state,
            error_kind,
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.state == RecordState::Running
    }

    /// `kind: <label>` for error records.
    pub fn kind_line(&self) -> Option<String> {
        self.error_kind.map(|k| format!("kind: {}", k.label()))
    }
}

impl fmt::Display for ConsoleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(ts) = self.timestamp else {
            return f.write_str(&self.body);
        };
        writeln!(f, "[{}] {}", ts.to_rfc3339_opts(SecondsFormat::Millis, true), self.title)?;
        if let Some(kind) = self.kind_line() {
            writeln!(f, "{kind}")?;
        }
        write!(f, "\n{}", self.body)
    }
}

fn pretty(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[derive(Debug)]
pub struct ResponseConsole {
    record: ConsoleRecord,
}

impl Default for ResponseConsole {
    fn default() -> Self {
        Self { record: ConsoleRecord::idle() }
    }
}

impl ResponseConsole {
    pub fn record(&self) -> &ConsoleRecord {
        &self.record
    }

    pub fn post_running(&mut self, title: &str) {
        self.record = ConsoleRecord::stamped(
            title.to_string(),
            &serde_json::json!({ "status": "running" }),
            RecordState::Running,
            None,
        );
    }

    pub fn post_success(&mut self, title: &str, body: &Value) {
        self.record = ConsoleRecord::stamped(title.to_string(), body, RecordState::Ok, None);
    }

    pub fn post_error(&mut self, title: &str, err: &ActionError) {
        self.record = ConsoleRecord::stamped(
            format!("{title} (ERROR)"),
            &err.to_record_body(),
            RecordState::Error,
            Some(err.kind()),
        );
    }

    pub fn clear(&mut self) {
        self.record = ConsoleRecord::idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let console = ResponseConsole::default();
        assert_eq!(console.record().state, RecordState::Idle);
        assert_eq!(console.record().to_string(), "ready");
        assert!(!console.record().is_running());
    }

    #[test]
    fn test_running_then_success() {
        let mut console = ResponseConsole::default();
        console.post_running("GET /healthz");
        assert!(console.record().is_running());
        assert!(console.record().body.contains("running"));

        console.post_success("GET /healthz", &serde_json::json!({"status": 200}));
        let rec = console.record();
        assert_eq!(rec.state, RecordState::Ok);
        assert!(rec.to_string().contains("] GET /healthz\n\n{"));
    }

    #[test]
    fn test_error_record_carries_kind() {
        let mut console = ResponseConsole::default();
        console.post_error("GET /stacks/{stack_id}", &ActionError::validation("stack_id is required"));
        let rec = console.record();
        assert_eq!(rec.state, RecordState::Error);
        assert_eq!(rec.error_kind, Some(ErrorKind::Validation));
        assert_eq!(rec.title, "GET /stacks/{stack_id} (ERROR)");
        assert!(rec.body.contains("stack_id is required"));
        assert!(rec.to_string().contains("(ERROR)\nkind: validation\n\n{"));
    }

    #[test]
    fn test_error_kinds_render_differently() {
        let mut console = ResponseConsole::default();
        console.post_error("GET /stats", &ActionError::validation("boom"));
        let validation = console.record().to_string();
        console.post_error("GET /stats", &ActionError::Transport("boom".to_string()));
        let transport = console.record().to_string();

        // Same message, same title: only the kind line tells them apart.
        assert_ne!(strip_timestamp(&validation), strip_timestamp(&transport));
        assert!(validation.contains("kind: validation"));
        assert!(transport.contains("kind: transport"));
    }

    #[test]
    fn test_success_has_no_kind_line() {
        let mut console = ResponseConsole::default();
        console.post_success("GET /stats", &serde_json::json!({}));
        assert_eq!(console.record().kind_line(), None);
        assert!(!console.record().to_string().contains("kind:"));
    }

    fn strip_timestamp(s: &str) -> &str {
        s.split_once("] ").map(|(_, rest)| rest).unwrap_or(s)
    }

    #[test]
    fn test_clear_resets_to_placeholder() {
        let mut console = ResponseConsole::default();
        console.post_success("GET /stats", &serde_json::json!({}));
        console.clear();
        assert_eq!(console.record().body, IDLE_PLACEHOLDER);
        assert_eq!(console.record().timestamp, None);
    }
}
