//! Activity events parsed from transcript lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::short_file_name;

/// Kind of activity a transcript line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The assistant invoked a tool.
    ToolStart,
    /// A user turn was recorded.
    Message,
}

/// File operation class derived from a tool name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
    Edit,
    Search,
    Bash,
}

impl Operation {
    /// Classify a tool name. Unknown tools are treated as reads.
    pub fn from_tool_name(tool_name: &str) -> Self {
        match tool_name {
            "Read" => Operation::Read,
            "Write" => Operation::Write,
            "Edit" | "MultiEdit" | "NotebookEdit" => Operation::Edit,
            "Glob" | "Grep" => Operation::Search,
            "Bash" => Operation::Bash,
            _ => Operation::Read,
        }
    }

    /// Whether the operation modifies the file.
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Write | Operation::Edit)
    }

    /// Whether the operation targets a real file rather than a pattern or command.
    pub fn is_file_operation(&self) -> bool {
        matches!(self, Operation::Read | Operation::Write | Operation::Edit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Edit => "edit",
            Operation::Search => "search",
            Operation::Bash => "bash",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed record from an agent transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Session that wrote the record.
    pub session_id: String,
    /// Producer timestamp, or ingestion time when missing.
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Real path for file tools, `pattern:<expr>` for searches, `bash:<cmd>` for shell.
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub operation: Option<Operation>,
}

impl ActivityEvent {
    /// A user-turn event.
    pub fn message(session_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            event_type: EventType::Message,
            tool_name: None,
            file_path: None,
            operation: None,
        }
    }

    /// A tool invocation event.
    pub fn tool_start(
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        tool_name: impl Into<String>,
        file_path: Option<String>,
        operation: Operation,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            event_type: EventType::ToolStart,
            tool_name: Some(tool_name.into()),
            file_path,
            operation: Some(operation),
        }
    }

    /// Whether this event touched a real file (read, write or edit).
    pub fn is_file_operation(&self) -> bool {
        self.file_path.is_some()
            && self.operation.map(|op| op.is_file_operation()).unwrap_or(false)
    }

    /// Single-line rendering: `HH:MM:SS [sess] Tool file`.
    pub fn display_text(&self) -> String {
        let time = self.timestamp.format("%H:%M:%S");
        let session: String = self.session_id.chars().take(4).collect();

        match (&self.tool_name, &self.file_path) {
            (Some(tool), Some(path)) => {
                format!("{} [{}] {} {}", time, session, tool, short_file_name(path))
            }
            (Some(tool), None) => format!("{} [{}] {}", time, session, tool),
            _ => format!("{} [{}] message", time, session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 13, 4, 5).unwrap()
    }

    #[test]
    fn test_operation_mapping() {
        assert_eq!(Operation::from_tool_name("Read"), Operation::Read);
        assert_eq!(Operation::from_tool_name("Write"), Operation::Write);
        assert_eq!(Operation::from_tool_name("NotebookEdit"), Operation::Edit);
        assert_eq!(Operation::from_tool_name("Grep"), Operation::Search);
        assert_eq!(Operation::from_tool_name("Bash"), Operation::Bash);
        assert_eq!(Operation::from_tool_name("TodoWrite"), Operation::Read);
    }

    #[test]
    fn test_display_text() {
        let event = ActivityEvent::tool_start(
            "abcdef12",
            ts(),
            "Edit",
            Some("/repo/src/main.rs".into()),
            Operation::Edit,
        );
        assert_eq!(event.display_text(), "13:04:05 [abcd] Edit main.rs");

        let event = ActivityEvent::message("abcdef12", ts());
        assert_eq!(event.display_text(), "13:04:05 [abcd] message");
    }

    #[test]
    fn test_serializes_snake_case() {
        let event = ActivityEvent::tool_start("s1", ts(), "Read", Some("a.rs".into()), Operation::Read);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "tool_start");
        assert_eq!(json["operation"], "read");
    }
}
