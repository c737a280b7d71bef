//! Maps transcript lines to activity events.

use chrono::{DateTime, NaiveDateTime, Utc};
use crosstalk_types::{ActivityEvent, Operation, TranscriptRecord};
use serde_json::Value;

/// Tool input keys that may carry a file path, in priority order.
const FILE_PATH_KEYS: [&str; 3] = ["file_path", "path", "notebook_path"];

/// Shell commands are truncated to this many characters in synthetic paths.
const BASH_PREVIEW_CHARS: usize = 50;

/// Parse one complete transcript line.
///
/// Returns `Ok(None)` for well-formed records that carry no activity
/// (assistant text, summaries, unknown record kinds) and `Err` for lines that
/// are not valid JSON records.
pub fn parse_line(
    line: &[u8],
    session_id: &str,
    ingested_at: DateTime<Utc>,
) -> serde_json::Result<Option<ActivityEvent>> {
    let record: TranscriptRecord = serde_json::from_slice(line)?;
    Ok(record_to_event(&record, session_id, ingested_at))
}

/// Convert a parsed record into zero or one activity event.
pub fn record_to_event(
    record: &TranscriptRecord,
    session_id: &str,
    ingested_at: DateTime<Utc>,
) -> Option<ActivityEvent> {
    let timestamp = parse_timestamp(record.timestamp(), ingested_at);

    match record {
        TranscriptRecord::User { .. } => Some(ActivityEvent::message(session_id, timestamp)),
        TranscriptRecord::Assistant { message, .. } => {
            let (name, input) = message.as_ref()?.content.first_tool_use()?;
            let operation = Operation::from_tool_name(name);
            let file_path = tool_target(operation, input);

            Some(ActivityEvent::tool_start(
                session_id, timestamp, name, file_path, operation,
            ))
        }
        TranscriptRecord::Unrecognized => None,
    }
}

/// Resolve the path a tool call acts on.
///
/// Search tools report `pattern:<expr>` and shell tools `bash:<command>` so
/// downstream code can tell them apart from real files.
fn tool_target(operation: Operation, input: &Value) -> Option<String> {
    match operation {
        Operation::Search => input
            .get("pattern")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(|p| format!("pattern:{}", p)),
        Operation::Bash => input
            .get("command")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(|c| {
                let preview: String = c.chars().take(BASH_PREVIEW_CHARS).collect();
                format!("bash:{}", preview)
            }),
        _ => extract_file_path(input),
    }
}

/// The first of [`FILE_PATH_KEYS`] present in the input wins.
fn extract_file_path(input: &Value) -> Option<String> {
    let value = FILE_PATH_KEYS.iter().find_map(|key| input.get(*key))?;
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Parse an ISO-8601 timestamp, falling back to `fallback`.
pub fn parse_timestamp(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return fallback;
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crosstalk_types::EventType;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn tool_line(name: &str, input: Value) -> String {
        serde_json::json!({
            "type": "assistant",
            "timestamp": "2025-06-01T11:59:58.250Z",
            "message": {
                "role": "assistant",
                "content": [{"type": "tool_use", "id": "toolu_1", "name": name, "input": input}]
            }
        })
        .to_string()
    }

    #[test]
    fn test_user_record_is_message() {
        let line = r#"{"type":"user","timestamp":"2025-06-01T11:00:00Z","message":{"role":"user","content":"hi"}}"#;
        let event = parse_line(line.as_bytes(), "s1", now()).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::Message);
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap());
        assert!(event.tool_name.is_none());
        assert!(event.file_path.is_none());
        assert!(event.operation.is_none());
    }

    #[test]
    fn test_read_tool() {
        let line = tool_line("Read", serde_json::json!({"file_path": "/repo/src/lib.rs"}));
        let event = parse_line(line.as_bytes(), "s1", now()).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::ToolStart);
        assert_eq!(event.tool_name.as_deref(), Some("Read"));
        assert_eq!(event.file_path.as_deref(), Some("/repo/src/lib.rs"));
        assert_eq!(event.operation, Some(Operation::Read));
    }

    #[test]
    fn test_file_path_key_priority() {
        let input = serde_json::json!({"path": "/second", "notebook_path": "/third", "file_path": "/first"});
        assert_eq!(extract_file_path(&input).as_deref(), Some("/first"));

        let input = serde_json::json!({"notebook_path": "/nb.ipynb"});
        assert_eq!(extract_file_path(&input).as_deref(), Some("/nb.ipynb"));

        assert!(extract_file_path(&serde_json::json!({"other": 1})).is_none());
    }

    #[test]
    fn test_search_and_bash_synthetic_paths() {
        let line = tool_line("Grep", serde_json::json!({"pattern": "fn main", "path": "/repo"}));
        let event = parse_line(line.as_bytes(), "s1", now()).unwrap().unwrap();
        assert_eq!(event.file_path.as_deref(), Some("pattern:fn main"));
        assert_eq!(event.operation, Some(Operation::Search));

        let long = "x".repeat(80);
        let line = tool_line("Bash", serde_json::json!({"command": long}));
        let event = parse_line(line.as_bytes(), "s1", now()).unwrap().unwrap();
        assert_eq!(event.file_path, Some(format!("bash:{}", "x".repeat(50))));
        assert_eq!(event.operation, Some(Operation::Bash));

        let line = tool_line("Bash", serde_json::json!({"command": ""}));
        let event = parse_line(line.as_bytes(), "s1", now()).unwrap().unwrap();
        assert!(event.file_path.is_none());
    }

    #[test]
    fn test_bash_preview_respects_char_boundaries() {
        let command = "é".repeat(60);
        let target = tool_target(Operation::Bash, &serde_json::json!({"command": command})).unwrap();
        assert_eq!(target.chars().count(), "bash:".len() + 50);
    }

    #[test]
    fn test_untyped_blocks_are_skipped() {
        let write = serde_json::json!({"type": "tool_use", "name": "Write", "input": {"file_path": "/a.rs"}});
        for leading in [serde_json::json!({"text": "x"}), serde_json::json!("note"), serde_json::json!(7)] {
            let line = serde_json::json!({
                "type": "assistant",
                "message": {"content": [leading, write.clone()]}
            })
            .to_string();
            let event = parse_line(line.as_bytes(), "s1", now()).unwrap().unwrap();
            assert_eq!(event.tool_name.as_deref(), Some("Write"));
            assert_eq!(event.file_path.as_deref(), Some("/a.rs"));
            assert_eq!(event.operation, Some(Operation::Write));
        }
    }

    #[test]
    fn test_unmapped_tool_defaults_to_read() {
        let line = tool_line("TodoWrite", serde_json::json!({"todos": []}));
        let event = parse_line(line.as_bytes(), "s1", now()).unwrap().unwrap();
        assert_eq!(event.operation, Some(Operation::Read));
        assert!(event.file_path.is_none());
    }

    #[test]
    fn test_non_activity_records() {
        let text_only = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"done"}]}}"#;
        assert!(parse_line(text_only.as_bytes(), "s1", now()).unwrap().is_none());

        let summary = r#"{"type":"summary","summary":"Refactor","leafUuid":"u1"}"#;
        assert!(parse_line(summary.as_bytes(), "s1", now()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_is_error() {
        assert!(parse_line(b"{\"type\":\"user\"", "s1", now()).is_err());
        assert!(parse_line(b"not json", "s1", now()).is_err());
    }

    #[test]
    fn test_timestamp_fallbacks() {
        let fallback = now();
        assert_eq!(parse_timestamp(None, fallback), fallback);
        assert_eq!(parse_timestamp(Some("yesterday"), fallback), fallback);
        assert_eq!(
            parse_timestamp(Some("2025-06-01T10:00:00+02:00"), fallback),
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp(Some("2025-06-01T10:00:00.500"), fallback),
            Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(500)
        );
    }

    #[test]
    fn test_missing_timestamp_uses_ingestion_time() {
        let event = parse_line(br#"{"type":"user"}"#, "s1", now()).unwrap().unwrap();
        assert_eq!(event.timestamp, now());
    }
}
