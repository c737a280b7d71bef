//! Integration tests for the transcript → coordinator pipeline.

mod common;

use chrono::{TimeZone, Utc};
use common::{append, load_fixture, project_dir, tool_line};
use crosstalk_core::{Coordinator, EngineConfig, TranscriptTailer};
use crosstalk_types::{ConflictType, EventType, Operation, SESSION_INDEX_FILE};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[test]
fn test_fixture_transcripts_produce_expected_events() {
    let tmp = TempDir::new().unwrap();
    let project = project_dir(tmp.path(), "-repo");
    let alpha = project.join("agent_alpha.jsonl");
    let beta = project.join("agent_beta.jsonl");
    std::fs::write(&alpha, load_fixture("agent_alpha")).unwrap();
    std::fs::write(&beta, load_fixture("agent_beta")).unwrap();

    let mut tailer = TranscriptTailer::new(tmp.path().to_path_buf());
    let alpha_events = tailer.poll(&alpha).unwrap();
    let beta_events = tailer.poll(&beta).unwrap();

    // Summary, malformed and text-only lines carry no activity.
    let kinds: Vec<_> = alpha_events.iter().map(|e| (e.event_type, e.operation)).collect();
    assert_eq!(
        kinds,
        vec![
            (EventType::Message, None),
            (EventType::ToolStart, Some(Operation::Read)),
            (EventType::ToolStart, Some(Operation::Search)),
            (EventType::ToolStart, Some(Operation::Edit)),
        ]
    );
    assert_eq!(alpha_events[2].file_path.as_deref(), Some("pattern:fn load"));

    let bash = beta_events.last().unwrap();
    assert_eq!(bash.operation, Some(Operation::Bash));
    let preview = bash.file_path.as_deref().unwrap();
    assert!(preview.starts_with("bash:cargo test"));
    assert_eq!(preview.chars().count(), "bash:".len() + 50);

    let state = tailer.state(&alpha).unwrap();
    assert_eq!(state.offset(), std::fs::metadata(&alpha).unwrap().len());
    assert_eq!(state.pending_len(), 0);
}

#[test]
fn test_interleaved_agents_raise_conflicts_in_order() {
    let tmp = TempDir::new().unwrap();
    let project = project_dir(tmp.path(), "-repo");
    let alpha = project.join("agent_alpha.jsonl");
    let beta = project.join("agent_beta.jsonl");
    std::fs::write(&alpha, load_fixture("agent_alpha")).unwrap();
    std::fs::write(&beta, load_fixture("agent_beta")).unwrap();

    let mut tailer = TranscriptTailer::new(tmp.path().to_path_buf());
    let mut events = tailer.poll(&alpha).unwrap();
    events.extend(tailer.poll(&beta).unwrap());
    events.sort_by_key(|e| e.timestamp);

    let mut coordinator = Coordinator::new(EngineConfig::default()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    coordinator.subscribe_conflicts(move |conflict| {
        sink.lock().unwrap().push(conflict.clone());
        Ok(())
    });

    let dispatcher = coordinator.dispatcher();
    for event in events {
        dispatcher.activity(event, Some("/repo".to_string()));
    }
    assert_eq!(coordinator.drain(), 8);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].conflict_type, ConflictType::ReadWriteRace);
    assert_eq!(seen[0].agents, vec!["agent_alpha".to_string(), "agent_beta".to_string()]);
    assert_eq!(seen[1].conflict_type, ConflictType::SimultaneousEdit);
    assert_eq!(seen[1].agents, vec!["agent_beta".to_string(), "agent_alpha".to_string()]);
    assert!(seen.iter().all(|c| c.file_path == "/repo/src/config.rs"));

    let at = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 7).unwrap();
    let active = coordinator.detector().active_conflicts_at(at);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].conflict_type, ConflictType::SimultaneousEdit);

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.stats.agents, 2);
    assert_eq!(snapshot.stats.messages, 2);
    assert_eq!(snapshot.stats.tools, 6);
    assert_eq!(snapshot.stats.files, 3);
    assert!(snapshot.agents.iter().all(|a| a.project_path == "/repo"));
}

#[test]
fn test_primed_transcript_only_reports_new_lines() {
    let tmp = TempDir::new().unwrap();
    let project = project_dir(tmp.path(), "p");
    let session = project.join("session.jsonl");
    let history = format!("{}\n", "x".repeat(99));
    assert_eq!(history.len(), 100);
    append(&session, &history);

    let mut tailer = TranscriptTailer::new(tmp.path().to_path_buf());
    assert_eq!(tailer.prime(), 1);
    assert!(tailer.poll(&session).unwrap().is_empty());

    append(&session, &tool_line("Edit", "/p/main.rs", "2025-06-02T10:00:00Z"));
    let events = tailer.poll(&session).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].session_id, "session");
    assert!(tailer.poll(&session).unwrap().is_empty());
}

#[test]
fn test_rescan_discovers_indexed_sessions_once() {
    let tmp = TempDir::new().unwrap();
    let project = project_dir(tmp.path(), "-home-dev-api");
    append(&project.join("abc123.jsonl"), "");
    let index = serde_json::json!({
        "version": 1,
        "originalPath": "/home/dev/api",
        "entries": [
            {"sessionId": "abc123", "messageCount": 12, "projectPath": "/home/dev/api"},
            {"sessionId": "no-transcript", "messageCount": 1, "projectPath": "/home/dev/api"}
        ]
    });
    std::fs::write(project.join(SESSION_INDEX_FILE), index.to_string()).unwrap();

    let mut coordinator = Coordinator::new(EngineConfig::default()).unwrap();
    assert!(coordinator.watch(tmp.path()).unwrap());
    assert_eq!(coordinator.rescan(), 1);
    assert_eq!(coordinator.rescan(), 1);

    let agents = coordinator.agents();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents["abc123"].message_count, 12);
    assert_eq!(agents["abc123"].color_index, 0);
    coordinator.stop();
}

#[test]
fn test_watcher_delivers_appended_lines() {
    let tmp = TempDir::new().unwrap();
    let project = project_dir(tmp.path(), "-work-app");
    let existing = project.join("old.jsonl");
    append(&existing, &tool_line("Edit", "/work/app/a.rs", "2025-01-01T00:00:00Z"));

    let config = EngineConfig {
        poll_interval_ms: 20,
        ..EngineConfig::default()
    };
    let mut coordinator = Coordinator::new(config).unwrap();
    assert!(coordinator.watch(tmp.path()).unwrap());

    let now = Utc::now().to_rfc3339();
    append(&project.join("new.jsonl"), &tool_line("Write", "/work/app/a.rs", &now));
    append(&existing, &tool_line("Edit", "/work/app/a.rs", &now));

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        coordinator.drain();
        let agents = coordinator.agents();
        let ready = ["old", "new"]
            .iter()
            .all(|id| agents.get(*id).map(|a| a.tool_count >= 1).unwrap_or(false));
        if ready || Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let agents = coordinator.agents();
    assert_eq!(agents["old"].tool_count, 1, "history before watching must not replay");
    assert_eq!(agents["new"].tool_count, 1);
    assert_eq!(agents["new"].project_path, "/work/app");

    let conflicts = coordinator.active_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::SimultaneousEdit);

    coordinator.stop();
    assert!(coordinator.watched_roots().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn offsets_only_move_forward(line_count in 1usize..8, chunk_sizes in prop::collection::vec(1usize..48, 1..12)) {
        let tmp = TempDir::new().unwrap();
        let project = project_dir(tmp.path(), "p");
        let path = project.join("s.jsonl");

        let content: String = (0..line_count)
            .map(|i| tool_line("Read", &format!("/p/{}.rs", i), "2025-06-02T10:00:00Z"))
            .collect();
        let bytes = content.as_bytes();

        let mut tailer = TranscriptTailer::new(tmp.path().to_path_buf());
        let mut written = 0;
        let mut events = 0;
        let mut last_offset = 0;
        let mut sizes = chunk_sizes.iter().cycle();

        while written < bytes.len() {
            let size = (*sizes.next().unwrap()).min(bytes.len() - written);
            let chunk = std::str::from_utf8(&bytes[written..written + size]).unwrap();
            append(&path, chunk);
            written += size;

            events += tailer.poll(&path).unwrap().len();
            let state = tailer.state(&path).unwrap();
            prop_assert!(state.offset() >= last_offset);
            prop_assert_eq!(state.offset(), written as u64);
            prop_assert!(state.committed_offset() <= state.offset());
            last_offset = state.offset();
        }

        prop_assert_eq!(events, line_count);
        prop_assert_eq!(tailer.state(&path).unwrap().pending_len(), 0);
    }
}
