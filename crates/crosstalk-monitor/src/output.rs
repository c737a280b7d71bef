//! Line-oriented rendering of engine events on stdout.

use crate::config::OutputConfig;
use chrono::{DateTime, Utc};
use crosstalk_core::EngineSnapshot;
use crosstalk_types::{ActivityEvent, ConflictEvent, EventType, LiveAgent};
use serde_json::json;
use std::io::Write;

#[derive(Debug, Clone)]
pub struct Printer {
    json: bool,
    show_messages: bool,
}

impl Printer {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            json: config.json,
            show_messages: config.show_messages,
        }
    }

    /// `None` for events this printer is configured to skip.
    pub fn format_activity(&self, event: &ActivityEvent) -> Option<String> {
        if event.event_type == EventType::Message && !self.show_messages {
            return None;
        }

        if self.json {
            return Some(json!({"kind": "activity", "event": event}).to_string());
        }
        Some(event.display_text())
    }

    pub fn format_conflict(&self, conflict: &ConflictEvent) -> String {
        if self.json {
            return json!({"kind": "conflict", "conflict": conflict}).to_string();
        }

        let label = if conflict.is_critical() { "CRITICAL" } else { "WARNING" };
        format!(
            "{} !! {} {:?} on {} by {}",
            conflict.timestamp.format("%H:%M:%S"),
            label,
            conflict.conflict_type,
            conflict.short_file(),
            conflict.short_agents()
        )
    }

    /// One summary line per agent, preceded by a totals line.
    pub fn format_status(&self, snapshot: &EngineSnapshot, now: DateTime<Utc>) -> Vec<String> {
        if self.json {
            return vec![json!({"kind": "status", "snapshot": snapshot}).to_string()];
        }

        let stats = &snapshot.stats;
        let mut lines = vec![format!(
            "-- {} agents ({} active), {} messages, {} tools, {} files, {} conflicts",
            stats.agents,
            stats.active,
            stats.messages,
            stats.tools,
            stats.files,
            snapshot.conflicts.len()
        )];
        lines.extend(snapshot.agents.iter().map(|agent| agent_line(agent, now)));
        lines
    }

    pub fn print_activity(&self, event: &ActivityEvent) -> std::io::Result<()> {
        match self.format_activity(event) {
            Some(line) => print_lines(&[line]),
            None => Ok(()),
        }
    }

    pub fn print_conflict(&self, conflict: &ConflictEvent) -> std::io::Result<()> {
        print_lines(&[self.format_conflict(conflict)])
    }

    pub fn print_status(&self, snapshot: &EngineSnapshot, now: DateTime<Utc>) -> std::io::Result<()> {
        print_lines(&self.format_status(snapshot, now))
    }
}

fn agent_line(agent: &LiveAgent, now: DateTime<Utc>) -> String {
    let project = if agent.project_path.is_empty() {
        "?".to_string()
    } else {
        agent.short_project()
    };
    format!(
        "   {} {} {} {}s ago {}",
        agent.status_icon(),
        agent.short_id(),
        project,
        agent.seconds_since_activity(now).max(0.0).round(),
        agent.current_operation.as_deref().unwrap_or("-")
    )
}

fn print_lines(lines: &[String]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{}", line)?;
    }
    stdout.flush()
}
