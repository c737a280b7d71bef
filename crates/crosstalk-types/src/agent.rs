//! Live agent state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Palette used to tell agents apart; indexed by `color_index` modulo its length.
pub const AGENT_COLORS: [&str; 12] = [
    "cyan",
    "magenta",
    "yellow",
    "green",
    "blue",
    "red",
    "bright_cyan",
    "bright_magenta",
    "bright_yellow",
    "bright_green",
    "bright_blue",
    "bright_red",
];

/// Agent liveness derived from time since last activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Activity observed within the thinking threshold.
    Active,
    /// Quiet for a few seconds, probably generating.
    Thinking,
    /// Quiet long enough to be considered parked.
    Idle,
}

impl AgentStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            AgentStatus::Active => "●",
            AgentStatus::Thinking => "◐",
            AgentStatus::Idle => "○",
        }
    }
}

/// Current known state of one monitored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveAgent {
    pub session_id: String,
    pub project_path: String,
    pub status: AgentStatus,
    pub last_activity: DateTime<Utc>,
    /// Human-readable "Tool file" string for the latest tool call.
    pub current_operation: Option<String>,
    /// Full path of the last file touched.
    pub current_file: Option<String>,
    pub files_accessed: HashSet<String>,
    pub message_count: u64,
    pub tool_count: u64,
    /// Stable per-session index, never reused.
    pub color_index: usize,
}

impl LiveAgent {
    pub fn new(
        session_id: impl Into<String>,
        project_path: impl Into<String>,
        color_index: usize,
        last_activity: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            project_path: project_path.into(),
            status: AgentStatus::Idle,
            last_activity,
            current_operation: None,
            current_file: None,
            files_accessed: HashSet::new(),
            message_count: 0,
            tool_count: 0,
            color_index,
        }
    }

    pub fn short_id(&self) -> String {
        self.session_id.chars().take(8).collect()
    }

    /// `.../<parent>/<dir>` for project paths deeper than two segments.
    pub fn short_project(&self) -> String {
        let parts: Vec<&str> = self.project_path.split('/').collect();
        if parts.len() > 2 {
            format!(".../{}", parts[parts.len() - 2..].join("/"))
        } else {
            self.project_path.clone()
        }
    }

    pub fn status_icon(&self) -> &'static str {
        self.status.icon()
    }

    pub fn agent_color(&self) -> &'static str {
        AGENT_COLORS[self.color_index % AGENT_COLORS.len()]
    }

    /// Seconds elapsed between the last activity and `now`.
    pub fn seconds_since_activity(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_activity).num_milliseconds() as f64 / 1000.0
    }
}
