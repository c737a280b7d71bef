//! Conflict events raised when agents overlap on a file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Two or more agents modified the file.
    Critical,
    /// One agent modified a file another agent had just read.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    SimultaneousEdit,
    ReadWriteRace,
}

impl ConflictType {
    pub fn severity(&self) -> Severity {
        match self {
            ConflictType::SimultaneousEdit => Severity::Critical,
            ConflictType::ReadWriteRace => Severity::Warning,
        }
    }
}

/// A detected overlap on one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub file_path: String,
    /// Session ids involved; the reporting session comes first.
    pub agents: Vec<String>,
    pub severity: Severity,
    pub conflict_type: ConflictType,
    pub timestamp: DateTime<Utc>,
}

impl ConflictEvent {
    pub fn new(
        file_path: impl Into<String>,
        agents: Vec<String>,
        conflict_type: ConflictType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            agents,
            severity: conflict_type.severity(),
            conflict_type,
            timestamp,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Agent ids shortened to eight characters, comma separated.
    pub fn short_agents(&self) -> String {
        self.agents
            .iter()
            .map(|a| a.chars().take(8).collect::<String>())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `.../<file>` for paths deeper than two segments.
    pub fn short_file(&self) -> String {
        let parts: Vec<&str> = self.file_path.split('/').collect();
        if parts.len() > 2 {
            format!(".../{}", parts[parts.len() - 1])
        } else {
            self.file_path.clone()
        }
    }
}
