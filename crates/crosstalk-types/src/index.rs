//! Per-project `sessions-index.json` manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name of the per-project session manifest.
pub const SESSION_INDEX_FILE: &str = "sessions-index.json";

/// The manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndex {
    pub version: u32,
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub entries: Vec<SessionIndexEntry>,
}

/// One session listed in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndexEntry {
    pub session_id: String,
    #[serde(default)]
    pub full_path: String,
    /// Modification time in milliseconds since the epoch.
    #[serde(default)]
    pub file_mtime: i64,
    #[serde(default)]
    pub first_prompt: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub git_branch: String,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub is_sidechain: bool,
}
