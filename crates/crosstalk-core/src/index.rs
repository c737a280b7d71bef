//! Session discovery through per-project `sessions-index.json` manifests.
//!
//! The index is only used to surface sessions that have not produced live
//! activity yet; it plays no part in conflict detection.

use crate::tailer::TRANSCRIPT_EXTENSION;
use crate::EngineConfig;
use chrono::{DateTime, Utc};
use crosstalk_types::{SessionIndex, SESSION_INDEX_FILE};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, trace};

/// A session listed in an index whose transcript changed recently.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredSession {
    pub session_id: String,
    pub project_path: String,
    pub message_count: u64,
    /// Modification time of the transcript.
    pub modified: Option<DateTime<Utc>>,
    /// Modified within the recent-activity span.
    pub recently_active: bool,
}

/// Load the manifest of one project directory. Missing or malformed → `None`.
pub fn load_session_index(project_dir: &Path) -> Option<SessionIndex> {
    let index_path = project_dir.join(SESSION_INDEX_FILE);
    let content = std::fs::read_to_string(&index_path).ok()?;

    match serde_json::from_str(&content) {
        Ok(index) => Some(index),
        Err(e) => {
            debug!(target: "crosstalk::index", "Ignoring malformed index {:?}: {}", index_path, e);
            None
        }
    }
}

/// Scan every project under `root` for recently modified indexed sessions.
pub fn scan_recent_sessions(
    root: &Path,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<DiscoveredSession> {
    let Ok(project_dirs) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for project_dir in project_dirs.flatten() {
        let path = project_dir.path();
        let hidden = project_dir.file_name().to_string_lossy().starts_with('.');
        if hidden || !path.is_dir() {
            continue;
        }
        found.extend(scan_project(&path, now, config));
    }

    debug!(target: "crosstalk::index", "Discovered {} recently active sessions under {:?}", found.len(), root);
    found
}

/// Scan one project directory.
pub fn scan_project(
    project_dir: &Path,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<DiscoveredSession> {
    let Some(index) = load_session_index(project_dir) else {
        return Vec::new();
    };

    let discovery_window = config.discovery_window();
    let recent = config.recent_activity();

    index
        .entries
        .into_iter()
        .filter_map(|entry| {
            let transcript = project_dir.join(format!("{}.{}", entry.session_id, TRANSCRIPT_EXTENSION));
            let modified = modified_at(&transcript)?;
            let age = now - modified;
            if age >= discovery_window {
                trace!(target: "crosstalk::index", "Session {} last modified {}s ago, skipping", entry.session_id, age.num_seconds());
                return None;
            }

            Some(DiscoveredSession {
                session_id: entry.session_id,
                project_path: entry.project_path,
                message_count: entry.message_count,
                modified: Some(modified),
                recently_active: age < recent,
            })
        })
        .collect()
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let mtime: SystemTime = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(mtime))
}
