//! Sliding-window detection of overlapping file access between agents.

use crate::subscribers::{SubscriberList, SubscriberResult, SubscriptionId};
use chrono::{DateTime, Duration, Utc};
use crosstalk_types::{ActivityEvent, ConflictEvent, ConflictType, Operation};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One recorded access to a path.
#[derive(Debug, Clone)]
struct FileAccessRecord {
    session_id: String,
    timestamp: DateTime<Utc>,
    operation: Operation,
}

#[derive(Default)]
struct DetectorState {
    /// Recent accesses per path, oldest first.
    accesses: HashMap<String, Vec<FileAccessRecord>>,
    /// Most recent conflict per path.
    active: HashMap<String, ConflictEvent>,
}

/// Detects when several agents touch the same file within the conflict window.
///
/// The access table is the only engine state guarded by a lock; it may be
/// fed from any thread. Subscribers are notified after the lock is released.
pub struct ConflictDetector {
    window: Duration,
    state: Mutex<DetectorState>,
    subscribers: SubscriberList<ConflictEvent>,
}

impl ConflictDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(DetectorState::default()),
            subscribers: SubscriberList::new("conflict"),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ConflictEvent) -> SubscriberResult + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Record a file access and return any conflicts it causes.
    ///
    /// Only `read`, `write` and `edit` on a real path are considered; searches
    /// and shell commands are ignored.
    pub fn record(&self, event: &ActivityEvent) -> Vec<ConflictEvent> {
        let (Some(file_path), Some(operation)) = (&event.file_path, event.operation) else {
            return Vec::new();
        };
        if !operation.is_file_operation() {
            return Vec::new();
        }

        let now = event.timestamp;
        let conflicts = {
            let mut state = self.lock();
            let history = state.accesses.entry(file_path.clone()).or_default();

            let window = self.window;
            history.retain(|access| now - access.timestamp < window);

            let conflicts: Vec<ConflictEvent> =
                classify(history, &event.session_id, operation)
                    .map(|(conflict_type, agents)| {
                        ConflictEvent::new(file_path.clone(), agents, conflict_type, now)
                    })
                    .into_iter()
                    .collect();

            // Appended after classification so an access never conflicts with itself.
            history.push(FileAccessRecord {
                session_id: event.session_id.clone(),
                timestamp: now,
                operation,
            });

            for conflict in &conflicts {
                state.active.insert(conflict.file_path.clone(), conflict.clone());
            }
            conflicts
        };

        for conflict in &conflicts {
            match conflict.conflict_type {
                ConflictType::SimultaneousEdit => warn!(
                    target: "crosstalk::conflicts",
                    "Simultaneous edit on {} by {}",
                    conflict.file_path,
                    conflict.agents.join(", ")
                ),
                ConflictType::ReadWriteRace => info!(
                    target: "crosstalk::conflicts",
                    "Read/write race on {} by {}",
                    conflict.file_path,
                    conflict.agents.join(", ")
                ),
            }
            self.subscribers.notify(conflict);
        }

        conflicts
    }

    /// Conflicts detected less than twice the window ago, newest first.
    pub fn active_conflicts(&self) -> Vec<ConflictEvent> {
        self.active_conflicts_at(Utc::now())
    }

    /// Same as [`active_conflicts`](Self::active_conflicts) with an explicit clock.
    /// Expired entries are evicted.
    pub fn active_conflicts_at(&self, now: DateTime<Utc>) -> Vec<ConflictEvent> {
        let linger = self.window * 2;
        let mut state = self.lock();
        state.active.retain(|_, conflict| now - conflict.timestamp < linger);

        let mut active: Vec<ConflictEvent> = state.active.values().cloned().collect();
        active.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        active
    }

    /// Drop histories for paths nobody touched within the window.
    ///
    /// Per-path pruning only happens when the path is accessed again; this
    /// releases paths that went quiet. Returns the number of paths dropped.
    pub fn compact_at(&self, now: DateTime<Utc>) -> usize {
        let window = self.window;
        let mut state = self.lock();
        let before = state.accesses.len();
        state.accesses.retain(|_, history| {
            history.retain(|access| now - access.timestamp < window);
            !history.is_empty()
        });
        let dropped = before - state.accesses.len();
        if dropped > 0 {
            debug!(target: "crosstalk::conflicts", "Dropped access history for {} quiet paths", dropped);
        }
        dropped
    }

    /// Number of paths with recorded history.
    pub fn tracked_paths(&self) -> usize {
        self.lock().accesses.len()
    }

    fn lock(&self) -> MutexGuard<'_, DetectorState> {
        // Every mutation completes before the guard drops; recover from poisoning.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Classify an incoming access against the pruned history of its path.
///
/// Writers take precedence over readers. Each other session is listed once,
/// in the order it first appears in the history.
fn classify(
    history: &[FileAccessRecord],
    session_id: &str,
    operation: Operation,
) -> Option<(ConflictType, Vec<String>)> {
    if !operation.is_write() {
        return None;
    }

    let mut writers: Vec<&str> = Vec::new();
    let mut readers: Vec<&str> = Vec::new();
    for access in history.iter().filter(|a| a.session_id != session_id) {
        let bucket = if access.operation.is_write() {
            &mut writers
        } else {
            &mut readers
        };
        if !bucket.contains(&access.session_id.as_str()) {
            bucket.push(&access.session_id);
        }
    }

    let (conflict_type, others) = if !writers.is_empty() {
        (ConflictType::SimultaneousEdit, writers)
    } else if !readers.is_empty() {
        (ConflictType::ReadWriteRace, readers)
    } else {
        return None;
    };

    let mut agents = Vec::with_capacity(others.len() + 1);
    agents.push(session_id.to_string());
    agents.extend(others.into_iter().map(str::to_string));
    Some((conflict_type, agents))
}
