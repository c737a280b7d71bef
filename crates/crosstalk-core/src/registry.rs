//! Live agent state machine.
//!
//! ```text
//! active --(> thinking_after)--> thinking --(> idle_after)--> idle
//!   ^                                                          |
//!   +------------------- any new activity ---------------------+
//! ```

use crate::index::DiscoveredSession;
use chrono::{DateTime, Duration, Utc};
use crosstalk_types::{short_file_name, ActivityEvent, AgentStatus, EventType, LiveAgent};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Hands out color indices, never repeating one.
///
/// Clones share the counter, so a handle can be given to producer threads.
#[derive(Debug, Clone, Default)]
pub struct ColorAllocator {
    next: Arc<AtomicUsize>,
}

impl ColorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of indices handed out so far.
    pub fn allocated(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

/// Aggregate counters across all agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub agents: usize,
    pub active: usize,
    pub messages: u64,
    pub tools: u64,
    /// Distinct paths touched by any agent.
    pub files: usize,
}

/// Tracks one [`LiveAgent`] per session id.
pub struct AgentRegistry {
    agents: HashMap<String, LiveAgent>,
    colors: ColorAllocator,
    thinking_after: Duration,
    idle_after: Duration,
}

impl AgentRegistry {
    pub fn new(thinking_after: Duration, idle_after: Duration) -> Self {
        Self {
            agents: HashMap::new(),
            colors: ColorAllocator::new(),
            thinking_after,
            idle_after,
        }
    }

    /// Shared handle to this registry's color counter.
    pub fn colors(&self) -> ColorAllocator {
        self.colors.clone()
    }

    /// Fold one activity event into its agent, creating the agent if needed.
    pub fn apply(&mut self, event: &ActivityEvent) -> &LiveAgent {
        let agent = self.entry(&event.session_id, event.timestamp);

        agent.status = AgentStatus::Active;
        agent.last_activity = event.timestamp;

        if let Some(tool) = &event.tool_name {
            agent.tool_count += 1;
            match &event.file_path {
                Some(path) => {
                    agent.current_operation = Some(format!("{} {}", tool, short_file_name(path)));
                    agent.current_file = Some(path.clone());
                }
                None => agent.current_operation = Some(tool.clone()),
            }
        }

        if let Some(path) = &event.file_path {
            agent.files_accessed.insert(path.clone());
        }

        if event.event_type == EventType::Message {
            agent.message_count += 1;
        }

        agent
    }

    /// Create or refresh an agent found through the session index.
    pub fn discover(&mut self, session: &DiscoveredSession, now: DateTime<Utc>) -> &LiveAgent {
        let is_new = !self.agents.contains_key(&session.session_id);
        let agent = self.entry(&session.session_id, session.modified.unwrap_or(now));

        if agent.project_path.is_empty() {
            agent.project_path = session.project_path.clone();
        }
        agent.message_count = agent.message_count.max(session.message_count);

        if session.recently_active {
            agent.status = AgentStatus::Active;
        } else if is_new {
            agent.status = AgentStatus::Idle;
        }

        agent
    }

    /// Fill in the project path of an agent created before it was known.
    pub fn set_project_path(&mut self, session_id: &str, project_path: &str) {
        if let Some(agent) = self.agents.get_mut(session_id) {
            if agent.project_path.is_empty() && !project_path.is_empty() {
                agent.project_path = project_path.to_string();
            }
        }
    }

    /// Age every agent's status against the wall clock.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Age every agent's status against `now`. Returns how many changed.
    pub fn sweep_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for agent in self.agents.values_mut() {
            let elapsed = now - agent.last_activity;

            let status = if elapsed > self.idle_after {
                agent.current_operation = None;
                AgentStatus::Idle
            } else if elapsed > self.thinking_after {
                AgentStatus::Thinking
            } else {
                agent.status
            };

            if status != agent.status {
                debug!(
                    target: "crosstalk::registry",
                    "Agent {} {:?} -> {:?}",
                    agent.short_id(),
                    agent.status,
                    status
                );
                agent.status = status;
                changed += 1;
            }
        }
        changed
    }

    pub fn get(&self, session_id: &str) -> Option<&LiveAgent> {
        self.agents.get(session_id)
    }

    /// Copy of every agent keyed by session id.
    pub fn snapshot(&self) -> HashMap<String, LiveAgent> {
        self.agents.clone()
    }

    /// Agents ordered by color index, i.e. by first appearance.
    pub fn ordered(&self) -> Vec<LiveAgent> {
        let mut agents: Vec<LiveAgent> = self.agents.values().cloned().collect();
        agents.sort_by_key(|a| a.color_index);
        agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let files: HashSet<&String> = self
            .agents
            .values()
            .flat_map(|a| a.files_accessed.iter())
            .collect();

        RegistryStats {
            agents: self.agents.len(),
            active: self
                .agents
                .values()
                .filter(|a| a.status == AgentStatus::Active)
                .count(),
            messages: self.agents.values().map(|a| a.message_count).sum(),
            tools: self.agents.values().map(|a| a.tool_count).sum(),
            files: files.len(),
        }
    }

    fn entry(&mut self, session_id: &str, first_seen: DateTime<Utc>) -> &mut LiveAgent {
        let colors = &self.colors;
        self.agents.entry(session_id.to_string()).or_insert_with(|| {
            let color_index = colors.allocate();
            info!(
                target: "crosstalk::registry",
                "New agent {} (color {})",
                session_id,
                color_index
            );
            LiveAgent::new(session_id, "", color_index, first_seen)
        })
    }
}
