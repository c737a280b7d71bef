//! Single-consumer coordination of watcher output.
//!
//! Watcher threads only enqueue [`EngineMessage`]s. The [`Coordinator`] drains
//! the queue in arrival order and is the only owner of the agent registry,
//! the activity subscribers and the periodic sweep.

use crate::conflict::ConflictDetector;
use crate::index::{scan_project, scan_recent_sessions};
use crate::registry::{AgentRegistry, RegistryStats};
use crate::subscribers::{SubscriberList, SubscriberResult, SubscriptionId};
use crate::watcher::RootWatcher;
use crate::{EngineConfig, Result};
use chrono::{DateTime, Utc};
use crosstalk_types::{ActivityEvent, ConflictEvent, LiveAgent};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Work handed from producer threads to the coordinator.
#[derive(Debug, Clone)]
pub enum EngineMessage {
    /// A parsed transcript event, with the project path derived from its directory.
    Activity {
        event: ActivityEvent,
        project_path: Option<String>,
    },
    /// A project's session index was created or rewritten.
    IndexChanged { project_dir: PathBuf },
}

/// Cloneable, thread-safe handle for enqueueing work to a [`Coordinator`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl Dispatcher {
    pub fn new(tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self { tx }
    }

    /// Returns false if the coordinator is gone.
    pub fn send(&self, message: EngineMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn activity(&self, event: ActivityEvent, project_path: Option<String>) -> bool {
        self.send(EngineMessage::Activity {
            event,
            project_path,
        })
    }

    pub fn index_changed(&self, project_dir: PathBuf) -> bool {
        self.send(EngineMessage::IndexChanged { project_dir })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Point-in-time view for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    /// Agents in first-seen (color) order.
    pub agents: Vec<LiveAgent>,
    /// Active conflicts, newest first.
    pub conflicts: Vec<ConflictEvent>,
    pub stats: RegistryStats,
}

pub struct Coordinator {
    config: EngineConfig,
    registry: AgentRegistry,
    detector: Arc<ConflictDetector>,
    activity_subscribers: SubscriberList<ActivityEvent>,
    dispatcher: Dispatcher,
    rx: mpsc::UnboundedReceiver<EngineMessage>,
    watchers: Vec<RootWatcher>,
}

impl Coordinator {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            registry: AgentRegistry::new(config.thinking_after(), config.idle_after()),
            detector: Arc::new(ConflictDetector::new(config.conflict_window())),
            activity_subscribers: SubscriberList::new("activity"),
            dispatcher: Dispatcher::new(tx),
            rx,
            watchers: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle for producers that feed this coordinator.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Shared detector, usable from other threads for pull queries.
    pub fn detector(&self) -> Arc<ConflictDetector> {
        self.detector.clone()
    }

    /// Start watching a projects root.
    ///
    /// Returns `Ok(false)` if the root does not exist. Watching a root twice
    /// is a no-op.
    pub fn watch(&mut self, root: &Path) -> Result<bool> {
        if let Ok(canonical) = root.canonicalize() {
            if self.watchers.iter().any(|w| w.root() == canonical) {
                debug!(target: "crosstalk::dispatch", "Already watching {:?}", canonical);
                return Ok(true);
            }
        }

        match RootWatcher::start(root, self.dispatcher(), &self.config)? {
            Some(watcher) => {
                self.watchers.push(watcher);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Watch the configured projects directory.
    pub fn watch_default(&mut self) -> Result<bool> {
        let root = self.config.projects_dir.clone();
        self.watch(&root)
    }

    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.watchers.iter().map(|w| w.root().to_path_buf()).collect()
    }

    pub fn subscribe_activity<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ActivityEvent) -> SubscriberResult + Send + Sync + 'static,
    {
        self.activity_subscribers.subscribe(callback)
    }

    pub fn unsubscribe_activity(&self, id: SubscriptionId) -> bool {
        self.activity_subscribers.unsubscribe(id)
    }

    pub fn subscribe_conflicts<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ConflictEvent) -> SubscriberResult + Send + Sync + 'static,
    {
        self.detector.subscribe(callback)
    }

    pub fn unsubscribe_conflicts(&self, id: SubscriptionId) -> bool {
        self.detector.unsubscribe(id)
    }

    /// Apply one message.
    pub fn handle(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Activity {
                event,
                project_path,
            } => {
                trace!(
                    target: "crosstalk::dispatch",
                    "{} {}",
                    event.session_id,
                    event.display_text()
                );

                self.registry.apply(&event);
                if let Some(project_path) = project_path {
                    self.registry.set_project_path(&event.session_id, &project_path);
                }

                self.detector.record(&event);
                self.activity_subscribers.notify(&event);
            }
            EngineMessage::IndexChanged { project_dir } => {
                let now = Utc::now();
                for session in scan_project(&project_dir, now, &self.config) {
                    self.registry.discover(&session, now);
                }
            }
        }
    }

    /// Apply everything already queued. Returns how many messages were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Discover recently active sessions under every watched root.
    pub fn rescan(&mut self) -> usize {
        self.rescan_at(Utc::now())
    }

    pub fn rescan_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut discovered = 0;
        for root in self.watched_roots() {
            for session in scan_recent_sessions(&root, now, &self.config) {
                self.registry.discover(&session, now);
                discovered += 1;
            }
        }
        if discovered > 0 {
            info!(target: "crosstalk::index", "Discovered {} sessions from indexes", discovered);
        }
        discovered
    }

    /// Age agent statuses and drop expired access history.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&mut self, now: DateTime<Utc>) -> usize {
        let changed = self.registry.sweep_at(now);
        let dropped = self.detector.compact_at(now);
        if dropped > 0 {
            trace!(target: "crosstalk::dispatch", "Dropped history for {} quiet paths", dropped);
        }
        changed
    }

    pub fn agents(&self) -> HashMap<String, LiveAgent> {
        self.registry.snapshot()
    }

    pub fn agent(&self, session_id: &str) -> Option<&LiveAgent> {
        self.registry.get(session_id)
    }

    pub fn active_conflicts(&self) -> Vec<ConflictEvent> {
        self.detector.active_conflicts()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            agents: self.registry.ordered(),
            conflicts: self.detector.active_conflicts(),
            stats: self.registry.stats(),
        }
    }

    /// Stop all root watchers, waiting up to the stop timeout for each.
    pub fn stop(&mut self) {
        for mut watcher in self.watchers.drain(..) {
            watcher.stop();
        }
    }

    /// Process messages and sweep periodically until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(target: "crosstalk::dispatch", "Coordinator running ({} roots)", self.watchers.len());

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(message) = self.rx.recv() => self.handle(message),
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }

        // Apply what the watchers already produced before stopping them.
        self.drain();

        let watchers = std::mem::take(&mut self.watchers);
        if !watchers.is_empty() {
            let stopped = tokio::task::spawn_blocking(move || {
                for mut watcher in watchers {
                    watcher.stop();
                }
            })
            .await;
            if let Err(e) = stopped {
                warn!(target: "crosstalk::dispatch", "Failed to stop watchers: {}", e);
            }
        }

        info!(target: "crosstalk::dispatch", "Coordinator stopped");
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}
