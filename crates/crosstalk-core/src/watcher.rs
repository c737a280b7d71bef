//! Background watcher for one projects root.
//!
//! A single thread per root receives OS file notifications, tails the
//! transcripts that changed and forwards the resulting events to the
//! coordinator through a [`Dispatcher`]. The thread never touches registry
//! state itself.

use crate::coordinator::Dispatcher;
use crate::tailer::{project_path_for, TranscriptTailer};
use crate::{EngineConfig, Result};
use crosstalk_types::SESSION_INDEX_FILE;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Handle to a running root watcher thread.
pub struct RootWatcher {
    root: PathBuf,
    shutdown: Arc<AtomicBool>,
    watcher: Option<RecommendedWatcher>,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
    stop_timeout: Duration,
}

impl RootWatcher {
    /// Start watching `root`.
    ///
    /// Returns `Ok(None)` when the root does not exist; nothing is watched and
    /// no retry is scheduled. Transcripts already present are primed at their
    /// current size so only content appended from now on is reported.
    pub fn start(root: &Path, dispatcher: Dispatcher, config: &EngineConfig) -> Result<Option<Self>> {
        if !root.is_dir() {
            warn!(target: "crosstalk::watcher", "Projects root {:?} does not exist; live monitoring inactive", root);
            return Ok(None);
        }

        // Notification paths are absolute; compare against the canonical root.
        let root = root.canonicalize()?;
        let mut tailer = TranscriptTailer::new(root.clone());
        tailer.prime();

        let (notify_tx, notify_rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(notify_tx)?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();

        let shutdown_for_thread = shutdown.clone();
        let poll_interval = config.poll_interval();
        let handle = std::thread::Builder::new()
            .name("crosstalk-watch".to_string())
            .spawn(move || {
                debug!(target: "crosstalk::watcher", "Watcher thread started for {:?}", tailer.root());
                run_loop(&mut tailer, &notify_rx, &dispatcher, &shutdown_for_thread, poll_interval);
                debug!(target: "crosstalk::watcher", "Watcher thread exiting for {:?}", tailer.root());
                let _ = done_tx.send(());
            })?;

        info!(target: "crosstalk::watcher", "Watching {:?} for transcript activity", root);

        Ok(Some(Self {
            root,
            shutdown,
            watcher: Some(watcher),
            handle: Some(handle),
            done_rx,
            stop_timeout: config.stop_timeout(),
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Stop notifications and wait up to the stop timeout for the thread.
    ///
    /// Returns false if the thread did not exit in time. It is then left
    /// detached: best effort, and a possible leak of one thread until its
    /// next wake-up.
    pub fn stop(&mut self) -> bool {
        self.shutdown.store(true, Ordering::SeqCst);
        // Dropping the OS watcher closes the notification channel.
        drop(self.watcher.take());

        let Some(handle) = self.handle.take() else {
            return true;
        };

        match self.done_rx.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!(target: "crosstalk::watcher", "Watcher thread for {:?} panicked", self.root);
                }
                debug!(target: "crosstalk::watcher", "Stopped watching {:?}", self.root);
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target: "crosstalk::watcher",
                    "Watcher thread for {:?} did not stop within {:?}; detaching it",
                    self.root,
                    self.stop_timeout
                );
                false
            }
        }
    }
}

impl Drop for RootWatcher {
    fn drop(&mut self) {
        // Signal only; callers that need the join use stop().
        self.shutdown.store(true, Ordering::SeqCst);
        drop(self.watcher.take());
    }
}

fn run_loop(
    tailer: &mut TranscriptTailer,
    notify_rx: &Receiver<notify::Result<Event>>,
    dispatcher: &Dispatcher,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match notify_rx.recv_timeout(poll_interval) {
            Ok(Ok(event)) => {
                if !handle_fs_event(tailer, dispatcher, event) {
                    debug!(target: "crosstalk::watcher", "Coordinator gone, stopping watcher");
                    break;
                }
            }
            Ok(Err(e)) => {
                warn!(target: "crosstalk::watcher", "File watcher error: {}", e);
            }
            Err(RecvTimeoutError::Timeout) => {
                if dispatcher.is_closed() {
                    debug!(target: "crosstalk::watcher", "Coordinator gone, stopping watcher");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Route one notification. Returns false once the coordinator has hung up.
fn handle_fs_event(tailer: &mut TranscriptTailer, dispatcher: &Dispatcher, event: Event) -> bool {
    let changed = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    let removed = matches!(event.kind, EventKind::Remove(_));
    if !changed && !removed {
        return true;
    }

    for path in &event.paths {
        if path.file_name().map(|n| n == SESSION_INDEX_FILE).unwrap_or(false) {
            if changed {
                if let Some(project_dir) = path.parent() {
                    trace!(target: "crosstalk::watcher", "Index changed in {:?}", project_dir);
                    if !dispatcher.index_changed(project_dir.to_path_buf()) {
                        return false;
                    }
                }
            }
            continue;
        }

        if !tailer.is_transcript(path) {
            continue;
        }

        if removed {
            tailer.forget(path);
            continue;
        }

        match tailer.poll(path) {
            Ok(events) => {
                let project_path = project_path_for(path);
                for activity in events {
                    if !dispatcher.activity(activity, project_path.clone()) {
                        return false;
                    }
                }
            }
            Err(e) => {
                debug!(target: "crosstalk::watcher", "Failed to read {:?}, will retry: {}", path, e);
            }
        }
    }
    true
}
