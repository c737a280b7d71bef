//! Core engine for crosstalk.
//!
//! Tails coding-agent transcripts under a projects root, keeps a live view of
//! every agent and flags files that several agents touch at once.

pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod parser;
pub mod registry;
pub mod subscribers;
pub mod tailer;
pub mod watcher;

pub use config::EngineConfig;
pub use conflict::ConflictDetector;
pub use coordinator::{Coordinator, Dispatcher, EngineMessage, EngineSnapshot};
pub use error::CrosstalkError;
pub use index::{load_session_index, scan_recent_sessions, DiscoveredSession};
pub use parser::parse_line;
pub use registry::{AgentRegistry, ColorAllocator, RegistryStats};
pub use subscribers::{SubscriberError, SubscriberList, SubscriberResult, SubscriptionId};
pub use tailer::{TailState, TranscriptTailer};
pub use watcher::RootWatcher;

/// Result type for crosstalk-core operations.
pub type Result<T> = std::result::Result<T, CrosstalkError>;
