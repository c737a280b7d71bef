//! Shared types for the crosstalk live agent monitor.

mod activity;
mod agent;
mod conflict;
mod index;
mod transcript;

pub use activity::*;
pub use agent::*;
pub use conflict::*;
pub use index::*;
pub use transcript::*;

/// Last `/`-separated segment of a path-like string.
pub fn short_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
