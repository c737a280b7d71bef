//! Engine configuration.

use crate::{CrosstalkError, Result};
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Root holding one subdirectory of transcripts per project.
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,
    /// Accesses closer together than this are considered concurrent.
    #[serde(default = "default_conflict_window_secs")]
    pub conflict_window_secs: f64,
    #[serde(default = "default_thinking_after_secs")]
    pub thinking_after_secs: u64,
    #[serde(default = "default_idle_after_secs")]
    pub idle_after_secs: u64,
    /// Cadence of the status-aging sweep.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Upper bound on waiting for a watcher thread to exit.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Index entries whose transcript changed within this span are surfaced as agents.
    #[serde(default = "default_discovery_window_secs")]
    pub discovery_window_secs: u64,
    /// Discovered sessions modified within this span start out active.
    #[serde(default = "default_recent_activity_secs")]
    pub recent_activity_secs: u64,
    /// How often the watcher thread checks for shutdown while idle.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_projects_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
        .join("projects")
}

fn default_conflict_window_secs() -> f64 {
    5.0
}

fn default_thinking_after_secs() -> u64 {
    5
}

fn default_idle_after_secs() -> u64 {
    30
}

fn default_sweep_interval_ms() -> u64 {
    2000
}

fn default_stop_timeout_secs() -> u64 {
    5
}

fn default_discovery_window_secs() -> u64 {
    60
}

fn default_recent_activity_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            conflict_window_secs: default_conflict_window_secs(),
            thinking_after_secs: default_thinking_after_secs(),
            idle_after_secs: default_idle_after_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
            discovery_window_secs: default_discovery_window_secs(),
            recent_activity_secs: default_recent_activity_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Upper bound for every configured duration.
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

impl EngineConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let window_ms = (self.conflict_window_secs * 1000.0).round();
        let max_ms = (MAX_DURATION_SECS * 1000) as f64;
        if !window_ms.is_finite() || !(1.0..=max_ms).contains(&window_ms) {
            return Err(CrosstalkError::ConfigError(format!(
                "conflict_window_secs must be between 0.001 and {}, got {}",
                MAX_DURATION_SECS, self.conflict_window_secs
            )));
        }

        for (name, secs) in [
            ("thinking_after_secs", self.thinking_after_secs),
            ("idle_after_secs", self.idle_after_secs),
            ("stop_timeout_secs", self.stop_timeout_secs),
            ("discovery_window_secs", self.discovery_window_secs),
            ("recent_activity_secs", self.recent_activity_secs),
            ("sweep_interval_ms", self.sweep_interval_ms / 1000),
            ("poll_interval_ms", self.poll_interval_ms / 1000),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(CrosstalkError::ConfigError(format!(
                    "{} exceeds {} seconds",
                    name, MAX_DURATION_SECS
                )));
            }
        }

        if self.idle_after_secs <= self.thinking_after_secs {
            return Err(CrosstalkError::ConfigError(format!(
                "idle_after_secs ({}) must exceed thinking_after_secs ({})",
                self.idle_after_secs, self.thinking_after_secs
            )));
        }
        if self.sweep_interval_ms == 0 || self.poll_interval_ms == 0 {
            return Err(CrosstalkError::ConfigError(
                "sweep_interval_ms and poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn conflict_window(&self) -> ChronoDuration {
        let max_ms = (MAX_DURATION_SECS * 1000) as f64;
        let ms = (self.conflict_window_secs * 1000.0).round().clamp(1.0, max_ms);
        ChronoDuration::milliseconds(ms as i64)
    }

    pub fn thinking_after(&self) -> ChronoDuration {
        bounded_seconds(self.thinking_after_secs)
    }

    pub fn idle_after(&self) -> ChronoDuration {
        bounded_seconds(self.idle_after_secs)
    }

    pub fn discovery_window(&self) -> ChronoDuration {
        bounded_seconds(self.discovery_window_secs)
    }

    pub fn recent_activity(&self) -> ChronoDuration {
        bounded_seconds(self.recent_activity_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.clamp(1, MAX_DURATION_SECS * 1000))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs.min(MAX_DURATION_SECS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(1, MAX_DURATION_SECS * 1000))
    }
}

/// Seconds as a chrono duration, saturating at [`MAX_DURATION_SECS`].
fn bounded_seconds(secs: u64) -> ChronoDuration {
    ChronoDuration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}
