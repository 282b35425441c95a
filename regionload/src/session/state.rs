//! Session lifecycle, results and errors.

use std::fmt;

use thiserror::Error;

use crate::feature::FeatureSet;
use crate::region::ResolveError;

/// Lifecycle state of a load session.
///
/// ```text
/// Init -> Running -> Completed
///                 -> Cancelled
///                 -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Init,
    /// Resolving keys or loading.
    Running,
    /// Every key was processed.
    Completed,
    /// Stopped by its cancel handle.
    Cancelled,
    /// Key resolution failed.
    Failed,
}

impl SessionState {
    /// Returns true for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Errors that end a session as `Failed`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Key resolution failed; nothing was loaded.
    #[error("failed to resolve regions for {parent}: {source}")]
    Resolve {
        parent: String,
        #[source]
        source: ResolveError,
    },

    /// The session task ended without producing a result.
    #[error("load session for {parent} aborted: {reason}")]
    Aborted { parent: String, reason: String },
}

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Keys finished (fetched, cached or failed).
    pub loaded_keys: usize,
    /// Keys served from a fresh cache entry.
    pub cached_keys: usize,
    /// Keys fetched completely from the network.
    pub fetched_keys: usize,
    /// Keys whose fetch failed.
    pub failed_keys: usize,
    /// Pages successfully fetched.
    pub network_pages: usize,
}

/// Final result of a session that did not fail.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Parent region.
    pub parent: String,
    /// `Completed` or `Cancelled`.
    pub state: SessionState,
    /// Keys resolved for the parent.
    pub total_keys: usize,
    /// Counters.
    pub stats: SessionStats,
    /// Merged features at the end of the session.
    pub features: FeatureSet,
}

impl SessionReport {
    /// Returns true if the session completed.
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }
}
