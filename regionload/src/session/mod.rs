//! Load sessions.
//!
//! A [`LoadSession`] resolves a parent region into child keys and loads each
//! key from the persistent cache or the remote source, merging features into
//! a shared [`MergeSink`](crate::merge::MergeSink) as pages arrive.
//!
//! # Example
//!
//! ```ignore
//! let session = LoadSession::new("0363", Arc::new(ctx), sink);
//! let handle = session.spawn();
//! // ...
//! handle.cancel();
//! let report = handle.join().await?;
//! ```

mod config;
mod context;
mod handle;
mod progress;
mod runner;
mod state;

pub use config::{
    LoaderConfig, DEFAULT_EMPTY_KEYS_RETRY_DELAY, DEFAULT_KEY_DELAY, DEFAULT_PAGE_DELAY,
};
pub use context::LoadContext;
pub use handle::{CancelHandle, LoadHandle};
pub(crate) use handle::wait_terminal;
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter};
pub use runner::LoadSession;
pub use state::{SessionError, SessionReport, SessionState, SessionStats};
