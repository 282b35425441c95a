//! Handles returned to callers of a load.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::{SessionError, SessionReport, SessionState};

/// Cancels one session.
///
/// Cancellation is cooperative: the session stops before its next key or
/// page fetch. Requests already in flight finish and merge normally.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle to a running load session.
pub struct LoadHandle {
    parent: String,
    cancel: CancelHandle,
    state_rx: watch::Receiver<SessionState>,
    task: JoinHandle<Result<SessionReport, SessionError>>,
}

impl LoadHandle {
    pub(crate) fn new(
        parent: String,
        cancel: CancelHandle,
        state_rx: watch::Receiver<SessionState>,
        task: JoinHandle<Result<SessionReport, SessionError>>,
    ) -> Self {
        Self {
            parent,
            cancel,
            state_rx,
            task,
        }
    }

    /// Parent region being loaded.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// A cloneable cancel handle for this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancel the session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state changes.
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Wait until the session reaches a terminal state.
    pub async fn wait_terminal(&self) -> SessionState {
        wait_terminal(self.state_rx.clone()).await
    }

    /// Wait for the session result.
    pub async fn join(self) -> Result<SessionReport, SessionError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Aborted {
                parent: self.parent,
                reason: e.to_string(),
            }),
        }
    }
}

/// Wait until a state receiver reports a terminal state.
///
/// A dropped sender counts as terminal: the session is gone.
pub(crate) async fn wait_terminal(mut rx: watch::Receiver<SessionState>) -> SessionState {
    let result = rx.wait_for(SessionState::is_terminal).await.map(|state| *state);
    match result {
        Ok(state) => state,
        Err(_) => {
            let state = *rx.borrow();
            if state.is_terminal() {
                state
            } else {
                SessionState::Failed
            }
        }
    }
}
