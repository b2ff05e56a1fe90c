//! Lazy, shared backend connection.
//!
//! Each adapter owns one [`LazyConnection`]. Nothing is dialed until the
//! first call; concurrent first calls share a single attempt; a failed
//! attempt leaves the slot empty so the next call tries again.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

/// Failure to establish the backend connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to connect to agent: {message}")]
pub struct ConnectError {
    message: String,
}

impl ConnectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type Attempt<C> = Shared<BoxFuture<'static, Result<Arc<C>, ConnectError>>>;

enum State<C> {
    Unconnected,
    Connecting(Attempt<C>),
    Connected(Arc<C>),
}

/// `Unconnected -> Connecting -> Connected`, with `Connecting -> Unconnected`
/// on failure. `Connected` is terminal.
pub struct LazyConnection<C> {
    state: Mutex<State<C>>,
}

impl<C> std::fmt::Debug for LazyConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyConnection").finish_non_exhaustive()
    }
}

impl<C> Default for LazyConnection<C> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::Unconnected),
        }
    }
}

impl<C: Send + Sync + 'static> LazyConnection<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the established connection, dialing with `connect` if there
    /// is none and no attempt is in progress.
    ///
    /// Callers that arrive while an attempt is running wait for that attempt
    /// and get its result; `connect` is not invoked for them. The lock is
    /// released while the attempt runs.
    pub async fn get_or_connect<F, Fut>(&self, connect: F) -> Result<Arc<C>, ConnectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, ConnectError>> + Send + 'static,
    {
        let attempt = {
            let mut state = self.state.lock().await;
            match &*state {
                State::Connected(conn) => return Ok(Arc::clone(conn)),
                State::Connecting(attempt) => attempt.clone(),
                State::Unconnected => {
                    tracing::debug!("establishing agent connection");
                    let attempt = connect().map(|res| res.map(Arc::new)).boxed().shared();
                    *state = State::Connecting(attempt.clone());
                    attempt
                }
            }
        };

        let result = attempt.clone().await;

        let mut state = self.state.lock().await;
        if let State::Connecting(current) = &*state {
            // Only the attempt we awaited may settle the state.
            if current.ptr_eq(&attempt) {
                *state = match &result {
                    Ok(conn) => {
                        tracing::debug!("agent connection established");
                        State::Connected(Arc::clone(conn))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "agent connection failed");
                        State::Unconnected
                    }
                };
            }
        }
        result
    }

    pub async fn is_connected(&self) -> bool {
        matches!(&*self.state.lock().await, State::Connected(_))
    }
}
