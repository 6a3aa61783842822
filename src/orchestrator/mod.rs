//! Request orchestration
//!
//! Keeps at most one analysis current. A new request supersedes the previous
//! one, each request races a timeout and the connectivity signal, and only the
//! still-current request may publish its outcome to [`AnalysisState`].

pub mod connectivity;
pub mod handle;

use crate::client::Analyzer;
use crate::types::AnalysisResult;
use crate::{log_debug, log_warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::task::AbortOnDropHandle;
use uuid::Uuid;

pub use connectivity::{Connectivity, ConnectivityMonitor, wait_for_offline};
pub use handle::{CancelReason, RequestHandle};

/// Timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("You appear to be offline. Check your connection and try again.")]
    Offline,
    #[error("Connection lost during analysis. Reconnect and try again.")]
    ConnectionLost,
    #[error("Analysis timed out after {} seconds. Try a smaller snippet.", .0.as_secs())]
    Timeout(Duration),
    #[error("Analysis stopped.")]
    Stopped,
    #[error("Analysis replaced by a newer request.")]
    Superseded,
    #[error("Unexpected error during analysis: {0}")]
    Unexpected(String),
}

/// Coarse grouping used to pick how an error is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connectivity,
    Timeout,
    Cancelled,
    Unexpected,
}

impl AnalysisError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Offline | Self::ConnectionLost => ErrorCategory::Connectivity,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Stopped | Self::Superseded => ErrorCategory::Cancelled,
            Self::Unexpected(_) => ErrorCategory::Unexpected,
        }
    }

    fn from_reason(reason: CancelReason, timeout: Duration) -> Self {
        match reason {
            CancelReason::UserStop => Self::Stopped,
            CancelReason::Timeout => Self::Timeout(timeout),
            CancelReason::Offline => Self::ConnectionLost,
            CancelReason::Superseded => Self::Superseded,
        }
    }
}

/// Observable state of the current analysis cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisState {
    /// True while the current request is outstanding
    pub loading: bool,
    /// Request that owns this state
    pub request_id: Option<Uuid>,
    pub result: Option<Arc<AnalysisResult>>,
    pub error: Option<AnalysisError>,
}

/// Drives analysis requests with last-request-wins semantics
pub struct Orchestrator<A> {
    analyzer: Arc<A>,
    connectivity: ConnectivityMonitor,
    timeout: Duration,
    current: Mutex<Option<Arc<RequestHandle>>>,
    state: watch::Sender<AnalysisState>,
}

impl<A: Analyzer> Orchestrator<A> {
    pub fn new(analyzer: A, connectivity: ConnectivityMonitor) -> Self {
        Self::with_shared(Arc::new(analyzer), connectivity)
    }

    pub fn with_shared(analyzer: Arc<A>, connectivity: ConnectivityMonitor) -> Self {
        let (state, _rx) = watch::channel(AnalysisState::default());
        Self {
            analyzer,
            connectivity,
            timeout: DEFAULT_TIMEOUT,
            current: Mutex::new(None),
            state,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AnalysisState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Analyze `source`, cancelling whatever request was in flight.
    ///
    /// The returned value is this request's own outcome. It only reaches the
    /// shared state if no newer request or stop happened in the meantime.
    /// Dropping the returned future stops the request.
    pub async fn analyze(&self, source: &str) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let mut guard = RequestGuard {
            orchestrator: self,
            handle: self.begin(),
            settled: false,
        };
        let outcome = self.run(&guard.handle, source).await;
        guard.settle(&outcome);
        outcome
    }

    /// Cancel the current request. Returns false when nothing was in flight.
    pub fn stop(&self) -> bool {
        let mut current = self.current.lock();
        let Some(handle) = current.take() else {
            return false;
        };
        handle.cancel(CancelReason::UserStop);
        log_debug!("Stopped request {}", handle.id());
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(AnalysisError::Stopped);
        });
        true
    }

    fn begin(&self) -> Arc<RequestHandle> {
        let handle = Arc::new(RequestHandle::new());
        let mut current = self.current.lock();
        if let Some(previous) = current.replace(Arc::clone(&handle)) {
            previous.cancel(CancelReason::Superseded);
            log_debug!(
                "Request {} superseded by {}",
                previous.id(),
                handle.id()
            );
        }
        self.state.send_replace(AnalysisState {
            loading: true,
            request_id: Some(handle.id()),
            result: None,
            error: None,
        });
        handle
    }

    async fn run(
        &self,
        handle: &RequestHandle,
        source: &str,
    ) -> Result<Arc<AnalysisResult>, AnalysisError> {
        if !self.connectivity.is_online() {
            handle.cancel(CancelReason::Offline);
            log_warn!("Request {} refused: offline", handle.id());
            return Err(AnalysisError::Offline);
        }

        let mut offline_rx = self.connectivity.subscribe();
        let analyzer = Arc::clone(&self.analyzer);
        let owned_source = source.to_string();
        let mut task = AbortOnDropHandle::new(tokio::spawn(async move {
            analyzer.request_analysis(&owned_source).await
        }));

        let outcome = tokio::select! {
            biased;
            reason = handle.cancelled() => Err(AnalysisError::from_reason(reason, self.timeout)),
            () = wait_for_offline(&mut offline_rx) => {
                Err(self.cancel_as(handle, CancelReason::Offline))
            }
            () = tokio::time::sleep(self.timeout) => {
                Err(self.cancel_as(handle, CancelReason::Timeout))
            }
            joined = &mut task => joined
                .map(Arc::new)
                .map_err(|e| AnalysisError::Unexpected(e.to_string())),
        };

        if let Err(e) = &outcome {
            task.abort();
            log_debug!("Request {} ended without a result: {}", handle.id(), e);
        }
        outcome
    }

    /// Cancel for `reason`, reporting whichever cause actually won
    fn cancel_as(&self, handle: &RequestHandle, reason: CancelReason) -> AnalysisError {
        handle.cancel(reason);
        AnalysisError::from_reason(handle.reason().unwrap_or(reason), self.timeout)
    }

    fn finish(
        &self,
        handle: &RequestHandle,
        outcome: &Result<Arc<AnalysisResult>, AnalysisError>,
    ) {
        let mut current = self.current.lock();
        if current.as_ref().is_none_or(|c| c.id() != handle.id()) {
            log_debug!("Discarding outcome of stale request {}", handle.id());
            return;
        }
        *current = None;

        self.state.send_modify(|state| {
            state.loading = false;
            match outcome {
                Ok(result) => state.result = Some(Arc::clone(result)),
                Err(e) => state.error = Some(e.clone()),
            }
        });
    }
}

/// Settles one request: publishes its outcome, or stops it when the
/// `analyze` future is dropped before completing
struct RequestGuard<'a, A: Analyzer> {
    orchestrator: &'a Orchestrator<A>,
    handle: Arc<RequestHandle>,
    settled: bool,
}

impl<A: Analyzer> RequestGuard<'_, A> {
    fn settle(&mut self, outcome: &Result<Arc<AnalysisResult>, AnalysisError>) {
        self.settled = true;
        self.orchestrator.finish(&self.handle, outcome);
    }
}

impl<A: Analyzer> Drop for RequestGuard<'_, A> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.handle.cancel(CancelReason::UserStop);
        log_debug!("Request {} dropped before completing", self.handle.id());
        self.orchestrator.finish(&self.handle, &Err(AnalysisError::Stopped));
    }
}
