//! Cancellation handle for one in-flight analysis request

use std::sync::OnceLock;
use strum_macros::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a request was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CancelReason {
    /// The user asked to stop
    UserStop,
    /// The timeout elapsed first
    Timeout,
    /// Connectivity was lost
    Offline,
    /// A newer request replaced this one
    Superseded,
}

/// Owned cancellation token for a single request.
///
/// The reason is recorded before the token fires, and only the first reason
/// sticks, so whoever observes the cancellation sees the cause that won.
#[derive(Debug)]
pub struct RequestHandle {
    id: Uuid,
    token: CancellationToken,
    reason: OnceLock<CancelReason>,
}

impl RequestHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
            reason: OnceLock::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cancel with the given reason; returns false if already cancelled
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// Resolves once cancelled, yielding the winning reason
    pub async fn cancelled(&self) -> CancelReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(CancelReason::UserStop)
    }
}

impl Default for RequestHandle {
    fn default() -> Self {
        Self::new()
    }
}
