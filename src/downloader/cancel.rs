//! Cancellation of the active transfer

use crate::utils::error::MediagrabError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cloneable handle that can stop the active transfer from any task or thread.
///
/// The orchestrator arms it with a fresh token when a transfer starts and
/// releases it on every terminal path. Cancelling an unarmed handle is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a token for a new transfer. Fails if one is still live.
    pub(crate) fn arm(&self) -> Result<CancellationToken, MediagrabError> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(MediagrabError::TransferInProgress);
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Discard the token of the finished transfer.
    pub(crate) fn release(&self) {
        self.lock().take();
    }

    /// Signal the active transfer to stop at its next suspension point.
    ///
    /// Returns `true` only for the call that actually delivered the signal.
    pub fn cancel(&self) -> bool {
        match self.lock().as_ref() {
            Some(token) if !token.is_cancelled() => {
                debug!("Cancellation requested");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether a transfer currently holds a token
    pub fn is_armed(&self) -> bool {
        self.lock().is_some()
    }
}
