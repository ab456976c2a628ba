//! ============================================================================
//! Run Controller - One active run, cooperative cancellation
//! ============================================================================
//! `RunController::begin` hands out at most one `RunGuard` at a time. Loops
//! poll the guard once per wallet / step boundary; an operation already in
//! flight always finishes before a cancellation is observed. Dropping the
//! guard ends the run.
//! ============================================================================

use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, SmileError};

type Slot = Arc<Mutex<Option<CancellationToken>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<CancellationToken>> {
    // The slot only holds a token; a poisoned lock still has a usable value
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-wide gate for long-running loops.
#[derive(Debug, Clone, Default)]
pub struct RunController {
    active: Slot,
}

impl RunController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run. Fails while another guard is alive.
    pub fn begin(&self) -> Result<RunGuard> {
        let mut slot = lock(&self.active);
        if slot.is_some() {
            return Err(SmileError::RunAlreadyActive);
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        debug!("Run started");
        Ok(RunGuard {
            token,
            slot: self.active.clone(),
        })
    }

    /// Request cancellation of the active run. Returns false if none is active.
    pub fn cancel(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(token) => {
                info!("Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a run is active and not cancelled.
    pub fn is_running(&self) -> bool {
        lock(&self.active)
            .as_ref()
            .map(|t| !t.is_cancelled())
            .unwrap_or(false)
    }

    /// Cancellation handle for the active run, if any.
    pub fn handle(&self) -> Option<RunHandle> {
        lock(&self.active).as_ref().map(|t| RunHandle { token: t.clone() })
    }
}

/// Proof of the single active run; passed to every cancellable entry point.
#[derive(Debug)]
pub struct RunGuard {
    token: CancellationToken,
    slot: Slot,
}

impl RunGuard {
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Cloneable handle that can cancel this run from elsewhere.
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            token: self.token.clone(),
        }
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.token.cancel();
        let mut slot = lock(&self.slot);
        *slot = None;
        debug!("Run finished");
    }
}

/// External cancellation handle.
#[derive(Debug, Clone)]
pub struct RunHandle {
    token: CancellationToken,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_active_run() {
        let controller = RunController::new();
        let guard = controller.begin().unwrap();
        assert!(controller.is_running());
        assert!(matches!(controller.begin(), Err(SmileError::RunAlreadyActive)));

        drop(guard);
        assert!(!controller.is_running());
        assert!(controller.begin().is_ok());
    }

    #[test]
    fn test_cancel_via_controller() {
        let controller = RunController::new();
        assert!(!controller.cancel());

        let guard = controller.begin().unwrap();
        assert!(guard.is_running());
        assert!(controller.cancel());
        assert!(!guard.is_running());
        assert!(!controller.is_running());

        // Still occupied until the guard is dropped
        assert!(controller.begin().is_err());
    }

    #[test]
    fn test_cancel_via_handle() {
        let controller = RunController::new();
        let guard = controller.begin().unwrap();
        let handle = controller.handle().unwrap();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(!guard.is_running());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let controller = RunController::new();
        let guard = controller.begin().unwrap();
        let handle = guard.handle();
        tokio::spawn(async move { handle.cancel() });
        guard.cancelled().await;
        assert!(!guard.is_running());
    }
}
