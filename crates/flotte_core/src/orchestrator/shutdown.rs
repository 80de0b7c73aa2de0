//! Cooperative shutdown: a shared flag plus a two-stage coordinator.
//!
//! The flag is checked by each worker before it spawns a process. The
//! coordinator is what a signal handler drives: the first request sets the
//! flag and kills in-flight processes, any further request asks the caller
//! to exit immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::runner::ActiveProcesses;

/// Process-wide "stop dispatching" flag. Only ever goes from false to true.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns true if this call was the one that set it.
    pub fn request(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Check if shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShutdownRequested,
    Exiting,
}

/// What the caller should do after a termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Let the queue drain, report, and exit successfully.
    Graceful,
    /// Exit now with a failure code, skipping further cleanup.
    ForceExit,
}

impl SignalAction {
    /// Process exit code for this action.
    pub fn exit_code(&self) -> i32 {
        match self {
            SignalAction::Graceful => 0,
            SignalAction::ForceExit => 1,
        }
    }
}

/// Drives the `Running → ShutdownRequested → Exiting` state machine.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    flag: ShutdownFlag,
    active: ActiveProcesses,
    state: Arc<Mutex<ShutdownState>>,
}

impl ShutdownCoordinator {
    pub fn new(flag: ShutdownFlag, active: ActiveProcesses) -> Self {
        Self {
            flag,
            active,
            state: Arc::new(Mutex::new(ShutdownState::Running)),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.lock()
    }

    pub fn flag(&self) -> &ShutdownFlag {
        &self.flag
    }

    /// Handle one termination signal.
    pub fn handle_signal(&self) -> SignalAction {
        let mut state = self.state.lock();
        match *state {
            ShutdownState::Running => {
                *state = ShutdownState::ShutdownRequested;
                drop(state);

                tracing::warn!("Shutdown requested! Stopping dispatch and cleaning up...");
                self.flag.request();
                let terminated = self.terminate_active();
                tracing::info!(
                    "Sent terminate to {} running job(s). Send the signal again to force exit.",
                    terminated
                );
                SignalAction::Graceful
            }
            ShutdownState::ShutdownRequested | ShutdownState::Exiting => {
                *state = ShutdownState::Exiting;
                tracing::warn!("Forcing immediate shutdown!");
                SignalAction::ForceExit
            }
        }
    }

    /// Best-effort kill of every in-flight process.
    pub fn terminate_active(&self) -> usize {
        self.active.terminate_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_set_once() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_requested());
        assert!(flag.request());
        assert!(!flag.request());
        assert!(flag.is_requested());
    }

    #[test]
    fn clones_share_state() {
        let flag = ShutdownFlag::new();
        let other = flag.clone();
        other.request();
        assert!(flag.is_requested());
    }

    #[test]
    fn second_signal_forces_exit() {
        let flag = ShutdownFlag::new();
        let coordinator = ShutdownCoordinator::new(flag.clone(), ActiveProcesses::new());
        assert_eq!(coordinator.state(), ShutdownState::Running);

        assert_eq!(coordinator.handle_signal(), SignalAction::Graceful);
        assert!(flag.is_requested());
        assert_eq!(coordinator.state(), ShutdownState::ShutdownRequested);

        let action = coordinator.handle_signal();
        assert_eq!(action, SignalAction::ForceExit);
        assert_eq!(action.exit_code(), 1);
        assert_eq!(coordinator.state(), ShutdownState::Exiting);
    }
}
