//! One-shot close coordination.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a resource. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Pumps are running and messages can be exchanged.
    Open,
    /// The close signal fired; teardown is in progress.
    Closing,
    /// The transport and both handoffs are closed.
    Closed,
}

/// The trigger that closed a resource. Only the first trigger is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The application called `close`.
    Requested,
    /// The writer pump failed to put a frame on the transport.
    WriterFailed,
    /// The reader pump hit EOF, an I/O error, a malformed frame, or a
    /// factory error.
    ReaderFailed,
    /// The child process exited.
    ProcessExited,
    /// The resource handle was dropped.
    Dropped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Requested => "close requested",
            Self::WriterFailed => "writer pump failed",
            Self::ReaderFailed => "reader pump failed",
            Self::ProcessExited => "process exited",
            Self::Dropped => "handle dropped",
        };
        f.write_str(text)
    }
}

struct GateState {
    lifecycle: LifecycleState,
    reason: Option<CloseReason>,
}

/// First-fire-wins close signal shared by the pumps, the cleanup task and
/// the application.
pub(crate) struct CloseGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl CloseGate {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                lifecycle: LifecycleState::Open,
                reason: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Raise the close signal. Returns `true` only for the call that moved
    /// the gate out of `Open`.
    pub(crate) fn fire(&self, reason: CloseReason) -> bool {
        let mut state = self.lock();
        if state.lifecycle != LifecycleState::Open {
            return false;
        }
        state.lifecycle = LifecycleState::Closing;
        state.reason = Some(reason);
        self.changed.notify_all();
        true
    }

    /// Block until the signal fires and return the winning reason.
    pub(crate) fn wait_fired(&self) -> CloseReason {
        let mut state = self.lock();
        loop {
            if let Some(reason) = state.reason {
                return reason;
            }
            state = self.wait(state);
        }
    }

    /// Mark teardown as complete.
    pub(crate) fn finish(&self) {
        let mut state = self.lock();
        state.lifecycle = LifecycleState::Closed;
        self.changed.notify_all();
    }

    /// Block until teardown is complete.
    pub(crate) fn wait_closed(&self) {
        let mut state = self.lock();
        while state.lifecycle != LifecycleState::Closed {
            state = self.wait(state);
        }
    }

    pub(crate) fn lifecycle(&self) -> LifecycleState {
        self.lock().lifecycle
    }

    pub(crate) fn reason(&self) -> Option<CloseReason> {
        self.lock().reason
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, GateState>) -> MutexGuard<'a, GateState> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn first_fire_wins() {
        let gate = CloseGate::new();
        assert_eq!(gate.lifecycle(), LifecycleState::Open);

        assert!(gate.fire(CloseReason::ReaderFailed));
        assert!(!gate.fire(CloseReason::Requested));

        assert_eq!(gate.reason(), Some(CloseReason::ReaderFailed));
        assert_eq!(gate.lifecycle(), LifecycleState::Closing);
        assert_eq!(gate.wait_fired(), CloseReason::ReaderFailed);
    }

    #[test]
    fn concurrent_fires_have_one_winner() {
        let gate = Arc::new(CloseGate::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = [
            CloseReason::Requested,
            CloseReason::WriterFailed,
            CloseReason::ReaderFailed,
            CloseReason::ProcessExited,
        ]
        .into_iter()
        .cycle()
        .take(32)
        .map(|reason| {
            let gate = Arc::clone(&gate);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                if gate.fire(reason) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_closed_returns_after_finish() {
        let gate = Arc::new(CloseGate::new());

        let cleanup = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let reason = gate.wait_fired();
                gate.finish();
                reason
            })
        };

        gate.fire(CloseReason::Requested);
        gate.wait_closed();

        assert_eq!(gate.lifecycle(), LifecycleState::Closed);
        assert_eq!(cleanup.join().unwrap(), CloseReason::Requested);
        assert!(!gate.fire(CloseReason::Dropped));
    }
}
