//! Connect gesture state machine.
//!
//! `Idle → Connecting → Connected`, with `Connecting → Failed → Idle` on
//! rejection. The `Failed` phase collapses to `Idle` before it is ever
//! observable; callers see the error instead. The gesture is not
//! re-entrant: while one `connectWallet` call is in flight, further
//! gestures are no-ops.

use sb_controller::ControllerCallFailed;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GesturePhase {
    #[default]
    Idle,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// A gesture was already in flight; no second `connectWallet` call was
    /// made.
    AlreadyInFlight,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("wallet extension is not installed")]
    NotInstalled,
    /// The wallet rejected the connection request (e.g. user denial).
    #[error(transparent)]
    Rejected(#[from] ControllerCallFailed),
}

#[derive(Default)]
pub struct ConnectGesture {
    phase: Mutex<GesturePhase>,
}

impl ConnectGesture {
    pub fn phase(&self) -> GesturePhase {
        *self.phase.lock().expect("gesture lock poisoned")
    }

    /// Try to enter `Connecting`. Returns false when a gesture is already
    /// in flight.
    pub(crate) fn begin(&self) -> bool {
        let mut phase = self.phase.lock().expect("gesture lock poisoned");
        if *phase == GesturePhase::Connecting {
            return false;
        }
        *phase = GesturePhase::Connecting;
        true
    }

    pub(crate) fn settle(&self, phase: GesturePhase) {
        *self.phase.lock().expect("gesture lock poisoned") = phase;
    }

    /// Teardown: the extension disappeared, so any gesture result is void.
    pub(crate) fn reset(&self) {
        self.settle(GesturePhase::Idle);
    }
}
