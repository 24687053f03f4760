//! Detection channel.
//!
//! The host page receives broadcast notifications announcing wallet
//! extension presence (the extension's `SyscoinStatus` event). Exactly one
//! subscription exists process-wide: the bridge consumes a single event
//! receiver, so per-view duplicate subscriptions cannot occur.

use sb_controller::ControllerHandle;
use tokio::sync::mpsc;
use tracing::debug;

/// One detection notification. Mirrors the extension's event detail:
/// `{ SyscoinInstalled, ConnectionsController? }`.
pub struct DetectionEvent {
    pub installed: bool,
    pub controller: Option<ControllerHandle>,
}

impl DetectionEvent {
    /// Extension present, controller reference attached.
    pub fn installed(controller: ControllerHandle) -> Self {
        Self {
            installed: true,
            controller: Some(controller),
        }
    }

    /// Extension present but the controller reference has not been handed
    /// over yet; a later notification will carry it.
    pub fn announced() -> Self {
        Self {
            installed: true,
            controller: None,
        }
    }

    /// Extension absent or removed.
    pub fn removed() -> Self {
        Self {
            installed: false,
            controller: None,
        }
    }
}

/// Sending side of the detection channel, held by the host-page glue that
/// receives the raw broadcast event.
#[derive(Clone)]
pub struct DetectionSender {
    tx: mpsc::UnboundedSender<DetectionEvent>,
}

impl DetectionSender {
    pub fn announce(&self, event: DetectionEvent) {
        // After teardown the bridge has unsubscribed; late notifications
        // are dropped.
        if self.tx.send(event).is_err() {
            debug!("detection notification dropped; channel closed");
        }
    }
}

pub(crate) fn detection_channel() -> (DetectionSender, mpsc::UnboundedReceiver<DetectionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DetectionSender { tx }, rx)
}
