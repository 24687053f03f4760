//! The wallet bridge: one detection subscription, one update-signal
//! consumer, and the connect gesture, all publishing into a shared
//! [`ConnectionStore`].

use crate::connect::{ConnectError, ConnectGesture, ConnectOutcome, GesturePhase};
use crate::detect::{DetectionEvent, DetectionSender, detection_channel};
use crate::store::{ConnectionStore, StateUpdate};
use crate::sync::AccountSync;
use sb_controller::ControllerHandle;
use sb_types::{AccountSnapshot, InstallationStatus};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct WalletBridge {
    store: Arc<ConnectionStore>,
    sync: AccountSync,
    gesture: ConnectGesture,
    update_tx: mpsc::UnboundedSender<()>,
    /// Controller whose `onWalletUpdate` channel we are hooked into.
    /// Guards against registering the callback twice for one handle.
    hooked: Mutex<Option<ControllerHandle>>,
}

impl WalletBridge {
    /// Create the bridge and spawn its two tasks: the single process-wide
    /// detection subscription and the wallet-update signal consumer.
    pub fn spawn() -> (Arc<Self>, DetectionSender) {
        let store = ConnectionStore::new();
        let (detect_tx, detect_rx) = detection_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let bridge = Arc::new(Self {
            sync: AccountSync::new(store.clone()),
            store,
            gesture: ConnectGesture::default(),
            update_tx,
            hooked: Mutex::new(None),
        });

        tokio::spawn(detection_task(bridge.clone(), detect_rx));
        tokio::spawn(update_task(bridge.clone(), update_rx));
        (bridge, detect_tx)
    }

    pub fn store(&self) -> &Arc<ConnectionStore> {
        &self.store
    }

    pub fn gesture_phase(&self) -> GesturePhase {
        self.gesture.phase()
    }

    /// Run the account sync routine against the current controller, if one
    /// is held. No-op otherwise.
    pub async fn resync(&self) {
        if let Some(controller) = self.store.controller() {
            self.sync.run(&controller).await;
        }
    }

    /// The connect gesture. Requires a detected extension; a second
    /// gesture while one is in flight is a no-op. On success the account
    /// sync routine runs before `Connected` is reported, so `Connected` is
    /// never observed with a stale snapshot.
    pub async fn connect(&self) -> Result<ConnectOutcome, ConnectError> {
        let state = self.store.get();
        if state.installation_status != InstallationStatus::Installed {
            return Err(ConnectError::NotInstalled);
        }
        let Some(controller) = state.controller else {
            return Err(ConnectError::NotInstalled);
        };

        if !self.gesture.begin() {
            debug!("connect gesture already in flight; ignoring");
            return Ok(ConnectOutcome::AlreadyInFlight);
        }

        match controller.connect_wallet().await {
            Ok(()) => {
                // The extension may have been torn down while the call was
                // in flight; `Connected` must never be reported for a
                // controller the store no longer holds.
                let held = self.store.controller();
                if !held.as_ref().is_some_and(|h| h.ptr_eq(&controller)) {
                    debug!("extension removed during connect; gesture voided");
                    return Err(ConnectError::NotInstalled);
                }
                self.sync.run(&controller).await;
                self.gesture.settle(GesturePhase::Connected);
                Ok(ConnectOutcome::Connected)
            }
            Err(err) => {
                self.gesture.settle(GesturePhase::Idle);
                Err(ConnectError::Rejected(err))
            }
        }
    }

    /// Register the wallet-update callback at most once per controller
    /// handle lifetime.
    fn ensure_update_hook(&self, controller: &ControllerHandle) {
        let mut hooked = self.hooked.lock().expect("hook lock poisoned");
        if hooked.as_ref().is_some_and(|h| h.ptr_eq(controller)) {
            return;
        }
        let tx = self.update_tx.clone();
        controller.on_wallet_update(Box::new(move || {
            // Resolved on the bridge's update task; a closed channel means
            // the bridge is gone and the signal is moot.
            let _ = tx.send(());
        }));
        *hooked = Some(controller.clone());
    }
}

/// The single detection subscription. Ends (unsubscribes) when the
/// extension reports itself removed.
async fn detection_task(
    bridge: Arc<WalletBridge>,
    mut rx: mpsc::UnboundedReceiver<DetectionEvent>,
) {
    while let Some(event) = rx.recv().await {
        if !handle_detection(&bridge, event) {
            break;
        }
    }
    debug!("detection channel unsubscribed");
}

/// Process one detection notification. Returns false when the channel must
/// unsubscribe itself (extension removed).
fn handle_detection(bridge: &Arc<WalletBridge>, event: DetectionEvent) -> bool {
    match (event.installed, event.controller) {
        (true, Some(controller)) => {
            info!("wallet extension detected");
            bridge.store.apply(
                StateUpdate::default()
                    .installation_status(InstallationStatus::Installed)
                    .controller(controller.clone()),
            );
            bridge.ensure_update_hook(&controller);

            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge.sync.run(&controller).await;
            });
            true
        }
        (true, None) => {
            // Extension announced itself without handing over the
            // controller yet; a later notification will carry it.
            debug!("wallet extension announced without controller; awaiting handle");
            true
        }
        (false, _) => {
            info!("wallet extension removed; tearing down");
            bridge.gesture.reset();
            bridge.sync.invalidate();
            *bridge.hooked.lock().expect("hook lock poisoned") = None;
            bridge.store.apply(
                StateUpdate::default()
                    .installation_status(InstallationStatus::NotInstalled)
                    .clear_controller()
                    .account(AccountSnapshot::disconnected())
                    .is_locked(false),
            );
            false
        }
    }
}

/// Consumes wallet-update signals; each signal triggers a fresh sync run.
/// Runs are spawned so they may interleave; the sync routine's sequence
/// numbers keep the last-issued result authoritative.
async fn update_task(bridge: Arc<WalletBridge>, mut rx: mpsc::UnboundedReceiver<()>) {
    while rx.recv().await.is_some() {
        match bridge.store.controller() {
            Some(controller) => {
                let bridge = bridge.clone();
                tokio::spawn(async move {
                    bridge.sync.run(&controller).await;
                });
            }
            None => debug!("wallet update signal with no controller; ignored"),
        }
    }
}
