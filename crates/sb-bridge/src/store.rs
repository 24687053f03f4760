//! Shared connection store.
//!
//! Single source of truth for connection state, readable by every view
//! binding. Writers (the detection channel and the account sync routine)
//! apply partial updates that replace whole top-level fields; readers never
//! observe a half-updated account snapshot.

use sb_controller::ControllerHandle;
use sb_types::{AccountSnapshot, ConnectionView, InstallationStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// The aggregate connection state. Invariant: `account.connected == true`
/// only when `controller` is set and `installation_status == Installed`.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub installation_status: InstallationStatus,
    pub controller: Option<ControllerHandle>,
    pub account: AccountSnapshot,
    pub is_locked: bool,
}

impl ConnectionState {
    pub fn view(&self) -> ConnectionView {
        ConnectionView {
            installation_status: self.installation_status,
            account: self.account.clone(),
            is_locked: self.is_locked,
            has_controller: self.controller.is_some(),
        }
    }
}

/// Partial update applied atomically by [`ConnectionStore::apply`]. Fields
/// left unset keep their current value; set fields are replaced wholesale.
#[derive(Default)]
pub struct StateUpdate {
    installation_status: Option<InstallationStatus>,
    controller: Option<Option<ControllerHandle>>,
    account: Option<AccountSnapshot>,
    is_locked: Option<bool>,
}

impl StateUpdate {
    pub fn installation_status(mut self, status: InstallationStatus) -> Self {
        self.installation_status = Some(status);
        self
    }

    pub fn controller(mut self, handle: ControllerHandle) -> Self {
        self.controller = Some(Some(handle));
        self
    }

    pub fn clear_controller(mut self) -> Self {
        self.controller = Some(None);
        self
    }

    pub fn account(mut self, snapshot: AccountSnapshot) -> Self {
        self.account = Some(snapshot);
        self
    }

    pub fn is_locked(mut self, locked: bool) -> Self {
        self.is_locked = Some(locked);
        self
    }
}

type Listener = Arc<dyn Fn(&ConnectionState) + Send + Sync>;

/// Process-wide connection state with subscriber notification.
///
/// Subscribers observe `apply` calls in the order they were issued; the
/// delivery lock is held across mutation and dispatch so two concurrent
/// writers cannot deliver their notifications out of order. The registration
/// lock is released before listeners run, so a listener may subscribe or
/// drop a [`Subscription`] from inside its callback.
#[derive(Default)]
pub struct ConnectionStore {
    state: Mutex<ConnectionState>,
    subscribers: Mutex<Vec<(u64, Listener)>>,
    delivery: Mutex<()>,
    next_subscriber_id: AtomicU64,
}

impl ConnectionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current state, cloned. Never blocks on in-flight controller calls.
    pub fn get(&self) -> ConnectionState {
        self.state.lock().expect("connection store lock poisoned").clone()
    }

    /// Borrow the controller handle, if one is held.
    pub fn controller(&self) -> Option<ControllerHandle> {
        self.state
            .lock()
            .expect("connection store lock poisoned")
            .controller
            .clone()
    }

    pub fn installation_status(&self) -> InstallationStatus {
        self.state
            .lock()
            .expect("connection store lock poisoned")
            .installation_status
    }

    /// Atomically apply `update` and notify every subscriber with the
    /// resulting state.
    pub fn apply(&self, update: StateUpdate) {
        let _order = self.delivery.lock().expect("delivery lock poisoned");
        let snapshot = {
            let mut state = self.state.lock().expect("connection store lock poisoned");
            if let Some(status) = update.installation_status {
                state.installation_status = status;
            }
            if let Some(controller) = update.controller {
                state.controller = controller;
            }
            if let Some(account) = update.account {
                state.account = account;
            }
            if let Some(locked) = update.is_locked {
                state.is_locked = locked;
            }
            state.clone()
        };
        // Snapshot the listener list and release the registration lock
        // before dispatching, so listeners may (un)subscribe reentrantly.
        let listeners: Vec<Listener> = self
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Register `listener` for every subsequent `apply`. The returned
    /// [`Subscription`] unregisters on drop; dropping one subscription
    /// leaves all others intact.
    pub fn subscribe(
        self: Arc<Self>,
        listener: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .retain(|(sub_id, _)| *sub_id != id);
    }
}

/// Guard for one store subscription; unregisters its listener on drop.
pub struct Subscription {
    id: u64,
    store: Weak<ConnectionStore>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}
