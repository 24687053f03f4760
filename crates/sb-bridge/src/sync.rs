//! Account sync routine.
//!
//! Queries the wallet controller and publishes a fresh account snapshot
//! into the connection store. Runs may overlap (every await is a
//! reentrancy point); each run carries a sequence number and only the
//! latest-issued run is allowed to publish, so a slow early run can never
//! clobber the result of a later one.

use crate::store::{ConnectionStore, StateUpdate};
use sb_controller::{ControllerCallFailed, ControllerHandle};
use sb_types::AccountSnapshot;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Consecutive empty `getConnectedAccount` results (while the wallet
/// reports accounts) before the disagreement is flagged as inconsistent.
const INCONSISTENT_RUN_THRESHOLD: u32 = 2;

pub struct AccountSync {
    store: Arc<ConnectionStore>,
    latest_seq: AtomicU64,
    /// Sequence number of the last run that published. Publishing locks
    /// this for the whole check-then-apply step, so a later-issued run
    /// cannot slip its result in between an earlier run's staleness check
    /// and its store write.
    last_published: Mutex<u64>,
    empty_account_runs: AtomicU32,
}

impl AccountSync {
    pub fn new(store: Arc<ConnectionStore>) -> Self {
        Self {
            store,
            latest_seq: AtomicU64::new(0),
            last_published: Mutex::new(0),
            empty_account_runs: AtomicU32::new(0),
        }
    }

    /// One sync run: query wallet state, normalize, publish.
    ///
    /// Controller failures are converted into a disconnected snapshot
    /// rather than propagated; nothing in this routine is fatal to the
    /// caller.
    pub async fn run(&self, controller: &ControllerHandle) {
        let seq = self.latest_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.query(controller).await;

        let (snapshot, locked) = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "sync run failed; publishing disconnected snapshot");
                (AccountSnapshot::disconnected(), false)
            }
        };
        self.publish(seq, controller, snapshot, locked);
    }

    /// Void every run currently in flight. Called on teardown so a sync
    /// that was awaiting the controller when the extension disappeared can
    /// never publish into the torn-down store.
    pub(crate) fn invalidate(&self) {
        self.latest_seq.fetch_add(1, Ordering::SeqCst);
    }

    /// Check-then-apply, atomically with respect to other publishers.
    fn publish(
        &self,
        seq: u64,
        controller: &ControllerHandle,
        snapshot: AccountSnapshot,
        locked: bool,
    ) {
        let mut last = self.last_published.lock().expect("publish lock poisoned");

        // A newer run was issued (or teardown invalidated us) while this
        // one was awaiting; its result is stale and must not land.
        if self.latest_seq.load(Ordering::SeqCst) != seq || *last > seq {
            debug!(seq, "stale sync result discarded");
            return;
        }

        // The store must still hold the controller this run queried;
        // otherwise the extension was removed or replaced mid-run and a
        // connected snapshot would contradict the store's own state.
        let held = self.store.controller();
        if !held.as_ref().is_some_and(|h| h.ptr_eq(controller)) {
            debug!(seq, "controller released during sync; result discarded");
            return;
        }

        *last = seq;
        self.store
            .apply(StateUpdate::default().account(snapshot).is_locked(locked));
    }

    /// Query phase. The snapshot is built entirely from a single call's
    /// result; wallet-state and connected-account data are never merged.
    async fn query(
        &self,
        controller: &ControllerHandle,
    ) -> Result<(AccountSnapshot, bool), ControllerCallFailed> {
        let wallet = controller.get_wallet_state().await?;
        if wallet.accounts.is_empty() || wallet.is_locked {
            self.empty_account_runs.store(0, Ordering::SeqCst);
            return Ok((AccountSnapshot::disconnected(), wallet.is_locked));
        }

        match controller.get_connected_account().await? {
            Some(account) => {
                self.empty_account_runs.store(0, Ordering::SeqCst);
                Ok((AccountSnapshot::from_account(&account), false))
            }
            None => {
                // The wallet lists accounts but reports none connected.
                // Transient extension timing; treat as disconnected and
                // only flag it once it repeats.
                let runs = self.empty_account_runs.fetch_add(1, Ordering::SeqCst) + 1;
                if runs >= INCONSISTENT_RUN_THRESHOLD {
                    warn!(runs, "wallet reports accounts but no connected account");
                }
                Ok((AccountSnapshot::disconnected(), false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockController;
    use std::sync::Mutex;
    use std::time::Duration;

    fn fixture(controller: &ControllerHandle) -> (Arc<ConnectionStore>, Arc<AccountSync>) {
        let store = ConnectionStore::new();
        store.apply(StateUpdate::default().controller(controller.clone()));
        let sync = Arc::new(AccountSync::new(store.clone()));
        (store, sync)
    }

    #[tokio::test]
    async fn empty_account_list_publishes_disconnected() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);
        sync.run(&handle).await;

        let account = store.get().account;
        assert!(!account.connected);
        assert_eq!(account.address, "");
        assert_eq!(account.balance, 0.0);
    }

    #[tokio::test]
    async fn connected_account_is_published_wholesale() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);
        mock.set_account("sys1qxyz", "Acct1", 42.0);
        sync.run(&handle).await;

        let account = store.get().account;
        assert!(account.connected);
        assert_eq!(account.address, "sys1qxyz");
        assert_eq!(account.label, "Acct1");
        assert_eq!(account.balance, 42.0);
    }

    #[tokio::test]
    async fn locked_wallet_is_published_disconnected() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);
        mock.set_account("sys1qxyz", "Acct1", 42.0);
        mock.set_locked(true);
        sync.run(&handle).await;

        let state = store.get();
        assert!(!state.account.connected);
        assert!(state.is_locked);

        mock.set_locked(false);
        sync.run(&handle).await;
        let state = store.get();
        assert!(state.account.connected);
        assert!(!state.is_locked);
    }

    #[tokio::test]
    async fn accounts_without_connected_account_stay_disconnected() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);
        mock.wallet_state.lock().unwrap().accounts = vec![serde_json::json!({})];

        // Twice in a row: the inconsistent-snapshot path, still just
        // disconnected state, never a hard error.
        sync.run(&handle).await;
        sync.run(&handle).await;
        assert!(!store.get().account.connected);
    }

    #[tokio::test]
    async fn controller_failure_becomes_disconnected_state() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);
        mock.set_account("sys1qxyz", "Acct1", 42.0);
        sync.run(&handle).await;
        assert!(store.get().account.connected);

        mock.fail_wallet_state
            .store(true, std::sync::atomic::Ordering::SeqCst);
        sync.run(&handle).await;
        assert!(!store.get().account.connected);
    }

    #[tokio::test]
    async fn late_resolving_earlier_run_is_discarded() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);

        mock.set_account("sys1qaaa", "A", 1.0);
        let gate = mock.gate_next_wallet_state();

        let early = {
            let sync = sync.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                sync.run(&handle).await;
            })
        };
        // Let the early run take its sequence number and park on the gate.
        tokio::time::sleep(Duration::from_millis(20)).await;

        mock.set_account("sys1qbbb", "B", 2.0);
        sync.run(&handle).await;
        assert_eq!(store.get().account.address, "sys1qbbb");

        // The early run now resolves against newer wallet data, but its
        // sequence number is stale; nothing may land.
        mock.set_account("sys1qccc", "C", 3.0);
        let _ = gate.send(());
        early.await.unwrap();

        assert_eq!(store.get().account.address, "sys1qbbb");
        assert_eq!(store.get().account.balance, 2.0);
    }

    #[tokio::test]
    async fn run_against_released_controller_publishes_nothing() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);
        mock.set_account("sys1qxyz", "Acct1", 42.0);

        let gate = mock.gate_next_wallet_state();
        let run = {
            let sync = sync.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                sync.run(&handle).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The controller is dropped from the store while the run is
        // parked; its connected snapshot must be discarded.
        store.apply(StateUpdate::default().clear_controller());
        let _ = gate.send(());
        run.await.unwrap();

        assert!(!store.get().account.connected);
        assert_eq!(store.get().account.address, "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn later_issued_run_always_wins_the_store() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);

        // A parked early run resolving in parallel with a later-issued
        // run must never leave the store holding the earlier balance, no
        // matter how the two publishes interleave across threads.
        for round in 0..50u32 {
            let stale = f64::from(round);
            let fresh = f64::from(round) + 0.5;
            mock.set_account("sys1qrace", "Race", stale);

            let gate = mock.gate_next_wallet_state();
            let early = {
                let sync = sync.clone();
                let handle = handle.clone();
                tokio::spawn(async move {
                    sync.run(&handle).await;
                })
            };
            tokio::time::sleep(Duration::from_millis(2)).await;

            let _ = gate.send(());
            mock.set_account("sys1qrace", "Race", fresh);
            let late = {
                let sync = sync.clone();
                let handle = handle.clone();
                tokio::spawn(async move {
                    sync.run(&handle).await;
                })
            };
            early.await.unwrap();
            late.await.unwrap();

            assert_eq!(store.get().account.balance, fresh);
        }
    }

    #[tokio::test]
    async fn interleaved_runs_never_publish_merged_snapshots() {
        let mock = MockController::new();
        let handle = mock.clone().handle();
        let (store, sync) = fixture(&handle);

        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed2 = observed.clone();
        let _sub = store.clone().subscribe(move |state| {
            observed2.lock().unwrap().push(state.account.clone());
        });

        mock.set_account("sys1qaaa", "A", 1.0);
        let gate = mock.gate_next_wallet_state();
        let early = {
            let sync = sync.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                sync.run(&handle).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        mock.set_account("sys1qbbb", "B", 2.0);
        sync.run(&handle).await;
        let _ = gate.send(());
        early.await.unwrap();

        // Every observed snapshot is one run's result in full; no
        // address-from-one, balance-from-another mixtures.
        for snapshot in observed.lock().unwrap().iter() {
            match snapshot.address.as_str() {
                "sys1qaaa" => {
                    assert_eq!(snapshot.label, "A");
                    assert_eq!(snapshot.balance, 1.0);
                }
                "sys1qbbb" => {
                    assert_eq!(snapshot.label, "B");
                    assert_eq!(snapshot.balance, 2.0);
                }
                "" => assert!(!snapshot.connected),
                other => panic!("unexpected snapshot address {other}"),
            }
        }
    }
}
