//! Scripted wallet controller for tests: programmable results, call
//! counters, and gates for pinning the resolution order of in-flight
//! calls.

use crate::store::{ConnectionState, ConnectionStore};
use anyhow::{Result, bail};
use async_trait::async_trait;
use sb_controller::{ControllerHandle, UpdateCallback, WalletController};
use sb_types::{
    AccountAddress, ConnectedAccount, CreateCollectionParams, CreateTokenParams, IssueNftParams,
    IssueSptParams, MintedToken, TransactionResult, TransferOwnershipParams, UpdateAssetParams,
    WalletState,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Default)]
pub struct MockController {
    pub wallet_state: Mutex<WalletState>,
    pub connected_account: Mutex<Option<ConnectedAccount>>,
    pub minted: Mutex<Vec<MintedToken>>,
    pub deny_connect: AtomicBool,
    pub fail_wallet_state: AtomicBool,
    pub connect_calls: AtomicUsize,
    pub tx_counter: AtomicUsize,
    update_callbacks: Mutex<Vec<UpdateCallback>>,
    state_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    connect_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl MockController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handle(self: Arc<Self>) -> ControllerHandle {
        ControllerHandle::new(self)
    }

    /// Script a connected account (and a matching non-empty account list).
    pub fn set_account(&self, address: &str, label: &str, balance: f64) {
        self.wallet_state.lock().unwrap().accounts = vec![serde_json::json!({ "label": label })];
        *self.connected_account.lock().unwrap() = Some(ConnectedAccount {
            address: AccountAddress {
                main: address.to_owned(),
            },
            label: label.to_owned(),
            balance,
            assets: Vec::new(),
        });
    }

    pub fn set_locked(&self, locked: bool) {
        self.wallet_state.lock().unwrap().is_locked = locked;
    }

    /// The next `getWalletState` call blocks until the returned sender
    /// fires (or is dropped).
    pub fn gate_next_wallet_state(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state_gates.lock().unwrap().push_back(rx);
        tx
    }

    /// The next `connectWallet` call blocks until the returned sender
    /// fires (or is dropped).
    pub fn gate_next_connect(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.connect_gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Fire every registered wallet-update callback, as the extension does
    /// on any wallet-side change.
    pub fn fire_update(&self) {
        for callback in self.update_callbacks.lock().unwrap().iter() {
            callback();
        }
    }

    pub fn update_callback_count(&self) -> usize {
        self.update_callbacks.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletController for MockController {
    async fn get_wallet_state(&self) -> Result<WalletState> {
        let gate = self.state_gates.lock().unwrap().pop_front();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if self.fail_wallet_state.load(Ordering::SeqCst) {
            bail!("extension unreachable");
        }
        Ok(self.wallet_state.lock().unwrap().clone())
    }

    async fn get_connected_account(&self) -> Result<Option<ConnectedAccount>> {
        Ok(self.connected_account.lock().unwrap().clone())
    }

    async fn connect_wallet(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.connect_gates.lock().unwrap().pop_front();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if self.deny_connect.load(Ordering::SeqCst) {
            bail!("user denied connection");
        }
        Ok(())
    }

    fn on_wallet_update(&self, callback: UpdateCallback) {
        self.update_callbacks.lock().unwrap().push(callback);
    }

    async fn get_user_minted_tokens(&self) -> Result<Vec<MintedToken>> {
        Ok(self.minted.lock().unwrap().clone())
    }

    async fn is_valid_sys_address(&self, address: &str) -> Result<bool> {
        Ok(address.starts_with("sys1") || address.starts_with("tsys1"))
    }

    async fn handle_create_token(&self, _params: CreateTokenParams) -> Result<TransactionResult> {
        Ok(self.next_tx())
    }

    async fn handle_issue_nft(&self, _params: IssueNftParams) -> Result<TransactionResult> {
        Ok(self.next_tx())
    }

    async fn handle_issue_spt(&self, _params: IssueSptParams) -> Result<TransactionResult> {
        Ok(self.next_tx())
    }

    async fn handle_update_asset(&self, _params: UpdateAssetParams) -> Result<TransactionResult> {
        Ok(self.next_tx())
    }

    async fn handle_transfer_ownership(
        &self,
        _params: TransferOwnershipParams,
    ) -> Result<TransactionResult> {
        Ok(self.next_tx())
    }

    async fn handle_create_collection(
        &self,
        _params: CreateCollectionParams,
    ) -> Result<TransactionResult> {
        Ok(self.next_tx())
    }
}

impl MockController {
    fn next_tx(&self) -> TransactionResult {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        TransactionResult {
            txid: format!("mock-tx-{n:04}"),
        }
    }
}

/// Block until the store satisfies `pred` (or two seconds pass).
pub async fn wait_for(
    store: &Arc<ConnectionStore>,
    pred: impl Fn(&ConnectionState) -> bool + Send + Sync + 'static,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pred = Arc::new(pred);
    let pred2 = pred.clone();
    let _sub = store.clone().subscribe(move |state| {
        if pred2(state) {
            let _ = tx.send(());
        }
    });
    if pred(&store.get()) {
        return;
    }
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for store state");
}
