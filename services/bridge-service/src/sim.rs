//! Simulated wallet controller.
//!
//! Stands in for the browser extension so the service runs stand-alone:
//! one in-memory account, a lock flag, and an update channel that fires on
//! every wallet-side mutation, matching the extension's observable
//! behavior at the controller boundary.

use anyhow::{Result, bail};
use async_trait::async_trait;
use sb_controller::{ControllerHandle, UpdateCallback, WalletController};
use sb_types::{
    AccountAddress, ConnectedAccount, CreateCollectionParams, CreateTokenParams, IssueNftParams,
    IssueSptParams, MintedToken, TransactionResult, TransferOwnershipParams, UpdateAssetParams,
    WalletState,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SimulatedWallet {
    account: Mutex<ConnectedAccount>,
    connected: AtomicBool,
    locked: AtomicBool,
    minted: Mutex<Vec<MintedToken>>,
    callbacks: Mutex<Vec<UpdateCallback>>,
    tx_counter: AtomicU64,
    guid_counter: AtomicU64,
}

impl SimulatedWallet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            account: Mutex::new(ConnectedAccount {
                address: AccountAddress {
                    main: "tsys1qsim0account0000000000000000000000000".to_owned(),
                },
                label: "Simulated Account".to_owned(),
                balance: 100.0,
                assets: Vec::new(),
            }),
            connected: AtomicBool::new(false),
            locked: AtomicBool::new(false),
            minted: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
            tx_counter: AtomicU64::new(0),
            guid_counter: AtomicU64::new(0x1000_0000),
        })
    }

    pub fn handle(self: Arc<Self>) -> ControllerHandle {
        ControllerHandle::new(self)
    }

    pub fn set_balance(&self, balance: f64) {
        self.account.lock().expect("sim lock poisoned").balance = balance;
        self.notify();
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
        self.notify();
    }

    fn notify(&self) {
        for callback in self.callbacks.lock().expect("sim lock poisoned").iter() {
            callback();
        }
    }

    fn next_txid(&self) -> TransactionResult {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        TransactionResult {
            txid: format!("sim-tx-{n:06}"),
        }
    }

    fn next_guid(&self) -> String {
        self.guid_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }
}

#[async_trait]
impl WalletController for SimulatedWallet {
    async fn get_wallet_state(&self) -> Result<WalletState> {
        let label = self.account.lock().expect("sim lock poisoned").label.clone();
        Ok(WalletState {
            accounts: vec![serde_json::json!({ "label": label })],
            is_locked: self.locked.load(Ordering::SeqCst),
        })
    }

    async fn get_connected_account(&self) -> Result<Option<ConnectedAccount>> {
        // A locked wallet never reports a connected account, stale or not.
        if !self.connected.load(Ordering::SeqCst) || self.locked.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.account.lock().expect("sim lock poisoned").clone()))
    }

    async fn connect_wallet(&self) -> Result<()> {
        if self.locked.load(Ordering::SeqCst) {
            bail!("wallet is locked");
        }
        self.connected.store(true, Ordering::SeqCst);
        info!("simulated wallet connected");
        self.notify();
        Ok(())
    }

    fn on_wallet_update(&self, callback: UpdateCallback) {
        self.callbacks.lock().expect("sim lock poisoned").push(callback);
    }

    async fn get_user_minted_tokens(&self) -> Result<Vec<MintedToken>> {
        Ok(self.minted.lock().expect("sim lock poisoned").clone())
    }

    async fn is_valid_sys_address(&self, address: &str) -> Result<bool> {
        Ok((address.starts_with("sys1") || address.starts_with("tsys1")) && address.len() >= 14)
    }

    async fn handle_create_token(&self, params: CreateTokenParams) -> Result<TransactionResult> {
        let guid = self.next_guid();
        self.minted.lock().expect("sim lock poisoned").push(MintedToken {
            asset_guid: guid,
            symbol: params.symbol,
        });
        self.notify();
        Ok(self.next_txid())
    }

    async fn handle_issue_nft(&self, params: IssueNftParams) -> Result<TransactionResult> {
        let guid = self.next_guid();
        self.minted.lock().expect("sim lock poisoned").push(MintedToken {
            asset_guid: guid,
            symbol: params.symbol,
        });
        self.notify();
        Ok(self.next_txid())
    }

    async fn handle_issue_spt(&self, params: IssueSptParams) -> Result<TransactionResult> {
        let known = self
            .minted
            .lock()
            .expect("sim lock poisoned")
            .iter()
            .any(|token| token.asset_guid == params.asset_guid);
        if !known {
            bail!("unknown asset {}", params.asset_guid);
        }
        self.notify();
        Ok(self.next_txid())
    }

    async fn handle_update_asset(&self, params: UpdateAssetParams) -> Result<TransactionResult> {
        let known = self
            .minted
            .lock()
            .expect("sim lock poisoned")
            .iter()
            .any(|token| token.asset_guid == params.asset_guid);
        if !known {
            bail!("unknown asset {}", params.asset_guid);
        }
        Ok(self.next_txid())
    }

    async fn handle_transfer_ownership(
        &self,
        params: TransferOwnershipParams,
    ) -> Result<TransactionResult> {
        let mut minted = self.minted.lock().expect("sim lock poisoned");
        let before = minted.len();
        minted.retain(|token| token.asset_guid != params.asset_guid);
        if minted.len() == before {
            bail!("unknown asset {}", params.asset_guid);
        }
        drop(minted);
        self.notify();
        Ok(self.next_txid())
    }

    async fn handle_create_collection(
        &self,
        params: CreateCollectionParams,
    ) -> Result<TransactionResult> {
        let guid = self.next_guid();
        self.minted.lock().expect("sim lock poisoned").push(MintedToken {
            asset_guid: guid,
            symbol: params.symbol,
        });
        self.notify();
        Ok(self.next_txid())
    }
}
