//! Typed boundary around the external wallet controller.
//!
//! The browser extension hands the page an untyped controller object; the
//! rest of the workspace only ever sees it through [`ControllerHandle`],
//! which narrows the surface to the operations this layer needs and turns
//! every rejection into a [`ControllerCallFailed`] carrying the original
//! cause.

use anyhow::Result;
use async_trait::async_trait;
use sb_types::{
    ConnectedAccount, CreateCollectionParams, CreateTokenParams, IssueNftParams, IssueSptParams,
    MintedToken, TransactionResult, TransferOwnershipParams, UpdateAssetParams, WalletState,
};
use std::sync::Arc;
use thiserror::Error;

/// Callback registered with the controller's update channel. Fires with no
/// arguments on any wallet-side change (account switch, balance change,
/// lock/unlock).
pub type UpdateCallback = Box<dyn Fn() + Send + Sync>;

/// The external wallet controller contract.
///
/// Implemented by the injected extension object in production and by
/// scripted stand-ins in tests. All operations are asynchronous and may
/// reject; none of them are interpreted here beyond their signatures.
#[async_trait]
pub trait WalletController: Send + Sync {
    async fn get_wallet_state(&self) -> Result<WalletState>;
    async fn get_connected_account(&self) -> Result<Option<ConnectedAccount>>;
    /// Resolves on success, rejects on user denial.
    async fn connect_wallet(&self) -> Result<()>;
    /// Registers `callback` to fire on any wallet-side state change.
    /// Registration is append-only on the controller side; callers are
    /// responsible for registering at most once per handle lifetime.
    fn on_wallet_update(&self, callback: UpdateCallback);
    async fn get_user_minted_tokens(&self) -> Result<Vec<MintedToken>>;
    async fn is_valid_sys_address(&self, address: &str) -> Result<bool>;

    // Asset mutations, forwarded opaquely.
    async fn handle_create_token(&self, params: CreateTokenParams) -> Result<TransactionResult>;
    async fn handle_issue_nft(&self, params: IssueNftParams) -> Result<TransactionResult>;
    async fn handle_issue_spt(&self, params: IssueSptParams) -> Result<TransactionResult>;
    async fn handle_update_asset(&self, params: UpdateAssetParams) -> Result<TransactionResult>;
    async fn handle_transfer_ownership(
        &self,
        params: TransferOwnershipParams,
    ) -> Result<TransactionResult>;
    async fn handle_create_collection(
        &self,
        params: CreateCollectionParams,
    ) -> Result<TransactionResult>;
}

/// A rejected controller call. `op` names the extension-side method so the
/// failure can be surfaced at the call site with its origin intact.
#[derive(Debug, Error)]
#[error("wallet controller call `{op}` failed: {source}")]
pub struct ControllerCallFailed {
    pub op: &'static str,
    #[source]
    pub source: anyhow::Error,
}

/// Shared reference to the external controller.
///
/// The underlying controller object is never duplicated; cloning a handle
/// clones the reference only. The connection store owns the handle for the
/// page-session lifetime and other subsystems borrow it from there.
#[derive(Clone)]
pub struct ControllerHandle {
    inner: Arc<dyn WalletController>,
}

impl std::fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerHandle").finish_non_exhaustive()
    }
}

impl ControllerHandle {
    pub fn new(controller: Arc<dyn WalletController>) -> Self {
        Self { inner: controller }
    }

    /// True when both handles refer to the same controller object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn fail(op: &'static str) -> impl FnOnce(anyhow::Error) -> ControllerCallFailed {
        move |source| {
            tracing::warn!(op, error = %source, "wallet controller call rejected");
            ControllerCallFailed { op, source }
        }
    }

    pub async fn get_wallet_state(&self) -> Result<WalletState, ControllerCallFailed> {
        self.inner
            .get_wallet_state()
            .await
            .map_err(Self::fail("getWalletState"))
    }

    pub async fn get_connected_account(
        &self,
    ) -> Result<Option<ConnectedAccount>, ControllerCallFailed> {
        self.inner
            .get_connected_account()
            .await
            .map_err(Self::fail("getConnectedAccount"))
    }

    pub async fn connect_wallet(&self) -> Result<(), ControllerCallFailed> {
        self.inner
            .connect_wallet()
            .await
            .map_err(Self::fail("connectWallet"))
    }

    pub fn on_wallet_update(&self, callback: UpdateCallback) {
        self.inner.on_wallet_update(callback);
    }

    pub async fn get_user_minted_tokens(&self) -> Result<Vec<MintedToken>, ControllerCallFailed> {
        self.inner
            .get_user_minted_tokens()
            .await
            .map_err(Self::fail("getUserMintedTokens"))
    }

    pub async fn is_valid_sys_address(&self, address: &str) -> Result<bool, ControllerCallFailed> {
        self.inner
            .is_valid_sys_address(address)
            .await
            .map_err(Self::fail("isValidSYSAddress"))
    }

    pub async fn handle_create_token(
        &self,
        params: CreateTokenParams,
    ) -> Result<TransactionResult, ControllerCallFailed> {
        self.inner
            .handle_create_token(params)
            .await
            .map_err(Self::fail("handleCreateToken"))
    }

    pub async fn handle_issue_nft(
        &self,
        params: IssueNftParams,
    ) -> Result<TransactionResult, ControllerCallFailed> {
        self.inner
            .handle_issue_nft(params)
            .await
            .map_err(Self::fail("handleIssueNFT"))
    }

    pub async fn handle_issue_spt(
        &self,
        params: IssueSptParams,
    ) -> Result<TransactionResult, ControllerCallFailed> {
        self.inner
            .handle_issue_spt(params)
            .await
            .map_err(Self::fail("handleIssueSPT"))
    }

    pub async fn handle_update_asset(
        &self,
        params: UpdateAssetParams,
    ) -> Result<TransactionResult, ControllerCallFailed> {
        self.inner
            .handle_update_asset(params)
            .await
            .map_err(Self::fail("handleUpdateAsset"))
    }

    pub async fn handle_transfer_ownership(
        &self,
        params: TransferOwnershipParams,
    ) -> Result<TransactionResult, ControllerCallFailed> {
        self.inner
            .handle_transfer_ownership(params)
            .await
            .map_err(Self::fail("handleTransferOwnership"))
    }

    pub async fn handle_create_collection(
        &self,
        params: CreateCollectionParams,
    ) -> Result<TransactionResult, ControllerCallFailed> {
        self.inner
            .handle_create_collection(params)
            .await
            .map_err(Self::fail("handleCreateCollection"))
    }
}
