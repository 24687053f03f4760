//! Shared value objects for the SysBridge workspace.
//!
//! Wire types mirror the JSON field spellings used by the browser wallet
//! extension (`assetGuid`, nested `address.main`, camelCase params), so a
//! payload lifted from the extension deserializes without adaptation.

use serde::{Deserialize, Serialize};

/// Whether a compatible wallet extension has been detected on the page.
///
/// Transitions are forward-only (`Unknown` → `Installed`) except for an
/// explicit teardown event, which resets to `NotInstalled`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStatus {
    #[default]
    Unknown,
    NotInstalled,
    Installed,
}

/// Point-in-time view of the active wallet account.
///
/// Produced wholesale on every sync cycle and never mutated in place; a
/// reader either sees the previous snapshot or the new one, never a mix.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub address: String,
    pub label: String,
    pub balance: f64,
    pub connected: bool,
}

impl AccountSnapshot {
    /// The snapshot published when no account is connected.
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn from_account(account: &ConnectedAccount) -> Self {
        Self {
            address: account.address.main.clone(),
            label: account.label.clone(),
            balance: account.balance,
            connected: true,
        }
    }
}

/// Address record as the extension reports it: the spendable address is
/// nested under `main`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountAddress {
    pub main: String,
}

/// Result of the extension's `getConnectedAccount()` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccount {
    pub address: AccountAddress,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub assets: Vec<AssetBalance>,
}

/// Per-asset holding inside a connected account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub asset_guid: String,
    pub symbol: String,
    #[serde(default)]
    pub balance: f64,
}

/// Result of the extension's `getWalletState()` call. Account entries are
/// opaque to this layer; only their presence matters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    #[serde(default)]
    pub accounts: Vec<serde_json::Value>,
    #[serde(default)]
    pub is_locked: bool,
}

/// A token the connected account has minted, from `getUserMintedTokens()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MintedToken {
    pub asset_guid: String,
    pub symbol: String,
}

/// Outcome of a forwarded asset mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub txid: String,
}

// ── Forwarded asset-operation params ──
//
// These pass through the controller boundary opaquely; this layer never
// interprets them beyond (de)serialization.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenParams {
    pub precision: u8,
    pub symbol: String,
    pub max_supply: f64,
    #[serde(default)]
    pub initial_supply: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub receiver: String,
    #[serde(default)]
    pub capability_flags: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssueSptParams {
    pub asset_guid: String,
    pub amount: f64,
    pub receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssueNftParams {
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
    pub receiver: String,
    #[serde(default)]
    pub precision: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssetParams {
    pub asset_guid: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub capability_flags: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferOwnershipParams {
    pub asset_guid: String,
    pub new_owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionParams {
    pub collection_name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
    pub receiver: String,
}

/// Serializable projection of the shared connection state, for view
/// bindings that render it (the controller handle itself is elided).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    pub installation_status: InstallationStatus,
    pub account: AccountSnapshot,
    pub is_locked: bool,
    pub has_controller: bool,
}
