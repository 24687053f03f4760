//! Wallet-extension bridge and account synchronization.
//!
//! The browser wallet extension announces itself over a broadcast channel,
//! hands the page an opaque controller object, and changes state out of
//! band. This crate turns that into one coherent layer: a single detection
//! subscription ([`DetectionSender`]/[`WalletBridge`]), a sequence-numbered
//! account sync routine, a shared [`ConnectionStore`] every view binding
//! reads, and a non-reentrant connect gesture.

mod bridge;
mod connect;
mod detect;
mod store;
mod sync;

pub use bridge::WalletBridge;
pub use connect::{ConnectError, ConnectOutcome, GesturePhase};
pub use detect::{DetectionEvent, DetectionSender};
pub use store::{ConnectionState, ConnectionStore, StateUpdate, Subscription};

#[cfg(test)]
pub(crate) mod testutil;
