//! Wallet-control endpoint integration for the escrow coordination engine
//!
//! This crate provides the loopback-only endpoint validator, the outbound
//! JSON-RPC client with its timeout/retry policy, and the `WalletControl`
//! trait the coordination layer drives wallets through.

pub mod control;
pub mod rpc;
pub mod validation;

pub use control::{RpcControlFactory, WalletControl, WalletControlFactory};
pub use rpc::{RpcClientConfig, WalletRpcClient};
pub use validation::{ensure_loopback, validate_endpoint, ValidatedEndpoint};
