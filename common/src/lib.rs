//! Common types and utilities for the escrow coordination engine
//!
//! This crate contains the shared wire types for the wallet-control RPC
//! protocol, the error taxonomy, format validation for the opaque handshake
//! material, and the log sanitization helpers used across the engine.

pub mod error;
pub mod format;
pub mod sanitize;
pub mod types;

pub use error::{Error, Result, RpcError};
pub use types::*;

// ============================================
// CONSTANTS
// ============================================

/// Signatures required to spend from the escrow wallet (2-of-3).
pub const MULTISIG_THRESHOLD: u32 = 2;

/// Total number of escrow parties (buyer, vendor, arbiter).
pub const MULTISIG_PARTIES: u32 = 3;

/// Accepted prefixes for handshake tokens returned by wallet endpoints.
///
/// `MultisigV1` is produced by the prepare step, `MultisigxV1` by the
/// key-exchange rounds.
pub const MULTISIG_INFO_PREFIXES: [&str; 2] = ["MultisigV1", "MultisigxV1"];

/// Minimum length for handshake token validation.
pub const MIN_MULTISIG_INFO_LEN: usize = 100;

/// Maximum length for handshake token validation.
pub const MAX_MULTISIG_INFO_LEN: usize = 5000;

/// Maximum length for a balance-sync export blob.
pub const MAX_SYNC_BLOB_LEN: usize = 65_536;

/// Maximum length for a partially signed transaction fragment (hex).
pub const MAX_TX_FRAGMENT_LEN: usize = 262_144;

/// Default wallet-control RPC port.
pub const WALLET_RPC_PORT: u16 = 18082;

/// Default wallet-control RPC URL.
pub const WALLET_RPC_URL: &str = "http://127.0.0.1:18082";

/// Conversion factor from XMR to atomic units (1 XMR = 10^12 atomic units).
pub const XMR_TO_ATOMIC: u64 = 1_000_000_000_000;
