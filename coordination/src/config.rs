//! Runtime configuration for the coordination engine
//!
//! Values come from environment variables with bounded defaults; anything
//! out of range is clamped with a warning rather than rejected, so a bad
//! deployment knob cannot take the engine down.

use std::env;
use std::time::Duration;

use monero_escrow_wallet::RpcClientConfig;
use monero_escrow_common::{MULTISIG_PARTIES, MULTISIG_THRESHOLD};

/// Default per-call RPC timeout in seconds.
///
/// Chosen generously: party wallets are commonly reached through an
/// anonymizing overlay with far higher latency than a direct connection.
/// Override via ESCROW_RPC_TIMEOUT_SECS.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 45;
pub const MIN_RPC_TIMEOUT_SECS: u64 = 5;
pub const MAX_RPC_TIMEOUT_SECS: u64 = 300;

/// Default transport retry count per RPC call.
/// Override via ESCROW_RPC_RETRIES.
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 2;
pub const MAX_TRANSPORT_RETRIES: u32 = 10;

/// Default pause between transport retries, in milliseconds.
/// Override via ESCROW_RPC_RETRY_BACKOFF_MS.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
pub const MAX_RETRY_BACKOFF_MS: u64 = 30_000;

/// Default number of key-exchange rounds after the prepare round.
///
/// Two rounds (make + one finalizing exchange) is what a 2-of-3 wallet
/// requires; the count stays configurable because the round requirement is
/// protocol-version specific, not a structural constant.
/// Override via ESCROW_EXCHANGE_ROUNDS.
pub const DEFAULT_EXCHANGE_ROUNDS: u32 = 2;
pub const MIN_EXCHANGE_ROUNDS: u32 = 2;
pub const MAX_EXCHANGE_ROUNDS: u32 = 4;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Signatures required to spend (fixed at 2 for this protocol variant)
    pub threshold: u32,
    /// Escrow parties (fixed at 3)
    pub total_parties: u32,
    /// Key-exchange rounds after the prepare round
    pub exchange_rounds: u32,
    /// Outbound RPC client tuning
    pub rpc: RpcClientConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            threshold: MULTISIG_THRESHOLD,
            total_parties: MULTISIG_PARTIES,
            exchange_rounds: DEFAULT_EXCHANGE_ROUNDS,
            rpc: RpcClientConfig {
                timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
                transport_retries: DEFAULT_TRANSPORT_RETRIES,
                retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            },
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let timeout_secs = env_clamped(
            "ESCROW_RPC_TIMEOUT_SECS",
            DEFAULT_RPC_TIMEOUT_SECS,
            MIN_RPC_TIMEOUT_SECS,
            MAX_RPC_TIMEOUT_SECS,
        );
        let transport_retries = env_clamped(
            "ESCROW_RPC_RETRIES",
            u64::from(DEFAULT_TRANSPORT_RETRIES),
            0,
            u64::from(MAX_TRANSPORT_RETRIES),
        ) as u32;
        let backoff_ms = env_clamped(
            "ESCROW_RPC_RETRY_BACKOFF_MS",
            DEFAULT_RETRY_BACKOFF_MS,
            0,
            MAX_RETRY_BACKOFF_MS,
        );
        let exchange_rounds = env_clamped(
            "ESCROW_EXCHANGE_ROUNDS",
            u64::from(DEFAULT_EXCHANGE_ROUNDS),
            u64::from(MIN_EXCHANGE_ROUNDS),
            u64::from(MAX_EXCHANGE_ROUNDS),
        ) as u32;

        Self {
            threshold: MULTISIG_THRESHOLD,
            total_parties: MULTISIG_PARTIES,
            exchange_rounds,
            rpc: RpcClientConfig {
                timeout: Duration::from_secs(timeout_secs),
                transport_retries,
                retry_backoff: Duration::from_millis(backoff_ms),
            },
        }
    }
}

/// Read a numeric environment variable, clamping it into [min, max].
fn env_clamped(var: &str, default: u64, min: u64, max: u64) -> u64 {
    match env::var(var).ok().and_then(|v| v.parse::<u64>().ok()) {
        Some(value) => clamp_with_warn(var, value, min, max),
        None => default,
    }
}

fn clamp_with_warn(var: &str, value: u64, min: u64, max: u64) -> u64 {
    if value < min {
        tracing::warn!(var, value, min, "configured value below minimum, using minimum");
        min
    } else if value > max {
        tracing::warn!(var, value, max, "configured value above maximum, using maximum");
        max
    } else {
        value
    }
}
