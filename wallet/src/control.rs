//! The wallet-control seam
//!
//! The coordination layer drives every party's wallet through this trait,
//! never through a concrete client, so offline tests can stand in a full
//! mock wallet fleet. The wallet endpoint is an opaque capability: it
//! performs the multisig key operations locally and only opaque tokens
//! cross this boundary.

use std::sync::Arc;

use async_trait::async_trait;

use monero_escrow_common::{
    BalanceResult, CreateTransactionResult, Error, ExchangeMultisigKeysResult,
    MakeMultisigResult, MultisigStatus, Result, RpcError, SignMultisigResult,
    SubmitMultisigResult, TransferDestination,
};

use crate::rpc::{RpcClientConfig, WalletRpcClient};
use crate::validation::{ensure_loopback, ValidatedEndpoint};

/// Operations the engine may request from a party's wallet endpoint.
///
/// All of these act on key material that lives inside the party's wallet;
/// none of them move that material across the wire.
#[async_trait]
pub trait WalletControl: Send + Sync {
    async fn check_connection(&self) -> std::result::Result<(), RpcError>;
    async fn get_address(&self) -> std::result::Result<String, RpcError>;
    async fn multisig_status(&self) -> std::result::Result<MultisigStatus, RpcError>;

    /// Handshake round 0: generate this wallet's setup token.
    async fn prepare_multisig(&self) -> std::result::Result<String, RpcError>;

    /// Key-exchange round 1: combine the peers' prepare tokens.
    async fn make_multisig(
        &self,
        threshold: u32,
        peer_infos: Vec<String>,
    ) -> std::result::Result<MakeMultisigResult, RpcError>;

    /// Key-exchange round 2+: finalize with the peers' round tokens.
    async fn exchange_multisig_keys(
        &self,
        peer_infos: Vec<String>,
    ) -> std::result::Result<ExchangeMultisigKeysResult, RpcError>;

    /// Balance sync: export this wallet's view of multisig outputs.
    async fn export_multisig_info(&self) -> std::result::Result<String, RpcError>;

    /// Balance sync: import the peers' exports. Returns outputs imported.
    async fn import_multisig_info(
        &self,
        peer_infos: Vec<String>,
    ) -> std::result::Result<u64, RpcError>;

    async fn get_balance(&self) -> std::result::Result<BalanceResult, RpcError>;

    /// Release: create the multisig spend, signed by this wallet.
    async fn create_release_transaction(
        &self,
        destinations: Vec<TransferDestination>,
    ) -> std::result::Result<CreateTransactionResult, RpcError>;

    /// Release: co-sign an accumulated transaction fragment.
    async fn sign_multisig(
        &self,
        tx_data_hex: String,
    ) -> std::result::Result<SignMultisigResult, RpcError>;

    /// Release: broadcast the fully signed transaction.
    async fn submit_multisig(
        &self,
        tx_data_hex: String,
    ) -> std::result::Result<SubmitMultisigResult, RpcError>;
}

/// Builds a wallet-control handle for a validated endpoint.
///
/// The factory is consulted once per endpoint per operation; handles are
/// transient and hold no credentials or session state.
pub trait WalletControlFactory: Send + Sync {
    fn connect(&self, endpoint: &ValidatedEndpoint) -> Result<Arc<dyn WalletControl>>;
}

/// Production factory: JSON-RPC over HTTP to the loopback endpoint.
pub struct RpcControlFactory {
    config: RpcClientConfig,
}

impl RpcControlFactory {
    pub fn new(config: RpcClientConfig) -> Self {
        Self { config }
    }
}

impl Default for RpcControlFactory {
    fn default() -> Self {
        Self::new(RpcClientConfig::default())
    }
}

impl WalletControlFactory for RpcControlFactory {
    fn connect(&self, endpoint: &ValidatedEndpoint) -> Result<Arc<dyn WalletControl>> {
        // Dispatch-time re-validation, independent of what the record claims.
        ensure_loopback(endpoint)?;
        let client = WalletRpcClient::new(endpoint.clone(), self.config.clone())
            .map_err(Error::from)?;
        Ok(Arc::new(client))
    }
}
