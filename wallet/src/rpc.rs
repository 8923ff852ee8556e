//! Wallet-control JSON-RPC client
//!
//! One client per endpoint per operation; the engine never holds a session
//! beyond what a single call requires. Every dispatch re-checks the
//! loopback rule and refuses any method outside the non-custodial
//! allowlist before bytes leave the process.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use monero_escrow_common::sanitize::sanitize_rpc_url;
use monero_escrow_common::{
    BalanceResult, CreateTransactionResult, ExchangeMultisigKeysResult, ExportMultisigInfoResult,
    ImportMultisigInfoResult, MakeMultisigResult, MultisigStatus, PrepareMultisigResult,
    RpcError, RpcRequest, RpcResponse, SignMultisigResult, SubmitMultisigResult,
    TransferDestination,
};

use crate::control::WalletControl;
use crate::validation::{ensure_loopback, ValidatedEndpoint};

/// The complete set of wallet-control methods the engine may dispatch.
///
/// Everything the coordinator does fits in this list; methods that would
/// move key material (wallet creation, key export, seed queries) are not on
/// it and are refused locally. This is what makes a non-custodial violation
/// unreachable through the typed surface.
const ALLOWED_METHODS: &[&str] = &[
    "get_version",
    "get_address",
    "is_multisig",
    "prepare_multisig",
    "make_multisig",
    "exchange_multisig_keys",
    "export_multisig_info",
    "import_multisig_info",
    "get_balance",
    "transfer",
    "sign_multisig",
    "submit_multisig",
];

/// Tuning for the outbound RPC client.
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Per-call timeout. Generous by default: the transport may route
    /// through an anonymizing overlay with much higher latency than a
    /// direct connection.
    pub timeout: Duration,
    /// How many times a transport failure (connect refused, timeout) is
    /// retried before being surfaced. Validation failures are never
    /// retried.
    pub transport_retries: u32,
    /// Pause between transport retries.
    pub retry_backoff: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            transport_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// HTTP-backed wallet-control client, restricted to loopback endpoints.
pub struct WalletRpcClient {
    endpoint: ValidatedEndpoint,
    client: reqwest::Client,
    config: RpcClientConfig,
}

impl WalletRpcClient {
    pub fn new(endpoint: ValidatedEndpoint, config: RpcClientConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RpcError::Network(format!("client build: {}", e)))?;

        Ok(Self {
            endpoint,
            client,
            config,
        })
    }

    /// Dispatch a JSON-RPC call with the transport retry policy.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<T, RpcError> {
        if !ALLOWED_METHODS.contains(&method) {
            return Err(RpcError::NonCustodial(format!(
                "method '{}' is outside the non-custodial allowlist",
                method
            )));
        }

        // Re-validate the target on every dispatch, independent of the
        // registration-time check.
        ensure_loopback(&self.endpoint)
            .map_err(|e| RpcError::ForbiddenEndpoint(e.to_string()))?;

        let request = match params {
            Some(params) => RpcRequest::with_params(method, params),
            None => RpcRequest::new(method),
        };

        let mut attempt: u32 = 0;
        loop {
            match self.dispatch::<T>(&request).await {
                Ok(result) => {
                    debug!(method, endpoint = sanitize_rpc_url(self.endpoint.as_str()), "RPC call succeeded");
                    return Ok(result);
                }
                Err(e) if e.is_transport() && attempt < self.config.transport_retries => {
                    attempt += 1;
                    warn!(
                        method,
                        attempt,
                        max = self.config.transport_retries,
                        error = %e,
                        "transport failure talking to {}, retrying",
                        sanitize_rpc_url(self.endpoint.as_str())
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn dispatch<T: DeserializeOwned>(&self, request: &RpcRequest) -> Result<T, RpcError> {
        let response = self
            .client
            .post(self.endpoint.json_rpc_url())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout
                } else if e.is_connect() {
                    RpcError::Unreachable
                } else {
                    RpcError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RpcError::Unreachable);
        }

        let rpc_response: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("JSON parse: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        rpc_response
            .result
            .ok_or_else(|| RpcError::InvalidResponse("missing result field".to_string()))
    }
}

#[async_trait]
impl WalletControl for WalletRpcClient {
    async fn check_connection(&self) -> Result<(), RpcError> {
        let _version: serde_json::Value = self.call("get_version", None).await?;
        Ok(())
    }

    async fn get_address(&self) -> Result<String, RpcError> {
        #[derive(serde::Deserialize)]
        struct AddressResult {
            address: String,
        }
        let result: AddressResult = self.call("get_address", None).await?;
        Ok(result.address)
    }

    async fn multisig_status(&self) -> Result<MultisigStatus, RpcError> {
        self.call("is_multisig", None).await
    }

    async fn prepare_multisig(&self) -> Result<String, RpcError> {
        let result: PrepareMultisigResult = self.call("prepare_multisig", None).await?;
        Ok(result.multisig_info)
    }

    async fn make_multisig(
        &self,
        threshold: u32,
        peer_infos: Vec<String>,
    ) -> Result<MakeMultisigResult, RpcError> {
        self.call(
            "make_multisig",
            Some(serde_json::json!({
                "multisig_info": peer_infos,
                "threshold": threshold,
            })),
        )
        .await
    }

    async fn exchange_multisig_keys(
        &self,
        peer_infos: Vec<String>,
    ) -> Result<ExchangeMultisigKeysResult, RpcError> {
        self.call(
            "exchange_multisig_keys",
            Some(serde_json::json!({ "multisig_info": peer_infos })),
        )
        .await
    }

    async fn export_multisig_info(&self) -> Result<String, RpcError> {
        let result: ExportMultisigInfoResult = self.call("export_multisig_info", None).await?;
        Ok(result.info)
    }

    async fn import_multisig_info(&self, peer_infos: Vec<String>) -> Result<u64, RpcError> {
        let result: ImportMultisigInfoResult = self
            .call(
                "import_multisig_info",
                Some(serde_json::json!({ "info": peer_infos })),
            )
            .await?;
        Ok(result.n_outputs)
    }

    async fn get_balance(&self) -> Result<BalanceResult, RpcError> {
        self.call("get_balance", None).await
    }

    async fn create_release_transaction(
        &self,
        destinations: Vec<TransferDestination>,
    ) -> Result<CreateTransactionResult, RpcError> {
        self.call(
            "transfer",
            Some(serde_json::json!({
                "destinations": destinations,
                "get_tx_hex": true,
            })),
        )
        .await
    }

    async fn sign_multisig(&self, tx_data_hex: String) -> Result<SignMultisigResult, RpcError> {
        self.call(
            "sign_multisig",
            Some(serde_json::json!({ "tx_data_hex": tx_data_hex })),
        )
        .await
    }

    async fn submit_multisig(
        &self,
        tx_data_hex: String,
    ) -> Result<SubmitMultisigResult, RpcError> {
        self.call(
            "submit_multisig",
            Some(serde_json::json!({ "tx_data_hex": tx_data_hex })),
        )
        .await
    }
}
