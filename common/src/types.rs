//! Common types for the escrow coordination engine

use serde::{Deserialize, Serialize};

/// Monero address type
pub type WalletAddress = String;

/// Transaction hash
pub type TxHash = String;

/// Amount in atomic units (1 XMR = 1e12 atomic units)
pub type Amount = u64;

/// Escrow identifier, externally assigned and opaque to the engine
pub type EscrowId = String;

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    pub fn new(method: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: "0".to_string(),
            method: method.to_string(),
            params: None,
        }
    }

    pub fn with_params(method: &str, params: serde_json::Value) -> Self {
        Self {
            params: Some(params),
            ..Self::new(method)
        }
    }
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub jsonrpc: String,
    pub id: String,
    pub result: Option<T>,
    pub error: Option<RpcErrorDetails>,
}

/// JSON-RPC error details
#[derive(Debug, Deserialize)]
pub struct RpcErrorDetails {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Multisig status reported by `is_multisig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultisigStatus {
    pub multisig: bool,
    pub ready: bool,
    #[serde(default)]
    pub threshold: u32,
    #[serde(default)]
    pub total: u32,
}

/// Result of `prepare_multisig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareMultisigResult {
    pub multisig_info: String,
}

/// Result of `make_multisig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeMultisigResult {
    /// Intermediate wallet address; not final until key exchange completes
    pub address: String,
    /// Token to feed into the next key-exchange round
    pub multisig_info: String,
}

/// Result of `exchange_multisig_keys`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeMultisigKeysResult {
    /// Wallet address; final on the last exchange round
    pub address: String,
    /// May be empty once the wallet is finalized
    #[serde(default)]
    pub multisig_info: String,
}

/// Result of `export_multisig_info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMultisigInfoResult {
    pub info: String,
}

/// Result of `import_multisig_info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMultisigInfoResult {
    pub n_outputs: u64,
}

/// Result of `get_balance`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResult {
    pub balance: Amount,
    pub unlocked_balance: Amount,
    #[serde(default)]
    pub multisig_import_needed: bool,
}

/// Recipient of a multisig spend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDestination {
    pub address: WalletAddress,
    pub amount: Amount,
}

/// Result of creating an unsigned multisig spend (`transfer`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionResult {
    /// Partially signed transaction set, carries the creator's signature
    pub tx_data_hex: String,
    pub tx_hash: TxHash,
    #[serde(default)]
    pub signatures_required: u32,
}

/// Result of `sign_multisig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMultisigResult {
    pub tx_data_hex: String,
    #[serde(default)]
    pub tx_hash_list: Vec<TxHash>,
}

/// Result of `submit_multisig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMultisigResult {
    pub tx_hash_list: Vec<TxHash>,
}
