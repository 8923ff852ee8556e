//! Log sanitization
//!
//! Wallet endpoints, handshake tokens, and transaction hashes must never
//! appear verbatim in logs: URLs reveal network topology, tokens are
//! cryptographic wallet material, and full tx hashes allow blockchain
//! correlation. Every `tracing` call in the engine goes through these
//! helpers.

/// Sanitize an escrow id for logs.
///
/// Format: first 8 + last 4 chars. Enough to correlate while debugging a
/// single deployment, not enough to correlate across data sets.
pub fn sanitize_escrow_id(id: &str) -> String {
    if id.len() < 12 {
        return "[escrow_id]".to_string();
    }
    format!("{}...{}", &id[..8], &id[id.len() - 4..])
}

/// Sanitize a wallet address for logs (2 leading + 3 trailing chars).
pub fn sanitize_address(address: &str) -> String {
    if address.len() < 6 {
        return "[address]".to_string();
    }
    format!("{}...{}", &address[..2], &address[address.len() - 3..])
}

/// RPC URLs are never logged, not even truncated.
pub fn sanitize_rpc_url(_url: &str) -> &'static str {
    "[rpc_endpoint]"
}

/// Handshake tokens and sync blobs: log the length only.
pub fn sanitize_token(token: &str) -> String {
    format!("[opaque: {} bytes]", token.len())
}

/// Sanitize a transaction hash (first 8 + last 4 chars).
pub fn sanitize_txid(txid: &str) -> String {
    if txid.len() < 16 {
        return "[txid]".to_string();
    }
    format!("{}...{}", &txid[..8], &txid[txid.len() - 4..])
}
