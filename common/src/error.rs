//! Error types for the escrow coordination engine

use thiserror::Error;

/// Coordination-level error taxonomy.
///
/// Every variant carries a stable machine-readable tag (see [`Error::code`])
/// so the external router can build structured error responses without
/// relaying raw wallet-endpoint output.
#[derive(Error, Debug)]
pub enum Error {
    /// Endpoint is malformed or not a loopback literal. Rejected locally,
    /// no network call is ever made for such an endpoint.
    #[error("invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    /// An operation required registrations that are not complete yet.
    #[error("registration incomplete: {0}")]
    PartialRegistration(String),

    /// A role tried to re-register after registrations closed.
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// Transport failure after the bounded retries were exhausted.
    #[error("wallet RPC unreachable: {0}")]
    RpcUnreachable(String),

    /// The wallet endpoint did not answer within the per-call timeout.
    #[error("wallet RPC timed out: {0}")]
    RpcTimeout(String),

    /// A party's response failed the expected opaque-token shape.
    /// Never retried; fatal to the current handshake round.
    #[error("invalid handshake format: {0}")]
    InvalidHandshakeFormat(String),

    /// The finalized addresses returned by the three endpoints disagree.
    /// Indicates protocol corruption or tampering; flagged for manual
    /// investigation.
    #[error("finalized multisig addresses disagree between parties")]
    AddressMismatch,

    /// Handshake re-requested on a coordination that is already `Ready`.
    #[error("multisig wallet already established")]
    AlreadyMultisig,

    /// Fewer valid signature fragments than the spending threshold.
    #[error("threshold not met: collected {collected} of {required} required signature fragments")]
    ThresholdNotMet { required: u32, collected: u32 },

    /// A code path attempted an operation that would put key material on
    /// the coordinator side. Unreachable through the typed API surface.
    #[error("non-custodial violation: {0}")]
    NonCustodialViolation(String),

    /// The wallet endpoint answered with a JSON-RPC error of its own.
    #[error("wallet RPC error: {0}")]
    WalletRpc(String),

    /// No coordination record exists for the escrow id.
    #[error("escrow not found: {0}")]
    EscrowNotFound(String),

    /// Operation called in a state that does not permit it.
    #[error("invalid coordination state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: String },

    /// The coordination is in the terminal `Failed` state (or was aborted
    /// while a round was in flight) and cannot be resumed.
    #[error("coordination failed: {0}")]
    CoordinationFailed(String),

    /// The durable store rejected a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable error code tag for structured responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRpcUrl(_) => "INVALID_RPC_URL",
            Error::PartialRegistration(_) => "PARTIAL_REGISTRATION",
            Error::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            Error::RpcUnreachable(_) => "RPC_UNREACHABLE",
            Error::RpcTimeout(_) => "RPC_TIMEOUT",
            Error::InvalidHandshakeFormat(_) => "INVALID_HANDSHAKE_FORMAT",
            Error::AddressMismatch => "ADDRESS_MISMATCH",
            Error::AlreadyMultisig => "ALREADY_MULTISIG",
            Error::ThresholdNotMet { .. } => "THRESHOLD_NOT_MET",
            Error::NonCustodialViolation(_) => "NON_CUSTODIAL_VIOLATION",
            Error::WalletRpc(_) => "WALLET_RPC_ERROR",
            Error::EscrowNotFound(_) => "ESCROW_NOT_FOUND",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::CoordinationFailed(_) => "COORDINATION_FAILED",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    ///
    /// Only transport failures qualify; retrying a semantically invalid
    /// exchange cannot make it valid.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RpcUnreachable(_) | Error::RpcTimeout(_))
    }
}

/// Wallet-control RPC transport errors.
///
/// Produced by the outbound RPC client and mapped into the coordination
/// taxonomy at the engine boundary.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("wallet RPC unreachable (is the wallet endpoint running?)")]
    Unreachable,

    #[error("wallet RPC call timed out")]
    Timeout,

    #[error("wallet RPC returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid wallet RPC response: {0}")]
    InvalidResponse(String),

    #[error("refused non-custodial method: {0}")]
    NonCustodial(String),

    #[error("refused non-loopback dispatch target: {0}")]
    ForbiddenEndpoint(String),

    #[error("network error: {0}")]
    Network(String),
}

impl RpcError {
    /// Transport-level failures are the only retryable class.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Unreachable | RpcError::Timeout)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Unreachable => Error::RpcUnreachable("connection refused".to_string()),
            RpcError::Timeout => Error::RpcTimeout("no response within the call timeout".to_string()),
            RpcError::Rpc { code, message } => {
                Error::WalletRpc(format!("code {}: {}", code, message))
            }
            RpcError::InvalidResponse(msg) => Error::InvalidHandshakeFormat(msg),
            RpcError::NonCustodial(msg) => Error::NonCustodialViolation(msg),
            RpcError::ForbiddenEndpoint(msg) => Error::InvalidRpcUrl(msg),
            RpcError::Network(msg) => Error::RpcUnreachable(msg),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::InvalidRpcUrl("x".into()).code(), "INVALID_RPC_URL");
        assert_eq!(Error::AddressMismatch.code(), "ADDRESS_MISMATCH");
        assert_eq!(
            Error::ThresholdNotMet {
                required: 2,
                collected: 1
            }
            .code(),
            "THRESHOLD_NOT_MET"
        );
        assert_eq!(Error::AlreadyMultisig.code(), "ALREADY_MULTISIG");
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(Error::RpcUnreachable("x".into()).is_retryable());
        assert!(Error::RpcTimeout("x".into()).is_retryable());
        assert!(!Error::AddressMismatch.is_retryable());
        assert!(!Error::InvalidHandshakeFormat("x".into()).is_retryable());
        assert!(!Error::InvalidRpcUrl("x".into()).is_retryable());
    }

    #[test]
    fn test_rpc_error_transport_classification() {
        assert!(RpcError::Unreachable.is_transport());
        assert!(RpcError::Timeout.is_transport());
        assert!(!RpcError::Rpc {
            code: -1,
            message: "busy".into()
        }
        .is_transport());
        assert!(!RpcError::InvalidResponse("bad json".into()).is_transport());
        assert!(!RpcError::Network("tls".into()).is_transport());
    }

    #[test]
    fn test_rpc_error_maps_into_taxonomy() {
        assert!(matches!(
            Error::from(RpcError::Unreachable),
            Error::RpcUnreachable(_)
        ));
        assert!(matches!(Error::from(RpcError::Timeout), Error::RpcTimeout(_)));
        assert!(matches!(
            Error::from(RpcError::InvalidResponse("x".into())),
            Error::InvalidHandshakeFormat(_)
        ));
        assert!(matches!(
            Error::from(RpcError::NonCustodial("query_key".into())),
            Error::NonCustodialViolation(_)
        ));
        assert!(matches!(
            Error::from(RpcError::ForbiddenEndpoint("x".into())),
            Error::InvalidRpcUrl(_)
        ));
    }
}
