//! Handshake protocol driver
//!
//! Executes the multi-round multisig setup against the three registered
//! endpoints. Each round issues its three per-party calls concurrently,
//! but the results are only applied to the coordination record by the
//! facade, in a single critical section, so no partial round update is
//! ever visible. Round *n+1* is never dispatched until round *n* completed
//! for all three parties.
//!
//! The server side of this exchange never runs a multisig operation
//! itself: it asks each party's wallet to run one and forwards the opaque
//! tokens to the other two parties.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use monero_escrow_common::format::validate_multisig_info;
use monero_escrow_common::sanitize::{sanitize_escrow_id, sanitize_token};
use monero_escrow_common::{Error, Result};
use monero_escrow_wallet::{ValidatedEndpoint, WalletControlFactory};

use crate::state::ParticipantRole;

type RoleMap<T> = HashMap<ParticipantRole, T>;

/// Result of one key-exchange round: the token each party produced and the
/// wallet address each party reported.
pub struct KeyExchangeOutcome {
    pub tokens: RoleMap<String>,
    pub addresses: RoleMap<String>,
}

/// Drives the handshake rounds. Holds no per-escrow state: the record owns
/// the round buffers, the driver owns the protocol.
pub struct HandshakeDriver {
    factory: Arc<dyn WalletControlFactory>,
    threshold: u32,
}

impl HandshakeDriver {
    pub fn new(factory: Arc<dyn WalletControlFactory>, threshold: u32) -> Self {
        Self { factory, threshold }
    }

    /// Prepare round: ask each wallet for its setup token.
    pub async fn prepare_round(
        &self,
        escrow_id: &str,
        endpoints: &RoleMap<ValidatedEndpoint>,
    ) -> Result<RoleMap<String>> {
        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            "handshake: requesting prepare tokens from all participants"
        );

        let calls = ParticipantRole::ALL.iter().map(|role| {
            let role = *role;
            let endpoint = endpoints[&role].clone();
            let factory = Arc::clone(&self.factory);
            async move {
                let wallet = factory.connect(&endpoint)?;
                let token = wallet.prepare_multisig().await.map_err(Error::from)?;
                validate_multisig_info(&token).map_err(|reason| {
                    Error::InvalidHandshakeFormat(format!("{} prepare token {}", role, reason))
                })?;
                debug!(role = %role, token = %sanitize_token(&token), "prepare token collected");
                Ok::<(ParticipantRole, String), Error>((role, token))
            }
        });

        collect_round(join_all(calls).await)
    }

    /// First key-exchange round: each wallet combines the two peer prepare
    /// tokens into the shared wallet.
    pub async fn make_round(
        &self,
        escrow_id: &str,
        endpoints: &RoleMap<ValidatedEndpoint>,
        prepare_tokens: &RoleMap<String>,
    ) -> Result<KeyExchangeOutcome> {
        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            threshold = self.threshold,
            "handshake: key-exchange round 1 (make)"
        );

        let calls = ParticipantRole::ALL.iter().map(|role| {
            let role = *role;
            let endpoint = endpoints[&role].clone();
            let peers = peer_tokens(prepare_tokens, role);
            let factory = Arc::clone(&self.factory);
            let threshold = self.threshold;
            async move {
                let wallet = factory.connect(&endpoint)?;
                let result = wallet
                    .make_multisig(threshold, peers?)
                    .await
                    .map_err(Error::from)?;
                validate_multisig_info(&result.multisig_info).map_err(|reason| {
                    Error::InvalidHandshakeFormat(format!(
                        "{} key-exchange token {}",
                        role, reason
                    ))
                })?;
                Ok::<(ParticipantRole, (String, String)), Error>((
                    role,
                    (result.multisig_info, result.address),
                ))
            }
        });

        collect_exchange(join_all(calls).await)
    }

    /// Further key-exchange rounds. On the final round the returned token
    /// may be empty (the wallet is finalized) and the reported address is
    /// the one that must agree across all three parties.
    pub async fn exchange_round(
        &self,
        escrow_id: &str,
        endpoints: &RoleMap<ValidatedEndpoint>,
        round_tokens: &RoleMap<String>,
        final_round: bool,
    ) -> Result<KeyExchangeOutcome> {
        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            final_round,
            "handshake: key-exchange round"
        );

        let calls = ParticipantRole::ALL.iter().map(|role| {
            let role = *role;
            let endpoint = endpoints[&role].clone();
            let peers = peer_tokens(round_tokens, role);
            let factory = Arc::clone(&self.factory);
            async move {
                let wallet = factory.connect(&endpoint)?;
                let result = wallet
                    .exchange_multisig_keys(peers?)
                    .await
                    .map_err(Error::from)?;
                if !final_round {
                    validate_multisig_info(&result.multisig_info).map_err(|reason| {
                        Error::InvalidHandshakeFormat(format!(
                            "{} key-exchange token {}",
                            role, reason
                        ))
                    })?;
                } else if result.address.is_empty() {
                    return Err(Error::InvalidHandshakeFormat(format!(
                        "{} returned an empty finalized address",
                        role
                    )));
                }
                Ok::<(ParticipantRole, (String, String)), Error>((
                    role,
                    (result.multisig_info, result.address),
                ))
            }
        });

        collect_exchange(join_all(calls).await)
    }
}

/// The tokens a party must receive for the next round: the other two
/// parties' tokens, in canonical role order.
fn peer_tokens(tokens: &RoleMap<String>, role: ParticipantRole) -> Result<Vec<String>> {
    role.peers()
        .iter()
        .map(|peer| {
            tokens.get(peer).cloned().ok_or_else(|| {
                Error::Internal(format!("missing round token for {}", peer))
            })
        })
        .collect()
}

/// Assert byte-for-byte agreement of the three finalized addresses.
///
/// A mismatch means protocol corruption or tampering and fails the whole
/// coordination; no address is recorded.
pub fn assert_address_agreement(addresses: &RoleMap<String>) -> Result<String> {
    let reference = addresses
        .get(&ParticipantRole::Buyer)
        .ok_or_else(|| Error::Internal("missing buyer finalized address".to_string()))?;

    for role in ParticipantRole::ALL {
        match addresses.get(&role) {
            Some(address) if address == reference => {}
            Some(_) => return Err(Error::AddressMismatch),
            None => {
                return Err(Error::Internal(format!(
                    "missing {} finalized address",
                    role
                )))
            }
        }
    }

    Ok(reference.clone())
}

fn collect_round(
    results: Vec<std::result::Result<(ParticipantRole, String), Error>>,
) -> Result<RoleMap<String>> {
    let mut tokens = HashMap::new();
    for result in results {
        let (role, token) = result?;
        tokens.insert(role, token);
    }
    Ok(tokens)
}

fn collect_exchange(
    results: Vec<std::result::Result<(ParticipantRole, (String, String)), Error>>,
) -> Result<KeyExchangeOutcome> {
    let mut tokens = HashMap::new();
    let mut addresses = HashMap::new();
    for result in results {
        let (role, (token, address)) = result?;
        tokens.insert(role, token);
        addresses.insert(role, address);
    }
    Ok(KeyExchangeOutcome { tokens, addresses })
}
