//! Coordination state machine and per-escrow record
//!
//! Each escrow has exactly one `EscrowCoordination` record, created on the
//! first registration attempt and never deleted by the engine. All state
//! transitions are monotonic along the handshake state machine; the record
//! is handed to the durable store after every transition so a process
//! restart resumes from the last committed state.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use monero_escrow_common::sanitize::sanitize_escrow_id;
use monero_escrow_common::{Amount, Error, Result, MULTISIG_PARTIES, MULTISIG_THRESHOLD};
use monero_escrow_wallet::ValidatedEndpoint;

/// Role of a party in the 2-of-3 escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Buyer,
    Vendor,
    Arbiter,
}

impl ParticipantRole {
    /// Canonical ordering. Peer-token distribution and balance queries
    /// iterate in this order so round results are deterministic.
    pub const ALL: [ParticipantRole; 3] = [
        ParticipantRole::Buyer,
        ParticipantRole::Vendor,
        ParticipantRole::Arbiter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Buyer => "buyer",
            ParticipantRole::Vendor => "vendor",
            ParticipantRole::Arbiter => "arbiter",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "buyer" => Ok(ParticipantRole::Buyer),
            // Historic deployments used "seller" for the vendor role
            "vendor" | "seller" => Ok(ParticipantRole::Vendor),
            "arbiter" => Ok(ParticipantRole::Arbiter),
            other => Err(Error::Internal(format!("invalid role: {}", other))),
        }
    }

    /// The other two parties, in canonical order.
    pub fn peers(&self) -> [ParticipantRole; 2] {
        match self {
            ParticipantRole::Buyer => [ParticipantRole::Vendor, ParticipantRole::Arbiter],
            ParticipantRole::Vendor => [ParticipantRole::Buyer, ParticipantRole::Arbiter],
            ParticipantRole::Arbiter => [ParticipantRole::Buyer, ParticipantRole::Vendor],
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the coordination process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationState {
    /// Waiting for all 3 participants to register their wallet endpoints
    AwaitingRegistrations,
    /// All 3 endpoints registered, handshake can start
    AllRegistered,
    /// Prepare round completed, tokens collected and distributed
    PreparingRound1,
    /// Key-exchange round completed, final exchange pending
    KeysExchangedRound2,
    /// Multisig wallet established, address recorded
    Ready,
    /// Funds disbursed, transaction id recorded
    Released,
    /// Fatal handshake error or caller abort; cannot be resumed
    Failed,
}

impl CoordinationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinationState::AwaitingRegistrations => "awaiting_registrations",
            CoordinationState::AllRegistered => "all_registered",
            CoordinationState::PreparingRound1 => "preparing_round1",
            CoordinationState::KeysExchangedRound2 => "keys_exchanged_round2",
            CoordinationState::Ready => "ready",
            CoordinationState::Released => "released",
            CoordinationState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "awaiting_registrations" => Ok(CoordinationState::AwaitingRegistrations),
            "all_registered" => Ok(CoordinationState::AllRegistered),
            "preparing_round1" => Ok(CoordinationState::PreparingRound1),
            "keys_exchanged_round2" => Ok(CoordinationState::KeysExchangedRound2),
            "ready" => Ok(CoordinationState::Ready),
            "released" => Ok(CoordinationState::Released),
            "failed" => Ok(CoordinationState::Failed),
            other => Err(Error::Internal(format!(
                "invalid coordination state: {}",
                other
            ))),
        }
    }

    /// Terminal states are retained for audit and never advance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CoordinationState::Released | CoordinationState::Failed)
    }

    /// The handshake is considered in flight in these states.
    pub fn handshake_active(&self) -> bool {
        matches!(
            self,
            CoordinationState::AllRegistered
                | CoordinationState::PreparingRound1
                | CoordinationState::KeysExchangedRound2
        )
    }

    /// Allowed transitions. No transition skips a required predecessor.
    fn can_transition_to(self, next: CoordinationState) -> bool {
        use CoordinationState::*;
        matches!(
            (self, next),
            (AwaitingRegistrations, AllRegistered)
                | (AllRegistered, PreparingRound1)
                | (PreparingRound1, KeysExchangedRound2)
                | (KeysExchangedRound2, Ready)
                | (Ready, Released)
        ) || (next == Failed && self.handshake_active())
    }
}

impl fmt::Display for CoordinationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A party's validated wallet endpoint registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyRegistration {
    pub role: ParticipantRole,
    pub endpoint: ValidatedEndpoint,
    pub registered_at: DateTime<Utc>,
}

/// Last-known balance of the multisig wallet.
///
/// Explicitly stale until a sync pass refreshes it: a multisig wallet only
/// sees incoming funds after the parties exchanged their output-scan state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCache {
    pub total: Amount,
    pub unlocked: Amount,
    pub synced_at: Option<DateTime<Utc>>,
}

impl BalanceCache {
    pub fn is_stale(&self) -> bool {
        self.synced_at.is_none()
    }
}

/// Coordination record for one escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowCoordination {
    pub escrow_id: String,
    pub threshold: u32,
    pub total_parties: u32,
    pub parties: HashMap<ParticipantRole, PartyRegistration>,
    pub state: CoordinationState,
    /// Set once when the handshake finalizes; never mutated afterwards
    pub multisig_address: Option<String>,
    pub balance_cache: BalanceCache,
    /// Opaque tokens collected during the current handshake round; replaced
    /// when the next round consumes them, cleared on `Ready`
    pub round_tokens: HashMap<ParticipantRole, String>,
    /// Completed key-exchange rounds, so a restart resumes mid-sequence
    pub exchange_rounds_done: u32,
    pub release_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscrowCoordination {
    pub fn new(escrow_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            escrow_id: escrow_id.into(),
            threshold: MULTISIG_THRESHOLD,
            total_parties: MULTISIG_PARTIES,
            parties: HashMap::new(),
            state: CoordinationState::AwaitingRegistrations,
            multisig_address: None,
            balance_cache: BalanceCache::default(),
            round_tokens: HashMap::new(),
            exchange_rounds_done: 0,
            release_tx_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_fully_registered(&self) -> bool {
        ParticipantRole::ALL
            .iter()
            .all(|role| self.parties.contains_key(role))
    }

    pub fn registered_roles(&self) -> Vec<ParticipantRole> {
        ParticipantRole::ALL
            .iter()
            .copied()
            .filter(|role| self.parties.contains_key(role))
            .collect()
    }

    /// Snapshot of all three endpoints, or which one is missing.
    pub fn registered_endpoints(&self) -> Result<HashMap<ParticipantRole, ValidatedEndpoint>> {
        let mut endpoints = HashMap::new();
        for role in ParticipantRole::ALL {
            match self.parties.get(&role) {
                Some(party) => {
                    endpoints.insert(role, party.endpoint.clone());
                }
                None => {
                    return Err(Error::PartialRegistration(format!(
                        "{} wallet not registered",
                        role
                    )))
                }
            }
        }
        Ok(endpoints)
    }

    /// Advance the state machine. Rejects any transition not on the
    /// monotonic path.
    pub fn transition(&mut self, next: CoordinationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("a state preceding {}", next),
                actual: self.state.to_string(),
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Force the coordination into `Failed`. No-op outside an active
    /// handshake (a `Ready` wallet is not invalidated by a late failure).
    pub fn fail(&mut self, reason: &str) {
        if self.state.can_transition_to(CoordinationState::Failed) {
            warn!(
                escrow = %sanitize_escrow_id(&self.escrow_id),
                from = %self.state,
                reason,
                "coordination failed"
            );
            self.state = CoordinationState::Failed;
            self.round_tokens.clear();
            self.updated_at = Utc::now();
        }
    }

    /// Record the finalized multisig address. Immutable once set.
    pub fn set_multisig_address(&mut self, address: String) -> Result<()> {
        if self.multisig_address.is_some() {
            return Err(Error::Internal(
                "multisig address already recorded".to_string(),
            ));
        }
        self.multisig_address = Some(address);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the current round's token buffer.
    pub fn set_round_tokens(&mut self, tokens: HashMap<ParticipantRole, String>) {
        self.round_tokens = tokens;
        self.updated_at = Utc::now();
    }
}
