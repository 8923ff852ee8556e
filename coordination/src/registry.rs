//! Wallet endpoint registry rules
//!
//! Registration is a pure mutation of the coordination record; the facade
//! serializes calls per escrow and persists the record afterwards. No
//! network call is made here: connectivity problems surface on the first
//! handshake round instead, so a party can register before its wallet is
//! running.

use chrono::Utc;
use tracing::info;

use monero_escrow_common::sanitize::{sanitize_escrow_id, sanitize_rpc_url};
use monero_escrow_common::{Error, Result};
use monero_escrow_wallet::validate_endpoint;

use crate::state::{CoordinationState, EscrowCoordination, ParticipantRole, PartyRegistration};

/// Register (or, while registrations are open, replace) a party's wallet
/// endpoint.
///
/// On any error the record is left exactly as it was.
pub fn register_party(
    record: &mut EscrowCoordination,
    role: ParticipantRole,
    raw_endpoint: &str,
) -> Result<CoordinationState> {
    // Validate before touching the record; a rejected endpoint must leave
    // state and party map unchanged.
    let endpoint = validate_endpoint(raw_endpoint)?;

    match record.state {
        CoordinationState::AwaitingRegistrations => {}
        CoordinationState::Failed => {
            return Err(Error::CoordinationFailed(format!(
                "escrow {} coordination already failed; start a new coordination",
                sanitize_escrow_id(&record.escrow_id)
            )))
        }
        _ => {
            return Err(Error::AlreadyRegistered(format!(
                "{} endpoint cannot be changed once registrations are closed",
                role
            )))
        }
    }

    let replaced = record
        .parties
        .insert(
            role,
            PartyRegistration {
                role,
                endpoint,
                registered_at: Utc::now(),
            },
        )
        .is_some();

    info!(
        escrow = %sanitize_escrow_id(&record.escrow_id),
        role = %role,
        endpoint = sanitize_rpc_url(raw_endpoint),
        replaced,
        "registered wallet endpoint"
    );

    if record.is_fully_registered() {
        record.transition(CoordinationState::AllRegistered)?;
        info!(
            escrow = %sanitize_escrow_id(&record.escrow_id),
            "all 3 wallets registered, ready for multisig handshake"
        );
    } else {
        record.updated_at = Utc::now();
    }

    Ok(record.state)
}
