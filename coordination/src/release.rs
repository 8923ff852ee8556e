//! Release coordinator
//!
//! Collects threshold signatures for the escrow payout and submits the
//! combined transaction. The engine never builds or signs the transaction
//! itself: the first authorized wallet creates the multisig spend (which
//! carries its own signature), each further authorized wallet co-signs the
//! accumulated fragment, and one wallet broadcasts the result.
//!
//! The operation is never partially applied: either a fully combined,
//! submittable transaction is produced and broadcast, or nothing is
//! submitted at all.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use monero_escrow_common::format::is_valid_tx_fragment;
use monero_escrow_common::sanitize::{sanitize_address, sanitize_escrow_id, sanitize_txid};
use monero_escrow_common::{Amount, Error, Result, TransferDestination};
use monero_escrow_wallet::{ValidatedEndpoint, WalletControlFactory};

use crate::state::ParticipantRole;

type RoleMap<T> = HashMap<ParticipantRole, T>;

/// Where the released funds go. Decided by the caller's arbitration
/// policy, not by this engine.
#[derive(Debug, Clone)]
pub struct PayoutInstruction {
    pub address: String,
    pub amount: Amount,
}

pub struct ReleaseCoordinator {
    factory: Arc<dyn WalletControlFactory>,
    threshold: u32,
}

impl ReleaseCoordinator {
    pub fn new(factory: Arc<dyn WalletControlFactory>, threshold: u32) -> Self {
        Self { factory, threshold }
    }

    /// Validate the authorized role combination: at least `threshold`
    /// distinct roles. Whether the combination is *allowed* to release is
    /// the external policy's decision; this only checks arity.
    pub fn validate_signers(&self, authorized_by: &[ParticipantRole]) -> Result<Vec<ParticipantRole>> {
        let mut signers: Vec<ParticipantRole> = Vec::new();
        for role in authorized_by {
            if !signers.contains(role) {
                signers.push(*role);
            }
        }
        if (signers.len() as u32) < self.threshold {
            return Err(Error::ThresholdNotMet {
                required: self.threshold,
                collected: signers.len() as u32,
            });
        }
        Ok(signers)
    }

    /// Collect signature fragments from the authorized wallets and submit
    /// the combined transaction. Returns the broadcast transaction id.
    pub async fn collect_and_submit(
        &self,
        escrow_id: &str,
        endpoints: &RoleMap<ValidatedEndpoint>,
        signers: &[ParticipantRole],
        payout: &PayoutInstruction,
    ) -> Result<String> {
        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            destination = %sanitize_address(&payout.address),
            signers = signers.len(),
            "release: collecting signature fragments"
        );

        let creator = signers[0];
        let creator_wallet = self.factory.connect(&endpoints[&creator])?;

        // The spend created on a multisig wallet already carries the
        // creator's signature: fragment one.
        let created = creator_wallet
            .create_release_transaction(vec![TransferDestination {
                address: payout.address.clone(),
                amount: payout.amount,
            }])
            .await
            .map_err(Error::from)?;

        let mut collected: u32 = 0;
        let mut tx_data_hex = String::new();
        if is_valid_tx_fragment(&created.tx_data_hex) {
            collected = 1;
            tx_data_hex = created.tx_data_hex;
        } else {
            warn!(
                escrow = %sanitize_escrow_id(escrow_id),
                role = %creator,
                "release: created transaction failed fragment validation"
            );
        }

        // Each further authorized wallet co-signs the accumulated fragment
        // until the threshold is met. A signer that fails (transport or
        // format) is skipped; whether enough signatures were gathered is
        // decided at the end.
        for role in &signers[1..] {
            if collected >= self.threshold {
                break;
            }
            match self.co_sign(endpoints, *role, tx_data_hex.clone()).await {
                Ok(fragment) => {
                    collected += 1;
                    tx_data_hex = fragment;
                }
                Err(e) => {
                    warn!(
                        escrow = %sanitize_escrow_id(escrow_id),
                        role = %role,
                        error = %e,
                        "release: signer skipped"
                    );
                }
            }
        }

        if collected < self.threshold {
            return Err(Error::ThresholdNotMet {
                required: self.threshold,
                collected,
            });
        }

        // Fully signed: broadcast through the creator's wallet.
        let submitted = creator_wallet
            .submit_multisig(tx_data_hex)
            .await
            .map_err(Error::from)?;

        let tx_id = submitted
            .tx_hash_list
            .into_iter()
            .next()
            .ok_or_else(|| Error::WalletRpc("submit returned no transaction id".to_string()))?;

        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            tx = %sanitize_txid(&tx_id),
            "release: transaction submitted"
        );

        Ok(tx_id)
    }

    async fn co_sign(
        &self,
        endpoints: &RoleMap<ValidatedEndpoint>,
        role: ParticipantRole,
        tx_data_hex: String,
    ) -> Result<String> {
        let wallet = self.factory.connect(&endpoints[&role])?;
        let signed = wallet.sign_multisig(tx_data_hex).await.map_err(Error::from)?;
        if !is_valid_tx_fragment(&signed.tx_data_hex) {
            return Err(Error::InvalidHandshakeFormat(format!(
                "{} signature fragment failed format validation",
                role
            )));
        }
        Ok(signed.tx_data_hex)
    }
}
