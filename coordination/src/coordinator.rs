//! Escrow coordinator facade
//!
//! Owns one coordination record per escrow id behind a per-escrow
//! operation lock. Callers (one per in-flight API request) go through the
//! facade; operations on the same escrow are serialized, operations on
//! different escrows run fully in parallel. There is no global lock.
//!
//! Locking model: the operation lock is held for the whole of a mutating
//! call; the record lock only for short critical sections. Handshake RPC
//! rounds run without the record lock so `abort_handshake` can interject
//! between rounds; a round whose state moved underneath it discards its
//! results.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use monero_escrow_common::sanitize::{sanitize_address, sanitize_escrow_id};
use monero_escrow_common::{Amount, Error, Result};
use monero_escrow_wallet::{validate_endpoint, WalletControlFactory};

use crate::config::CoordinatorConfig;
use crate::handshake::{assert_address_agreement, HandshakeDriver};
use crate::registry;
use crate::release::{PayoutInstruction, ReleaseCoordinator};
use crate::state::{BalanceCache, CoordinationState, EscrowCoordination, ParticipantRole};
use crate::store::CoordinationStore;
use crate::sync::BalanceSyncEngine;

/// Response of `register_party`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub escrow_id: String,
    pub state: CoordinationState,
    pub registered_roles: Vec<ParticipantRole>,
}

/// Response of `coordinate_handshake`.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeOutcome {
    pub state: CoordinationState,
    pub multisig_address: Option<String>,
}

/// Response of `check_balance`.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub total: Amount,
    pub unlocked: Amount,
    pub as_of: DateTime<Utc>,
}

/// Response of `initiate_release`.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReceipt {
    pub tx_id: String,
}

/// Read-only view of a coordination record.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinationSnapshot {
    pub escrow_id: String,
    pub state: CoordinationState,
    pub registered_roles: Vec<ParticipantRole>,
    pub multisig_address: Option<String>,
    pub balance: BalanceCache,
    pub release_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
struct EscrowEntry {
    record: Arc<RwLock<EscrowCoordination>>,
    op_lock: Arc<Mutex<()>>,
}

enum HandshakeStep {
    Prepare,
    Make,
    Exchange { final_round: bool },
}

/// Non-custodial escrow coordinator.
///
/// Stores wallet endpoint URLs only, never wallets or key material, and
/// coordinates the exchange of opaque multisig tokens between the three
/// parties' own wallet endpoints.
pub struct EscrowCoordinator {
    entries: RwLock<HashMap<String, EscrowEntry>>,
    store: Arc<dyn CoordinationStore>,
    factory: Arc<dyn WalletControlFactory>,
    config: CoordinatorConfig,
}

impl EscrowCoordinator {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        factory: Arc<dyn WalletControlFactory>,
        config: CoordinatorConfig,
    ) -> Self {
        info!(
            threshold = config.threshold,
            parties = config.total_parties,
            exchange_rounds = config.exchange_rounds,
            "creating non-custodial escrow coordinator"
        );
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
            factory,
            config,
        }
    }

    /// Register a party's wallet endpoint for an escrow.
    ///
    /// The coordination record is created on the first registration
    /// attempt; the endpoint must pass the loopback-only check or the
    /// record is left untouched.
    pub async fn register_party(
        &self,
        escrow_id: &str,
        role: ParticipantRole,
        endpoint: &str,
    ) -> Result<RegistrationStatus> {
        // Fail fast before creating any record for a garbage endpoint.
        validate_endpoint(endpoint)?;

        let entry = self.entry(escrow_id, true).await?;
        let _op = entry.op_lock.lock().await;

        let mut record = entry.record.write().await;
        registry::register_party(&mut record, role, endpoint)?;
        self.store.persist(&record).await?;

        Ok(RegistrationStatus {
            escrow_id: record.escrow_id.clone(),
            state: record.state,
            registered_roles: record.registered_roles(),
        })
    }

    /// Drive the multisig setup handshake to completion.
    ///
    /// Resumes from the last committed state, so a restarted process picks
    /// up mid-handshake instead of replaying completed rounds. Re-invoking
    /// on a `Ready` coordination returns `AlreadyMultisig` without any
    /// network call.
    pub async fn coordinate_handshake(&self, escrow_id: &str) -> Result<HandshakeOutcome> {
        let entry = self.entry(escrow_id, false).await?;
        let _op = entry.op_lock.lock().await;

        let driver = HandshakeDriver::new(Arc::clone(&self.factory), self.config.threshold);

        loop {
            // Snapshot under the record lock; the RPC round below runs
            // without it so an abort can interject between rounds.
            let (step, state, endpoints, tokens) = {
                let record = entry.record.read().await;
                let step = match record.state {
                    CoordinationState::AwaitingRegistrations => {
                        let missing: Vec<&str> = ParticipantRole::ALL
                            .iter()
                            .filter(|role| !record.parties.contains_key(role))
                            .map(|role| role.as_str())
                            .collect();
                        return Err(Error::PartialRegistration(format!(
                            "waiting for wallet registrations: {}",
                            missing.join(", ")
                        )));
                    }
                    CoordinationState::Ready | CoordinationState::Released => {
                        return Err(Error::AlreadyMultisig);
                    }
                    CoordinationState::Failed => {
                        return Err(Error::CoordinationFailed(
                            "coordination is failed and cannot be resumed; start a new escrow"
                                .to_string(),
                        ));
                    }
                    CoordinationState::AllRegistered => HandshakeStep::Prepare,
                    CoordinationState::PreparingRound1 => HandshakeStep::Make,
                    CoordinationState::KeysExchangedRound2 => HandshakeStep::Exchange {
                        final_round: record.exchange_rounds_done + 1
                            >= self.config.exchange_rounds,
                    },
                };
                (
                    step,
                    record.state,
                    record.registered_endpoints()?,
                    record.round_tokens.clone(),
                )
            };

            match step {
                HandshakeStep::Prepare => {
                    match driver.prepare_round(escrow_id, &endpoints).await {
                        Ok(round_tokens) => {
                            self.apply_round(&entry, state, |record| {
                                record.set_round_tokens(round_tokens);
                                record.transition(CoordinationState::PreparingRound1)
                            })
                            .await?;
                        }
                        Err(e) => return self.fail_handshake(&entry, e).await,
                    }
                }
                HandshakeStep::Make => {
                    match driver.make_round(escrow_id, &endpoints, &tokens).await {
                        Ok(outcome) => {
                            self.apply_round(&entry, state, |record| {
                                record.set_round_tokens(outcome.tokens);
                                record.exchange_rounds_done = 1;
                                record.transition(CoordinationState::KeysExchangedRound2)
                            })
                            .await?;
                        }
                        Err(e) => return self.fail_handshake(&entry, e).await,
                    }
                }
                HandshakeStep::Exchange { final_round } => {
                    match driver
                        .exchange_round(escrow_id, &endpoints, &tokens, final_round)
                        .await
                    {
                        Ok(outcome) if final_round => {
                            let address = match assert_address_agreement(&outcome.addresses) {
                                Ok(address) => address,
                                Err(e) => return self.fail_handshake(&entry, e).await,
                            };
                            self.apply_round(&entry, state, |record| {
                                record.set_multisig_address(address.clone())?;
                                record.round_tokens.clear();
                                record.exchange_rounds_done += 1;
                                record.transition(CoordinationState::Ready)
                            })
                            .await?;

                            info!(
                                escrow = %sanitize_escrow_id(escrow_id),
                                address = %sanitize_address(&address),
                                "multisig handshake complete"
                            );
                            return Ok(HandshakeOutcome {
                                state: CoordinationState::Ready,
                                multisig_address: Some(address),
                            });
                        }
                        Ok(outcome) => {
                            self.apply_round(&entry, state, |record| {
                                record.set_round_tokens(outcome.tokens);
                                record.exchange_rounds_done += 1;
                                Ok(())
                            })
                            .await?;
                        }
                        Err(e) => return self.fail_handshake(&entry, e).await,
                    }
                }
            }
        }
    }

    /// Abort an in-flight handshake between rounds.
    ///
    /// Does not cancel RPC calls already in flight; their results are
    /// discarded when the round tries to apply them.
    pub async fn abort_handshake(&self, escrow_id: &str) -> Result<CoordinationState> {
        let entry = self.entry(escrow_id, false).await?;
        // Deliberately skips the operation lock: the abort interjects while
        // coordinate_handshake holds it.
        let mut record = entry.record.write().await;
        if !record.state.handshake_active() {
            return Err(Error::InvalidState {
                expected: "an active handshake".to_string(),
                actual: record.state.to_string(),
            });
        }
        record.fail("aborted by caller");
        self.store.persist(&record).await?;
        Ok(record.state)
    }

    /// Lazily synchronize the multisig wallets and report the balance.
    ///
    /// All-or-nothing: on any failure the cached balance keeps its
    /// previous value.
    pub async fn check_balance(&self, escrow_id: &str) -> Result<BalanceReport> {
        let entry = self.entry(escrow_id, false).await?;
        let _op = entry.op_lock.lock().await;

        let endpoints = {
            let record = entry.record.read().await;
            match record.state {
                CoordinationState::Ready | CoordinationState::Released => {
                    record.registered_endpoints()?
                }
                state => {
                    return Err(Error::InvalidState {
                        expected: "ready".to_string(),
                        actual: state.to_string(),
                    })
                }
            }
        };

        let engine = BalanceSyncEngine::new(Arc::clone(&self.factory));
        let cache = engine.sync_and_get_balance(escrow_id, &endpoints).await?;

        let as_of = cache
            .synced_at
            .ok_or_else(|| Error::Internal("sync completed without a timestamp".to_string()))?;

        let mut record = entry.record.write().await;
        record.balance_cache = cache.clone();
        record.updated_at = Utc::now();
        self.store.persist(&record).await?;

        Ok(BalanceReport {
            total: cache.total,
            unlocked: cache.unlocked,
            as_of,
        })
    }

    /// Collect threshold signatures and disburse the escrow.
    ///
    /// `authorized_by` is the role combination the caller's arbitration
    /// policy approved; the engine checks arity and registration only.
    pub async fn initiate_release(
        &self,
        escrow_id: &str,
        authorized_by: &[ParticipantRole],
        payout: PayoutInstruction,
    ) -> Result<ReleaseReceipt> {
        let entry = self.entry(escrow_id, false).await?;
        let _op = entry.op_lock.lock().await;

        let release = ReleaseCoordinator::new(Arc::clone(&self.factory), self.config.threshold);
        let signers = release.validate_signers(authorized_by)?;

        let endpoints = {
            let record = entry.record.read().await;
            match record.state {
                CoordinationState::Ready => record.registered_endpoints()?,
                state => {
                    return Err(Error::InvalidState {
                        expected: "ready".to_string(),
                        actual: state.to_string(),
                    })
                }
            }
        };

        let tx_id = release
            .collect_and_submit(escrow_id, &endpoints, &signers, &payout)
            .await?;

        let mut record = entry.record.write().await;
        record.transition(CoordinationState::Released)?;
        record.release_tx_id = Some(tx_id.clone());
        if let Err(e) = self.store.persist(&record).await {
            // The transaction is on the network; losing the durable write
            // must not lose the tx id for the caller.
            warn!(
                escrow = %sanitize_escrow_id(escrow_id),
                error = %e,
                "release committed but durable write failed"
            );
        }

        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            "escrow released"
        );
        Ok(ReleaseReceipt { tx_id })
    }

    /// Read-only view of a coordination record.
    pub async fn status(&self, escrow_id: &str) -> Result<CoordinationSnapshot> {
        let entry = self.entry(escrow_id, false).await?;
        let record = entry.record.read().await;
        Ok(CoordinationSnapshot {
            escrow_id: record.escrow_id.clone(),
            state: record.state,
            registered_roles: record.registered_roles(),
            multisig_address: record.multisig_address.clone(),
            balance: record.balance_cache.clone(),
            release_tx_id: record.release_tx_id.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    // ========================================================================
    // internals
    // ========================================================================

    /// Fetch the entry for an escrow, falling back to the committed store
    /// so a restart resumes the last persisted state.
    async fn entry(&self, escrow_id: &str, create: bool) -> Result<EscrowEntry> {
        if let Some(entry) = self.entries.read().await.get(escrow_id) {
            return Ok(entry.clone());
        }

        let stored = self.store.load(escrow_id).await?;

        let mut entries = self.entries.write().await;
        // Raced with another caller while loading.
        if let Some(entry) = entries.get(escrow_id) {
            return Ok(entry.clone());
        }

        let record = match stored {
            Some(record) => {
                info!(
                    escrow = %sanitize_escrow_id(escrow_id),
                    state = %record.state,
                    "resumed coordination record from store"
                );
                record
            }
            None if create => EscrowCoordination::new(escrow_id),
            None => return Err(Error::EscrowNotFound(escrow_id.to_string())),
        };

        let entry = EscrowEntry {
            record: Arc::new(RwLock::new(record)),
            op_lock: Arc::new(Mutex::new(())),
        };
        entries.insert(escrow_id.to_string(), entry.clone());
        Ok(entry)
    }

    /// Apply a completed round's results in one critical section and
    /// persist. Results are discarded if the state moved while the round
    /// was in flight (caller abort).
    async fn apply_round<F>(
        &self,
        entry: &EscrowEntry,
        expected: CoordinationState,
        apply: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut EscrowCoordination) -> Result<()>,
    {
        let mut record = entry.record.write().await;
        if record.state != expected {
            return Err(Error::CoordinationFailed(format!(
                "state moved to {} while a round was in flight; round results discarded",
                record.state
            )));
        }
        apply(&mut record)?;
        self.store.persist(&record).await
    }

    async fn fail_handshake(&self, entry: &EscrowEntry, cause: Error) -> Result<HandshakeOutcome> {
        let mut record = entry.record.write().await;
        record.fail(&cause.to_string());
        if let Err(e) = self.store.persist(&record).await {
            warn!(error = %e, "failed to persist failed coordination");
        }
        Err(cause)
    }
}
