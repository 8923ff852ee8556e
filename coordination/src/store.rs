//! Durability boundary
//!
//! The coordination record is handed to the store after every state
//! transition so a process restart resumes from the last committed state
//! instead of replaying completed rounds. The production store is an
//! external collaborator behind this trait; the in-memory implementation
//! serves tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use monero_escrow_common::Result;

use crate::state::EscrowCoordination;

/// Get/put persistence keyed by escrow id.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Load the last committed record for an escrow, if any.
    async fn load(&self, escrow_id: &str) -> Result<Option<EscrowCoordination>>;

    /// Durably write the record. Called after every state transition.
    async fn persist(&self, record: &EscrowCoordination) -> Result<()>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, EscrowCoordination>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn load(&self, escrow_id: &str) -> Result<Option<EscrowCoordination>> {
        Ok(self.records.read().await.get(escrow_id).cloned())
    }

    async fn persist(&self, record: &EscrowCoordination) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.escrow_id.clone(), record.clone());
        Ok(())
    }
}
