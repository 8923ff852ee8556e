//! Balance sync engine
//!
//! A multisig wallet only becomes aware of incoming funds after every
//! party has exported its private view of multisig outputs and imported
//! the other two parties' exports. That exchange is not automatic and
//! needs all three endpoints reachable at once, so it runs lazily when a
//! caller asks for the balance, never on a schedule.
//!
//! A sync is all-or-nothing: if any endpoint fails during export or
//! import, the whole attempt fails and the cached balance keeps its
//! previous (stale) value.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info};

use monero_escrow_common::format::validate_sync_blob;
use monero_escrow_common::sanitize::{sanitize_escrow_id, sanitize_token};
use monero_escrow_common::{Error, Result};
use monero_escrow_wallet::{ValidatedEndpoint, WalletControlFactory};

use crate::state::{BalanceCache, ParticipantRole};

type RoleMap<T> = HashMap<ParticipantRole, T>;

pub struct BalanceSyncEngine {
    factory: Arc<dyn WalletControlFactory>,
}

impl BalanceSyncEngine {
    pub fn new(factory: Arc<dyn WalletControlFactory>) -> Self {
        Self { factory }
    }

    /// Run one full export/import pass and read the fresh balance.
    ///
    /// Returns the new cache value; the caller decides when to apply it to
    /// the record (after re-checking state under the record lock).
    pub async fn sync_and_get_balance(
        &self,
        escrow_id: &str,
        endpoints: &RoleMap<ValidatedEndpoint>,
    ) -> Result<BalanceCache> {
        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            "balance sync: exporting multisig info from all participants"
        );

        // Export from all three endpoints concurrently.
        let exports = {
            let calls = ParticipantRole::ALL.iter().map(|role| {
                let role = *role;
                let endpoint = endpoints[&role].clone();
                let factory = Arc::clone(&self.factory);
                async move {
                    let wallet = factory.connect(&endpoint)?;
                    let blob = wallet.export_multisig_info().await.map_err(Error::from)?;
                    validate_sync_blob(&blob).map_err(|reason| {
                        Error::InvalidHandshakeFormat(format!("{} sync export {}", role, reason))
                    })?;
                    debug!(role = %role, blob = %sanitize_token(&blob), "sync info exported");
                    Ok::<(ParticipantRole, String), Error>((role, blob))
                }
            });

            let mut exports: RoleMap<String> = HashMap::new();
            for result in join_all(calls).await {
                let (role, blob) = result?;
                exports.insert(role, blob);
            }
            exports
        };

        // Import each party's two peer blobs, also concurrently. The sync
        // only counts once every import landed.
        let imports = ParticipantRole::ALL.iter().map(|role| {
            let role = *role;
            let endpoint = endpoints[&role].clone();
            let peer_blobs: Vec<String> = role
                .peers()
                .iter()
                .map(|peer| exports[peer].clone())
                .collect();
            let factory = Arc::clone(&self.factory);
            async move {
                let wallet = factory.connect(&endpoint)?;
                let n_outputs = wallet
                    .import_multisig_info(peer_blobs)
                    .await
                    .map_err(Error::from)?;
                debug!(role = %role, n_outputs, "sync info imported");
                Ok::<(), Error>(())
            }
        });

        for result in join_all(imports).await {
            result?;
        }

        // The three wallets now share one view; any endpoint reports the
        // same numbers. Read from the first role in canonical order.
        let reader = ParticipantRole::ALL[0];
        let wallet = self.factory.connect(&endpoints[&reader])?;
        let balance = wallet.get_balance().await.map_err(Error::from)?;

        info!(
            escrow = %sanitize_escrow_id(escrow_id),
            total = balance.balance,
            unlocked = balance.unlocked_balance,
            "balance sync complete"
        );

        Ok(BalanceCache {
            total: balance.balance,
            unlocked: balance.unlocked_balance,
            synced_at: Some(Utc::now()),
        })
    }
}
