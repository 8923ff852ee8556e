//! Mock wallet-control fleet for offline coordination tests
//!
//! Stands in for the three parties' wallet endpoints behind the
//! `WalletControl` seam. Responses are deterministic; individual methods
//! can be scripted to fail (unreachable, wallet-side RPC error) or to
//! return malformed material.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use monero_escrow_common::{
    BalanceResult, CreateTransactionResult, Error, ExchangeMultisigKeysResult,
    MakeMultisigResult, MultisigStatus, Result, RpcError, SignMultisigResult,
    SubmitMultisigResult, TransferDestination,
};
use monero_escrow_coordination::{
    CoordinationStore, CoordinatorConfig, EscrowCoordinator, MemoryStore, ParticipantRole,
};
use monero_escrow_wallet::{
    ensure_loopback, validate_endpoint, ValidatedEndpoint, WalletControl, WalletControlFactory,
};

static TRACING: std::sync::Once = std::sync::Once::new();

/// Install a test subscriber once per binary; honors RUST_LOG.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const BUYER_URL: &str = "http://127.0.0.1:18082";
pub const VENDOR_URL: &str = "http://127.0.0.1:18083";
pub const ARBITER_URL: &str = "http://127.0.0.1:18084";

pub const SHARED_ADDRESS: &str = "5SharedMultisigAddressForTesting111";

pub fn url_for(role: ParticipantRole) -> &'static str {
    match role {
        ParticipantRole::Buyer => BUYER_URL,
        ParticipantRole::Vendor => VENDOR_URL,
        ParticipantRole::Arbiter => ARBITER_URL,
    }
}

/// Build a handshake token of valid shape (prefix + padding past the
/// minimum length).
pub fn padded_token(prefix: &str, seed: &str) -> String {
    let mut token = format!("{}{}", prefix, seed);
    while token.len() < 150 {
        token.push('f');
    }
    token
}

/// Scripted failure for one wallet method.
#[derive(Clone, Debug)]
pub enum Fault {
    /// Transport-level failure (connection refused)
    Unreachable,
    /// Wallet-side JSON-RPC error
    Rpc(i64, String),
    /// Respond with material that fails format validation
    Malformed,
}

pub struct MockWallet {
    pub name: String,
    final_address: Mutex<String>,
    balance: Mutex<(u64, u64)>,
    faults: Mutex<HashMap<String, Fault>>,
    calls: Mutex<Vec<String>>,
}

impl MockWallet {
    pub fn new(name: &str, final_address: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            final_address: Mutex::new(final_address.to_string()),
            balance: Mutex::new((0, 0)),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_on(&self, method: &str, fault: Fault) {
        self.faults
            .lock()
            .unwrap()
            .insert(method.to_string(), fault);
    }

    pub fn heal(&self, method: &str) {
        self.faults.lock().unwrap().remove(method);
    }

    pub fn set_balance(&self, total: u64, unlocked: u64) {
        *self.balance.lock().unwrap() = (total, unlocked);
    }

    pub fn set_final_address(&self, address: &str) {
        *self.final_address.lock().unwrap() = address.to_string();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    /// Record the call and resolve any scripted failure.
    /// `Ok(true)` means "respond, but with malformed material".
    fn observe(&self, method: &str) -> std::result::Result<bool, RpcError> {
        self.calls.lock().unwrap().push(method.to_string());
        match self.faults.lock().unwrap().get(method) {
            Some(Fault::Unreachable) => Err(RpcError::Unreachable),
            Some(Fault::Rpc(code, message)) => Err(RpcError::Rpc {
                code: *code,
                message: message.clone(),
            }),
            Some(Fault::Malformed) => Ok(true),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl WalletControl for MockWallet {
    async fn check_connection(&self) -> std::result::Result<(), RpcError> {
        self.observe("check_connection").map(|_| ())
    }

    async fn get_address(&self) -> std::result::Result<String, RpcError> {
        self.observe("get_address")?;
        Ok(self.final_address.lock().unwrap().clone())
    }

    async fn multisig_status(&self) -> std::result::Result<MultisigStatus, RpcError> {
        self.observe("is_multisig")?;
        Ok(MultisigStatus {
            multisig: true,
            ready: true,
            threshold: 2,
            total: 3,
        })
    }

    async fn prepare_multisig(&self) -> std::result::Result<String, RpcError> {
        let malformed = self.observe("prepare_multisig")?;
        if malformed {
            return Ok("not_a_multisig_token".to_string());
        }
        Ok(padded_token("MultisigV1", &self.name))
    }

    async fn make_multisig(
        &self,
        _threshold: u32,
        peer_infos: Vec<String>,
    ) -> std::result::Result<MakeMultisigResult, RpcError> {
        let malformed = self.observe("make_multisig")?;
        assert_eq!(peer_infos.len(), 2, "each party receives its two peers' tokens");
        if malformed {
            return Ok(MakeMultisigResult {
                address: String::new(),
                multisig_info: "short".to_string(),
            });
        }
        Ok(MakeMultisigResult {
            address: format!("5Intermediate{}", self.name),
            multisig_info: padded_token("MultisigxV1", &self.name),
        })
    }

    async fn exchange_multisig_keys(
        &self,
        peer_infos: Vec<String>,
    ) -> std::result::Result<ExchangeMultisigKeysResult, RpcError> {
        let malformed = self.observe("exchange_multisig_keys")?;
        assert_eq!(peer_infos.len(), 2);
        if malformed {
            return Ok(ExchangeMultisigKeysResult {
                address: String::new(),
                multisig_info: String::new(),
            });
        }
        Ok(ExchangeMultisigKeysResult {
            address: self.final_address.lock().unwrap().clone(),
            multisig_info: String::new(),
        })
    }

    async fn export_multisig_info(&self) -> std::result::Result<String, RpcError> {
        let malformed = self.observe("export_multisig_info")?;
        if malformed {
            return Ok(String::new());
        }
        Ok(format!("{}_sync_export_deadbeef", self.name))
    }

    async fn import_multisig_info(
        &self,
        peer_infos: Vec<String>,
    ) -> std::result::Result<u64, RpcError> {
        self.observe("import_multisig_info")?;
        assert_eq!(peer_infos.len(), 2);
        Ok(peer_infos.len() as u64)
    }

    async fn get_balance(&self) -> std::result::Result<BalanceResult, RpcError> {
        self.observe("get_balance")?;
        let (total, unlocked) = *self.balance.lock().unwrap();
        Ok(BalanceResult {
            balance: total,
            unlocked_balance: unlocked,
            multisig_import_needed: false,
        })
    }

    async fn create_release_transaction(
        &self,
        destinations: Vec<TransferDestination>,
    ) -> std::result::Result<CreateTransactionResult, RpcError> {
        let malformed = self.observe("transfer")?;
        assert_eq!(destinations.len(), 1);
        if malformed {
            return Ok(CreateTransactionResult {
                tx_data_hex: "zz_not_hex".to_string(),
                tx_hash: String::new(),
                signatures_required: 2,
            });
        }
        Ok(CreateTransactionResult {
            tx_data_hex: "abcdef0102".to_string(),
            tx_hash: "ab".repeat(32),
            signatures_required: 2,
        })
    }

    async fn sign_multisig(
        &self,
        tx_data_hex: String,
    ) -> std::result::Result<SignMultisigResult, RpcError> {
        let malformed = self.observe("sign_multisig")?;
        if malformed {
            return Ok(SignMultisigResult {
                tx_data_hex: "zz_not_hex".to_string(),
                tx_hash_list: vec![],
            });
        }
        Ok(SignMultisigResult {
            tx_data_hex: format!("{}ab", tx_data_hex),
            tx_hash_list: vec!["cd".repeat(32)],
        })
    }

    async fn submit_multisig(
        &self,
        _tx_data_hex: String,
    ) -> std::result::Result<SubmitMultisigResult, RpcError> {
        self.observe("submit_multisig")?;
        Ok(SubmitMultisigResult {
            tx_hash_list: vec!["cd".repeat(32)],
        })
    }
}

/// Routes validated endpoints to mock wallets, mirroring the production
/// factory's dispatch-time loopback re-check.
#[derive(Default)]
pub struct MockWalletFactory {
    wallets: Mutex<HashMap<String, Arc<MockWallet>>>,
}

impl MockWalletFactory {
    pub fn bind(&self, url: &str, wallet: Arc<MockWallet>) {
        let endpoint = validate_endpoint(url).expect("test endpoint must be loopback");
        self.wallets
            .lock()
            .unwrap()
            .insert(endpoint.as_str().to_string(), wallet);
    }
}

impl WalletControlFactory for MockWalletFactory {
    fn connect(&self, endpoint: &ValidatedEndpoint) -> Result<Arc<dyn WalletControl>> {
        ensure_loopback(endpoint)?;
        self.wallets
            .lock()
            .unwrap()
            .get(endpoint.as_str())
            .cloned()
            .map(|wallet| wallet as Arc<dyn WalletControl>)
            .ok_or_else(|| Error::RpcUnreachable("no wallet bound to endpoint".to_string()))
    }
}

/// A full three-party test fixture: store, factory, and one mock wallet
/// per role, all reporting the same finalized address.
pub struct TestFleet {
    pub store: Arc<MemoryStore>,
    pub factory: Arc<MockWalletFactory>,
    pub buyer: Arc<MockWallet>,
    pub vendor: Arc<MockWallet>,
    pub arbiter: Arc<MockWallet>,
}

impl TestFleet {
    pub fn new() -> Self {
        init_tracing();
        let factory = Arc::new(MockWalletFactory::default());
        let buyer = MockWallet::new("buyer", SHARED_ADDRESS);
        let vendor = MockWallet::new("vendor", SHARED_ADDRESS);
        let arbiter = MockWallet::new("arbiter", SHARED_ADDRESS);
        factory.bind(BUYER_URL, Arc::clone(&buyer));
        factory.bind(VENDOR_URL, Arc::clone(&vendor));
        factory.bind(ARBITER_URL, Arc::clone(&arbiter));
        Self {
            store: Arc::new(MemoryStore::new()),
            factory,
            buyer,
            vendor,
            arbiter,
        }
    }

    pub fn coordinator(&self) -> EscrowCoordinator {
        self.coordinator_with_config(CoordinatorConfig::default())
    }

    pub fn coordinator_with_config(&self, config: CoordinatorConfig) -> EscrowCoordinator {
        let store: Arc<dyn CoordinationStore> = self.store.clone();
        let factory: Arc<dyn WalletControlFactory> = self.factory.clone();
        EscrowCoordinator::new(store, factory, config)
    }

    pub fn wallet(&self, role: ParticipantRole) -> &Arc<MockWallet> {
        match role {
            ParticipantRole::Buyer => &self.buyer,
            ParticipantRole::Vendor => &self.vendor,
            ParticipantRole::Arbiter => &self.arbiter,
        }
    }

    pub fn total_calls(&self) -> usize {
        self.buyer.calls().len() + self.vendor.calls().len() + self.arbiter.calls().len()
    }

    /// Register all three parties for an escrow.
    pub async fn register_all(&self, coordinator: &EscrowCoordinator, escrow_id: &str) {
        for role in ParticipantRole::ALL {
            coordinator
                .register_party(escrow_id, role, url_for(role))
                .await
                .expect("registration must succeed");
        }
    }

    /// Register and complete the handshake, returning the address.
    pub async fn establish(&self, coordinator: &EscrowCoordinator, escrow_id: &str) -> String {
        self.register_all(coordinator, escrow_id).await;
        let outcome = coordinator
            .coordinate_handshake(escrow_id)
            .await
            .expect("handshake must succeed");
        outcome.multisig_address.expect("address must be recorded")
    }
}
