//! Non-custodial multisig escrow coordination engine
//!
//! Coordinates a 2-of-3 threshold multisig wallet setup and fund release
//! between three independent parties (buyer, vendor, arbiter), each running
//! their own wallet-control endpoint.
//!
//! **Key principles:**
//! 1. The engine stores loopback RPC URLs only, never wallets or keys
//! 2. Multisig operations run inside each party's own wallet endpoint;
//!    only opaque tokens pass through the coordinator
//! 3. Formats, thresholds, and address agreement are validated server-side
//! 4. Private key material is structurally unable to reach this process
//!
//! **Flow:** register three endpoints → drive the multi-round handshake to
//! a shared multisig address → sync balances on demand → collect threshold
//! signatures for release.

pub mod config;
pub mod coordinator;
pub mod handshake;
pub mod registry;
pub mod release;
pub mod state;
pub mod store;
pub mod sync;

pub use config::CoordinatorConfig;
pub use coordinator::{
    BalanceReport, CoordinationSnapshot, EscrowCoordinator, HandshakeOutcome,
    RegistrationStatus, ReleaseReceipt,
};
pub use release::PayoutInstruction;
pub use state::{
    BalanceCache, CoordinationState, EscrowCoordination, ParticipantRole, PartyRegistration,
};
pub use store::{CoordinationStore, MemoryStore};
