//! Agent registry and wallet collaborator.
//!
//! The on-chain side of ARCA City expressed as traits with in-memory
//! implementations: the agent registry (create/kill/withdraw/claim), token
//! wallets over a shared ledger, game-score reputation updates, and the
//! per-agent tax collection tasks.

pub mod error;
pub mod registry;
pub mod reputation;
pub mod tax;
pub mod wallet;

pub use error::RegistryError;
pub use registry::{AgentRecord, AgentRegistry, InMemoryRegistry};
pub use reputation::{
    apply_delta, cull_lowest_reputation, reputation_delta, submit_game_score, ReputationChange,
    CULL_THRESHOLD, MAX_REPUTATION,
};
pub use tax::{SharedRegistry, TaxPolicy, TaxScheduler};
pub use wallet::{generate_address, is_valid_address, Ledger, LedgerWallet, Transfer, Wallet};
