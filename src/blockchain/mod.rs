pub mod block;
pub mod model;

pub use block::{Block, EffortData, ProofBundle, canonical_json};
pub use model::{Blockchain, efforts_in_period, is_valid_chain};

/// `previous_hash` sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Genesis is pinned to the epoch so every node derives the same hash.
pub const GENESIS_TIMESTAMP: i64 = 0;

pub const GENESIS_VALIDATOR: &str = "genesis";

/// Whether the proof bundle is part of the hashed block content.
/// Changing this breaks hash compatibility with every existing chain.
pub const PROOF_IN_BLOCK_HASH: bool = false;
