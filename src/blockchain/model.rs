use log::debug;
use serde_json::Value;

use super::Block;
use crate::error::LedgerError;

/// Simple in-memory proof-of-effort chain.
#[derive(Debug, Clone)]
pub struct Blockchain {
    chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Initialize a new chain holding only the genesis block.
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        // Only `replace` swaps the vector, and it refuses empty candidates.
        &self.chain[self.chain.len() - 1]
    }

    /// Append a block that must extend the current tail.
    pub fn append(&mut self, block: Block) -> Result<&Block, LedgerError> {
        block.is_valid_link(self.last_block())?;
        self.chain.push(block);
        Ok(self.last_block())
    }

    /// Swap in `candidate` if it is a valid chain strictly longer than ours.
    pub fn replace(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            debug!(
                "replace skipped: candidate length {} <= local {}",
                candidate.len(),
                self.chain.len()
            );
            return false;
        }
        if !is_valid_chain(&candidate) {
            debug!("replace skipped: candidate chain is invalid");
            return false;
        }
        self.chain = candidate;
        true
    }

    /// Validate the entire chain: genesis, linkage and hashes.
    pub fn is_valid_chain(&self) -> bool {
        is_valid_chain(&self.chain)
    }

    /// Blocks recording efforts of `user_id` (genesis excluded).
    pub fn efforts_for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Block> {
        self.chain
            .iter()
            .skip(1)
            .filter(move |b| b.user_id() == Some(user_id))
    }

    /// Blocks recording efforts of `user_id` in `period` (genesis excluded).
    pub fn efforts_in_period<'a>(
        &'a self,
        user_id: &'a str,
        period: &'a str,
    ) -> impl Iterator<Item = &'a Block> {
        efforts_in_period(&self.chain, user_id, period)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }
}

/// Whole-chain integrity check usable on chains fetched from peers.
pub fn is_valid_chain(blocks: &[Block]) -> bool {
    let Some(genesis) = blocks.first() else {
        return false;
    };
    if *genesis != Block::genesis() {
        return false;
    }
    blocks
        .windows(2)
        .all(|pair| pair[1].is_valid_link(&pair[0]).is_ok())
}

/// Efforts of `user_id` in `period` within `blocks`. The key fields are
/// compared trimmed, so `"w1 "` and `"w1"` name the same period.
pub fn efforts_in_period<'a>(
    blocks: &'a [Block],
    user_id: &'a str,
    period: &'a str,
) -> impl Iterator<Item = &'a Block> {
    let (user_id, period) = (user_id.trim(), period.trim());
    blocks.iter().skip(1).filter(move |b| {
        effort_field(b, "user_id") == Some(user_id) && effort_field(b, "period") == Some(period)
    })
}

fn effort_field<'a>(block: &'a Block, key: &str) -> Option<&'a str> {
    block.effort_data.get(key).and_then(Value::as_str).map(str::trim)
}
