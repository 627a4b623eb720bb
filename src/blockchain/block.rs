use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use super::{GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP, GENESIS_VALIDATOR, PROOF_IN_BLOCK_HASH};
use crate::error::LedgerError;

/// Effort payload as carried by the chain: an opaque JSON object.
pub type EffortData = Map<String, Value>;

/// Signatures over `effort_data` by the submitting user and the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProofBundle {
    pub user_signature: String,
    pub validator_signature: String,
}

/// A single block in the chain holding one attested effort record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix timestamp (UTC)
    pub effort_data: EffortData,
    pub validated_by: String,
    pub proof: ProofBundle,
    pub user_public_key: String,
    pub previous_hash: String,
    pub hash: String, // Cached hash of the block
}

impl Block {
    /// The fixed first block shared by every node.
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            timestamp: GENESIS_TIMESTAMP,
            effort_data: EffortData::new(),
            validated_by: GENESIS_VALIDATOR.to_string(),
            proof: ProofBundle::default(),
            user_public_key: String::new(),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Build the successor of `predecessor` carrying an admitted effort.
    pub fn next(
        predecessor: &Block,
        effort_data: EffortData,
        validated_by: String,
        proof: ProofBundle,
        user_public_key: String,
    ) -> Self {
        let mut block = Self {
            index: predecessor.index + 1,
            timestamp: Utc::now().timestamp().max(predecessor.timestamp),
            effort_data,
            validated_by,
            proof,
            user_public_key,
            previous_hash: predecessor.hash.clone(),
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 over the canonical JSON of the block content (everything
    /// except `hash`, and except `proof` unless `PROOF_IN_BLOCK_HASH`).
    pub fn compute_hash(&self) -> String {
        let mut content = json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "effort_data": self.effort_data,
            "validated_by": self.validated_by,
            "previous_hash": self.previous_hash,
            "user_public_key": self.user_public_key,
        });
        if PROOF_IN_BLOCK_HASH {
            if let Value::Object(map) = &mut content {
                map.insert("proof".to_string(), json!(self.proof));
            }
        }
        let mut hasher = Sha256::new();
        hasher.update(canonical_json(&content).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// `user_id` of the effort record, if present and a string.
    pub fn user_id(&self) -> Option<&str> {
        self.effort_data.get("user_id").and_then(Value::as_str)
    }

    /// Rebuild a block from its wire record.
    pub fn from_value(value: Value) -> Result<Self, LedgerError> {
        let block: Block =
            serde_json::from_value(value).map_err(|e| LedgerError::MalformedBlock(e.to_string()))?;
        if !is_hex_digest(&block.hash) {
            return Err(LedgerError::MalformedBlock(
                "hash must be 64 hex characters".into(),
            ));
        }
        if block.previous_hash.is_empty() || !block.previous_hash.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(LedgerError::MalformedBlock(
                "previous_hash must be a hex string".into(),
            ));
        }
        Ok(block)
    }

    /// Check that this block extends `predecessor` and that its cached hash
    /// matches its content. Does NOT look at signatures.
    pub fn is_valid_link(&self, predecessor: &Block) -> Result<(), LedgerError> {
        if self.previous_hash != predecessor.hash {
            return Err(LedgerError::ChainLinkInvalid(format!(
                "block #{} previous_hash does not match tail hash",
                self.index
            )));
        }
        if self.index != predecessor.index + 1 {
            return Err(LedgerError::ChainLinkInvalid(format!(
                "expected index {}, got {}",
                predecessor.index + 1,
                self.index
            )));
        }
        if self.hash != self.compute_hash() {
            return Err(LedgerError::ChainLinkInvalid(format!(
                "block #{} stored hash does not match its content",
                self.index
            )));
        }
        Ok(())
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn is_hex_digest(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}
