use serde::{Deserialize, Serialize};
use serde_json::json;
use chrono::Utc;

use crate::core::transaction::Transaction;
use crate::crypto::{canonical_bytes, sha256_hex};

/// Default sentinel stored as the genesis block's `previous_hash`
pub const GENESIS_PREVIOUS_HASH: &str = "1";
/// Default genesis proof
pub const GENESIS_PROOF: u64 = 100;

/// Block structure. Never mutated once appended to the chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // unix millis
    pub previous_hash: String,
    pub proof: u64,
    pub difficulty: u32,
    pub transactions: Vec<Transaction>,
    /// Digest of every other field, stamped at sealing time
    pub hash: String,
}

impl Block {
    /// Create the genesis block. No proof search: the proof is taken as given.
    pub fn genesis(proof: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Self::seal(1, previous_hash, proof, 0, transactions)
    }

    /// Build a block at `index` and stamp its hash
    pub fn seal(
        index: u64,
        previous_hash: String,
        proof: u64,
        difficulty: u32,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: Utc::now().timestamp_millis(),
            previous_hash,
            proof,
            difficulty,
            transactions,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 over the canonical encoding of all fields except `hash`.
    ///
    /// Uses the same encoder as storage, so two blocks with identical field
    /// values hash identically no matter how they were built or loaded.
    pub fn compute_hash(&self) -> String {
        let fields = json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "previous_hash": self.previous_hash,
            "proof": self.proof,
            "difficulty": self.difficulty,
            "transactions": self.transactions,
        });
        sha256_hex(&canonical_bytes(&fields))
    }

    /// Stored hash still matches the fields
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1
    }
}
