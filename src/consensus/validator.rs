use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consensus::pow;
use crate::core::block::Block;

/// What went wrong at a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingKind {
    /// `index` does not match the block's position
    IndexMismatch,
    /// Stored hash differs from the recomputed digest
    HashMismatch,
    /// `previous_hash` differs from the predecessor's digest
    BrokenLink,
    /// Proof does not satisfy the admission predicate
    ProofRejected,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FindingKind::IndexMismatch => "index does not match chain position",
            FindingKind::HashMismatch => "stored hash does not match block contents",
            FindingKind::BrokenLink => "previous_hash does not match preceding block",
            FindingKind::ProofRejected => "proof fails admission predicate",
        };
        f.write_str(text)
    }
}

/// Tamper or corruption signal. A value, never an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityFinding {
    /// 1-based chain position of the failing block
    pub index: u64,
    pub kind: FindingKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub first_invalid_index: Option<u64>,
    pub finding: Option<IntegrityFinding>,
}

impl ValidationReport {
    fn from_first(finding: Option<IntegrityFinding>) -> Self {
        Self {
            valid: finding.is_none(),
            first_invalid_index: finding.as_ref().map(|f| f.index),
            finding,
        }
    }
}

/// Replays a chain and reports integrity failures
pub struct ChainValidator;

impl ChainValidator {
    /// Stop at the earliest failing block
    pub fn validate(chain: &[Block]) -> ValidationReport {
        let first = (0..chain.len()).find_map(|position| Self::check_at(chain, position));
        if let Some(finding) = &first {
            tracing::warn!("Chain invalid at block {}: {}", finding.index, finding.kind);
        }
        ValidationReport::from_first(first)
    }

    /// Keep scanning and collect one finding per failing block, earliest first
    pub fn audit(chain: &[Block]) -> Vec<IntegrityFinding> {
        (0..chain.len())
            .filter_map(|position| Self::check_at(chain, position))
            .collect()
    }

    /// Genesis only needs its position and its own seal to hold; linkage and
    /// proof are checked from the second block on.
    fn check_at(chain: &[Block], position: usize) -> Option<IntegrityFinding> {
        let block = &chain[position];
        let index = position as u64 + 1;
        let finding = |kind| Some(IntegrityFinding { index, kind });

        if block.index != index {
            return finding(FindingKind::IndexMismatch);
        }
        if !block.has_valid_hash() {
            return finding(FindingKind::HashMismatch);
        }
        if position == 0 {
            return None;
        }

        let previous = &chain[position - 1];
        if block.previous_hash != previous.compute_hash() {
            return finding(FindingKind::BrokenLink);
        }
        if !pow::verify(block.proof, previous.proof, block.difficulty) {
            return finding(FindingKind::ProofRejected);
        }
        None
    }
}
