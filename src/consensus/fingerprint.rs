use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::block::Block;
use crate::core::transaction::{normalize_fingerprint, ValidationError};
use crate::crypto::fingerprint_bytes;

/// Where a fingerprint was first seen
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintReference {
    /// Block the first occurrence is in, or is predicted to land in
    pub block_index: u64,
    pub actor: String,
    /// False while the first occurrence is still pending
    pub sealed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintCheck {
    pub seen: bool,
    pub first_seen: Option<FingerprintReference>,
}

impl FingerprintCheck {
    /// Human-readable reason for flagging a duplicate
    pub fn flag_reason(&self) -> Option<String> {
        self.first_seen.as_ref().map(|first| {
            format!(
                "duplicate content fingerprint; first seen in block {} (actor {})",
                first.block_index, first.actor
            )
        })
    }
}

/// Raw content or an already computed hex digest
#[derive(Clone, Copy, Debug)]
pub enum FingerprintInput<'a> {
    Bytes(&'a [u8]),
    Hex(&'a str),
}

impl FingerprintInput<'_> {
    pub fn resolve(self) -> Result<String, ValidationError> {
        match self {
            FingerprintInput::Bytes(content) => Ok(fingerprint_bytes(content)),
            FingerprintInput::Hex(digest) => normalize_fingerprint(digest),
        }
    }
}

/// Advisory duplicate-content detector over sealed and pending records.
///
/// Maintained incrementally: pending entries on submit, promoted on seal.
/// A match only ever flags; it never rejects.
#[derive(Clone, Debug, Default)]
pub struct FingerprintIndex {
    sealed: HashMap<String, FingerprintReference>,
    pending: HashMap<String, FingerprintReference>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the sealed side from history
    pub fn rebuild(blocks: &[Block]) -> Self {
        let mut index = Self::new();
        for block in blocks {
            index.commit(block);
        }
        index
    }

    /// Sealed history wins over pending: it is always the earlier occurrence
    pub fn check(&self, fingerprint: &str) -> FingerprintCheck {
        let first_seen = self
            .sealed
            .get(fingerprint)
            .or_else(|| self.pending.get(fingerprint))
            .cloned();
        FingerprintCheck {
            seen: first_seen.is_some(),
            first_seen,
        }
    }

    /// Remember a submitted fingerprint until its block is sealed
    pub fn record_pending(&mut self, fingerprint: &str, predicted_index: u64, actor: &str) {
        if self.sealed.contains_key(fingerprint) {
            return;
        }
        self.pending
            .entry(fingerprint.to_string())
            .or_insert_with(|| FingerprintReference {
                block_index: predicted_index,
                actor: actor.to_string(),
                sealed: false,
            });
    }

    /// Promote fingerprints of a freshly sealed block
    pub fn commit(&mut self, block: &Block) {
        for tx in &block.transactions {
            let Some(fingerprint) = tx.fingerprint.as_deref() else {
                continue;
            };
            self.pending.remove(fingerprint);
            self.sealed
                .entry(fingerprint.to_string())
                .or_insert_with(|| FingerprintReference {
                    block_index: block.index,
                    actor: tx.actor.clone(),
                    sealed: true,
                });
        }
    }

    /// Number of distinct fingerprints in sealed history
    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{Transaction, TransactionRequest};

    fn tx_with(actor: &str, content: &[u8]) -> Transaction {
        let req = TransactionRequest::new(actor, "register")
            .with_fingerprint(fingerprint_bytes(content));
        Transaction::from_request(req, 0).unwrap()
    }

    #[test]
    fn test_unseen_fingerprint() {
        let index = FingerprintIndex::new();
        let check = index.check(&fingerprint_bytes(b"deed-1"));
        assert!(!check.seen);
        assert!(check.flag_reason().is_none());
    }

    #[test]
    fn test_pending_match() {
        let mut index = FingerprintIndex::new();
        let fp = fingerprint_bytes(b"deed-1");
        index.record_pending(&fp, 2, "alice");

        let check = index.check(&fp);
        assert!(check.seen);
        let first = check.first_seen.clone().unwrap();
        assert_eq!(first.block_index, 2);
        assert!(!first.sealed);
        assert!(check.flag_reason().unwrap().contains("alice"));
    }

    #[test]
    fn test_commit_promotes_and_keeps_earliest() {
        let mut index = FingerprintIndex::new();
        let fp = fingerprint_bytes(b"certificate");
        index.record_pending(&fp, 2, "univ-a");

        let first = Block::seal(2, "h".into(), 1, 0, vec![tx_with("univ-a", b"certificate")]);
        index.commit(&first);
        let later = Block::seal(3, "h".into(), 1, 0, vec![tx_with("univ-b", b"certificate")]);
        index.commit(&later);

        let seen = index.check(&fp).first_seen.unwrap();
        assert_eq!(seen.block_index, 2);
        assert_eq!(seen.actor, "univ-a");
        assert!(seen.sealed);
        assert_eq!(index.sealed_len(), 1);
    }

    #[test]
    fn test_rebuild_from_history() {
        let blocks = vec![
            Block::genesis(100, "1".into(), vec![]),
            Block::seal(2, "h".into(), 1, 0, vec![tx_with("alice", b"a"), tx_with("bob", b"b")]),
        ];
        let index = FingerprintIndex::rebuild(&blocks);
        assert_eq!(index.sealed_len(), 2);
        assert_eq!(index.check(&fingerprint_bytes(b"b")).first_seen.unwrap().actor, "bob");
    }

    #[test]
    fn test_input_resolution() {
        let digest = fingerprint_bytes(b"vote");
        assert_eq!(FingerprintInput::Bytes(b"vote").resolve().unwrap(), digest);
        assert_eq!(
            FingerprintInput::Hex(&digest.to_uppercase()).resolve().unwrap(),
            digest
        );
        assert!(FingerprintInput::Hex("zz").resolve().is_err());
    }
}
