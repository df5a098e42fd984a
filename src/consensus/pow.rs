//! Proof-of-work admission gate.
//!
//! A block's proof must satisfy: SHA-256 of the decimal string of
//! `proof² - previous_proof²` starts with `difficulty` '0' hex characters.
//!
//! This is an artificial cost function and NOT a security boundary. The
//! derivation ignores block contents, so any valid proof can be precomputed
//! and reused by a forger. Integrity of history comes from the hash links,
//! not from this gate.

use std::time::Instant;
use thiserror::Error;

use crate::crypto::sha256_hex;

/// Hex characters in a SHA-256 digest; anything above is unsatisfiable
pub const MAX_DIFFICULTY: u32 = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowError {
    #[error("Proof search exhausted after {iterations} iterations")]
    Exhausted { iterations: u64 },
    #[error("Difficulty {0} exceeds maximum of 64")]
    DifficultyTooHigh(u32),
}

/// Deterministic input to the predicate: `proof² - previous_proof²`.
/// Returns `None` when the arithmetic leaves i128 range.
pub fn derive(proof: u64, previous_proof: u64) -> Option<i128> {
    let p = (proof as i128).checked_mul(proof as i128)?;
    let q = (previous_proof as i128).checked_mul(previous_proof as i128)?;
    p.checked_sub(q)
}

/// Digest of the derived value has at least `difficulty` leading zeros
pub fn predicate(derived: i128, difficulty: u32) -> bool {
    let target = "0".repeat(difficulty as usize);
    sha256_hex(derived.to_string().as_bytes()).starts_with(&target)
}

/// Proof search configured with a difficulty and an optional iteration cap
#[derive(Clone, Debug)]
pub struct ProofOfWork {
    difficulty: u32,
    max_iterations: Option<u64>,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<Self, PowError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(PowError::DifficultyTooHigh(difficulty));
        }
        Ok(Self {
            difficulty,
            max_iterations: None,
        })
    }

    /// Bound the search. Hitting the bound is an error, never a fake proof.
    pub fn with_max_iterations(mut self, max_iterations: Option<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Search proofs 1, 2, 3, ... and return the first admitted one
    pub fn find_proof(&self, previous_proof: u64) -> Result<u64, PowError> {
        let start = Instant::now();
        let mut proof: u64 = 1;
        let mut iterations: u64 = 0;

        loop {
            if let Some(cap) = self.max_iterations {
                if iterations >= cap {
                    tracing::warn!(
                        "Proof search gave up after {} iterations (difficulty {})",
                        iterations,
                        self.difficulty
                    );
                    return Err(PowError::Exhausted { iterations });
                }
            }
            iterations += 1;

            if verify(proof, previous_proof, self.difficulty) {
                tracing::debug!(
                    "Proof found: {} after {} iterations in {:.3}s (difficulty {})",
                    proof,
                    iterations,
                    start.elapsed().as_secs_f64(),
                    self.difficulty
                );
                return Ok(proof);
            }

            if iterations % 100_000 == 0 {
                tracing::debug!("Proof search: {}k candidates tried", iterations / 1000);
            }

            proof = proof
                .checked_add(1)
                .ok_or(PowError::Exhausted { iterations })?;
        }
    }
}

/// Recompute the predicate for a stored proof without searching
pub fn verify(proof: u64, previous_proof: u64, difficulty: u32) -> bool {
    match derive(proof, previous_proof) {
        Some(derived) => predicate(derived, difficulty),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_squared_difference() {
        assert_eq!(derive(1, 100), Some(1 - 10_000));
        assert_eq!(derive(5, 3), Some(16));
        assert_eq!(derive(u64::MAX, 0), None);
    }

    #[test]
    fn test_zero_difficulty_accepts_first_candidate() {
        let pow = ProofOfWork::new(0).unwrap();
        assert_eq!(pow.find_proof(100).unwrap(), 1);
    }

    #[test]
    fn test_found_proof_verifies() {
        let pow = ProofOfWork::new(2).unwrap();
        let proof = pow.find_proof(100).unwrap();
        assert!(verify(proof, 100, 2));
        let digest = sha256_hex(derive(proof, 100).unwrap().to_string().as_bytes());
        assert!(digest.starts_with("00"));
    }

    #[test]
    fn test_found_proof_is_first_admitted() {
        let pow = ProofOfWork::new(2).unwrap();
        let proof = pow.find_proof(35).unwrap();
        assert!((1..proof).all(|candidate| !verify(candidate, 35, 2)));
    }

    #[test]
    fn test_iteration_cap_reports_exhaustion() {
        let pow = ProofOfWork::new(MAX_DIFFICULTY)
            .unwrap()
            .with_max_iterations(Some(3));
        assert_eq!(pow.find_proof(100), Err(PowError::Exhausted { iterations: 3 }));
    }

    #[test]
    fn test_unsatisfiable_difficulty_rejected() {
        assert_eq!(
            ProofOfWork::new(65).unwrap_err(),
            PowError::DifficultyTooHigh(65)
        );
    }
}
