pub mod blockchain;
pub mod chain;
pub mod fingerprint;
pub mod mempool;
pub mod pow;
pub mod validator;

pub use blockchain::{Ledger, LedgerError, LedgerStats, Submission};
pub use chain::{BlockStore, ChainError};
pub use fingerprint::{FingerprintCheck, FingerprintIndex, FingerprintInput, FingerprintReference};
pub use mempool::PendingBuffer;
pub use pow::{PowError, ProofOfWork};
pub use validator::{ChainValidator, FindingKind, IntegrityFinding, ValidationReport};
