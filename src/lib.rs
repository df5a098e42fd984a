// Library exports for SEALCHAIN
pub mod core;
pub mod consensus;
pub mod crypto;
pub mod storage;
pub mod config;
pub mod metrics;


pub use crate::core::{Block, Transaction, TransactionRequest, ValidationError};
pub use config::LedgerConfig;
pub use consensus::{
    ChainValidator, FingerprintCheck, FingerprintInput, Ledger, LedgerError, Submission,
    ValidationReport,
};
pub use storage::LedgerStorage;
