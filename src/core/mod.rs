pub mod block;
pub mod transaction;

pub use block::{Block, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
pub use transaction::{Payload, Transaction, TransactionRequest, ValidationError};
