pub mod db;

pub use db::{BlockPersistence, LedgerStorage, StorageError};
