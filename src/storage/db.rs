use sled::Db;
use crate::core::block::Block;
use crate::crypto::canonical_json;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Block not found: {0}")]
    BlockNotFound(u64),
    #[error("Corrupt chain height record")]
    CorruptHeight,
}

/// Persistent storage for sealed blocks.
///
/// Blocks are written with the same canonical JSON the hash engine uses, so
/// reloading reproduces identical digests.
pub struct LedgerStorage {
    db: Db,
}

impl LedgerStorage {
    /// Open or create the ledger database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        tracing::info!("Ledger database opened");
        Ok(Self { db })
    }

    fn block_key(index: u64) -> String {
        format!("block:{:020}", index)
    }

    /// Save a block to disk
    pub fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        let value = canonical_json(block)?;
        self.db.insert(Self::block_key(block.index).as_bytes(), value)?;
        self.db.flush()?;
        tracing::debug!("Block {} saved to database", block.index);
        Ok(())
    }

    /// Load a block from disk
    pub fn load_block(&self, index: u64) -> Result<Block, StorageError> {
        let value = self
            .db
            .get(Self::block_key(index).as_bytes())?
            .ok_or(StorageError::BlockNotFound(index))?;
        let block: Block = serde_json::from_slice(&value)?;
        Ok(block)
    }

    /// Number of stored blocks
    pub fn chain_height(&self) -> Result<u64, StorageError> {
        match self.db.get(b"chain_height")? {
            Some(value) => {
                let height_bytes: [u8; 8] = value
                    .as_ref()
                    .try_into()
                    .map_err(|_| StorageError::CorruptHeight)?;
                Ok(u64::from_be_bytes(height_bytes))
            }
            None => Ok(0),
        }
    }

    pub fn set_chain_height(&self, height: u64) -> Result<(), StorageError> {
        self.db.insert(b"chain_height", &height.to_be_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// Save a block and advance the height in one step
    pub fn append_block(&self, block: &Block) -> Result<(), StorageError> {
        self.save_block(block)?;
        self.set_chain_height(block.index)
    }

    /// Load the stored chain, genesis first.
    ///
    /// A missing block is an error rather than a silent truncation: dropping
    /// the tail would hide history from the validator.
    pub fn load_chain(&self) -> Result<Vec<Block>, StorageError> {
        let height = self.chain_height()?;
        let chain = (1..=height)
            .map(|index| self.load_block(index))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!("Loaded {} blocks from database", chain.len());
        Ok(chain)
    }
}

/// Where sealed blocks are written and read back on startup
pub trait BlockPersistence: Send + Sync {
    fn load_chain(&self) -> Result<Vec<Block>, StorageError>;
    fn append_block(&self, block: &Block) -> Result<(), StorageError>;
}

impl BlockPersistence for LedgerStorage {
    fn load_chain(&self) -> Result<Vec<Block>, StorageError> {
        LedgerStorage::load_chain(self)
    }

    fn append_block(&self, block: &Block) -> Result<(), StorageError> {
        LedgerStorage::append_block(self, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{Transaction, TransactionRequest};
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_preserves_hash() {
        let dir = TempDir::new().unwrap();
        let storage = LedgerStorage::open(dir.path()).unwrap();

        let req = TransactionRequest::new("alice", "transfer")
            .with_field("land_id", "L1")
            .with_field("location", "Plot 7");
        let tx = Transaction::from_request(req, 42).unwrap();
        let genesis = Block::genesis(100, "1".into(), vec![]);
        let block = Block::seal(2, genesis.compute_hash(), 17, 0, vec![tx]);

        storage.append_block(&genesis).unwrap();
        storage.append_block(&block).unwrap();

        assert_eq!(storage.chain_height().unwrap(), 2);
        let chain = storage.load_chain().unwrap();
        assert_eq!(chain, vec![genesis, block.clone()]);
        assert_eq!(chain[1].compute_hash(), block.hash);
    }

    #[test]
    fn test_missing_block_is_error() {
        let dir = TempDir::new().unwrap();
        let storage = LedgerStorage::open(dir.path()).unwrap();
        storage.set_chain_height(3).unwrap();
        assert!(matches!(storage.load_chain(), Err(StorageError::BlockNotFound(1))));
    }
}
