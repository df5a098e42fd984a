use thiserror::Error;

use crate::consensus::mempool::PendingBuffer;
use crate::consensus::pow::{PowError, ProofOfWork};
use crate::core::block::Block;
use crate::core::transaction::Transaction;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Chain has no genesis block")]
    NoGenesis,
    #[error("Block {actual} cannot follow block {tip}")]
    OutOfSequence { tip: u64, actual: u64 },
}

/// Ordered, append-only sequence of sealed blocks
#[derive(Clone, Debug)]
pub struct BlockStore {
    blocks: Vec<Block>,
}

impl BlockStore {
    /// Create the store with its genesis block, consuming `initial` as the
    /// genesis transactions (normally none).
    pub fn construct(
        genesis_proof: u64,
        genesis_previous_hash: String,
        initial: Vec<Transaction>,
    ) -> Self {
        let genesis = Block::genesis(genesis_proof, genesis_previous_hash, initial);
        tracing::info!("Genesis block created: {}", genesis.hash);
        Self { blocks: vec![genesis] }
    }

    /// Rehydrate from persisted blocks. Integrity is not checked here; run
    /// the validator over the result for that.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        if blocks.is_empty() {
            return Err(ChainError::NoGenesis);
        }
        Ok(Self { blocks })
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::NoGenesis)
    }

    /// Prepare the next block: hash-link to the tip, search a proof relative
    /// to the tip's proof, then drain the buffer into it. The buffer is left
    /// untouched when the search fails. The block is returned unappended.
    pub fn prepare(
        &self,
        pow: &ProofOfWork,
        pending: &mut PendingBuffer,
    ) -> Result<Block, SealError> {
        let last = self.last_block()?;
        let previous_hash = last.compute_hash();
        let proof = pow.find_proof(last.proof)?;
        Ok(Block::seal(
            last.index + 1,
            previous_hash,
            proof,
            pow.difficulty(),
            pending.drain(),
        ))
    }

    /// Prepare and append in one step
    pub fn seal(
        &mut self,
        pow: &ProofOfWork,
        pending: &mut PendingBuffer,
    ) -> Result<Block, SealError> {
        let block = self.prepare(pow, pending)?;
        self.append(block.clone())?;
        Ok(block)
    }

    /// Append a block prepared by [`BlockStore::prepare`]
    pub fn append(&mut self, block: Block) -> Result<(), ChainError> {
        let tip = self.last_block()?.index;
        if block.index != tip + 1 {
            return Err(ChainError::OutOfSequence {
                tip,
                actual: block.index,
            });
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn all_blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block by its 1-based index
    pub fn get(&self, index: u64) -> Option<&Block> {
        index
            .checked_sub(1)
            .and_then(|position| self.blocks.get(position as usize))
    }

    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }
}

/// Failure while preparing a block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Pow(#[from] PowError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
    use crate::core::transaction::TransactionRequest;

    fn store() -> BlockStore {
        BlockStore::construct(GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string(), vec![])
    }

    #[test]
    fn test_construct_creates_genesis() {
        let store = store();
        assert_eq!(store.height(), 1);
        let genesis = store.last_block().unwrap();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.previous_hash, "1");
        assert_eq!(genesis.proof, 100);
    }

    fn pending_with(actor: &str) -> PendingBuffer {
        let mut pending = PendingBuffer::new();
        let tx = Transaction::from_request(TransactionRequest::new(actor, "register"), 0).unwrap();
        pending.submit(tx, 1).unwrap();
        pending
    }

    #[test]
    fn test_prepare_links_to_tip() {
        let mut store = store();
        let pow = ProofOfWork::new(1).unwrap();
        let mut pending = pending_with("s-1");
        let block = store.prepare(&pow, &mut pending).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert!(pending.is_empty());
        assert_eq!(block.index, 2);
        assert_eq!(block.previous_hash, store.last_block().unwrap().compute_hash());
        assert!(crate::consensus::pow::verify(block.proof, 100, 1));

        // Preparing does not append
        assert_eq!(store.height(), 1);
        store.append(block).unwrap();
        assert_eq!(store.height(), 2);
        assert_eq!(store.get(2).unwrap().index, 2);
        assert!(store.get(0).is_none());
    }

    #[test]
    fn test_append_rejects_gap() {
        let mut store = store();
        let stray = Block::seal(5, "x".to_string(), 1, 0, vec![]);
        assert_eq!(
            store.append(stray),
            Err(ChainError::OutOfSequence { tip: 1, actual: 5 })
        );
    }

    #[test]
    fn test_empty_rehydration_is_setup_error() {
        assert_eq!(BlockStore::from_blocks(vec![]).unwrap_err(), ChainError::NoGenesis);
    }

    #[test]
    fn test_seal_appends() {
        let mut store = store();
        let pow = ProofOfWork::new(0).unwrap();
        let sealed = store.seal(&pow, &mut PendingBuffer::new()).unwrap();
        assert_eq!(store.last_block().unwrap(), &sealed);
        assert!(sealed.transactions.is_empty());
    }

    #[test]
    fn test_exhaustion_leaves_buffer_intact() {
        let mut store = store();
        let pow = ProofOfWork::new(64).unwrap().with_max_iterations(Some(2));
        let mut pending = pending_with("s-2");
        assert_eq!(
            store.seal(&pow, &mut pending).unwrap_err(),
            SealError::Pow(PowError::Exhausted { iterations: 2 })
        );
        assert_eq!(pending.len(), 1);
        assert_eq!(store.height(), 1);
    }
}
