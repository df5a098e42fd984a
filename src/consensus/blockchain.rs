use crate::config::LedgerConfig;
use crate::consensus::chain::{BlockStore, ChainError, SealError};
use crate::consensus::fingerprint::{FingerprintCheck, FingerprintIndex, FingerprintInput};
use crate::consensus::mempool::PendingBuffer;
use crate::consensus::pow::{PowError, ProofOfWork};
use crate::consensus::validator::{ChainValidator, IntegrityFinding, ValidationReport};
use crate::core::block::Block;
use crate::core::transaction::{Transaction, TransactionRequest, ValidationError};
use crate::metrics;
use crate::storage::{BlockPersistence, LedgerStorage, StorageError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Setup error: {0}")]
    Setup(#[from] ChainError),
    #[error("Resource exhausted: no proof found in {iterations} iterations")]
    ResourceExhausted { iterations: u64 },
    #[error("Proof-of-work error: {0}")]
    Pow(PowError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LedgerError {
    /// The submission itself was refused, as opposed to the ledger failing
    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::Validation(_))
    }
}

impl From<PowError> for LedgerError {
    fn from(err: PowError) -> Self {
        match err {
            PowError::Exhausted { iterations } => LedgerError::ResourceExhausted { iterations },
            other => LedgerError::Pow(other),
        }
    }
}

impl From<SealError> for LedgerError {
    fn from(err: SealError) -> Self {
        match err {
            SealError::Chain(e) => e.into(),
            SealError::Pow(e) => e.into(),
        }
    }
}

/// Outcome of a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Block the record is expected to land in. A prediction, not a fact.
    pub predicted_index: u64,
    pub flagged: bool,
    pub flag_reason: Option<String>,
}

/// Everything guarded by the single writer lock
struct LedgerState {
    store: BlockStore,
    pending: PendingBuffer,
    fingerprints: FingerprintIndex,
}

/// Hash-linked record ledger.
///
/// Submitting and sealing are one critical section over the buffer, the
/// block store and the fingerprint index: both hold the write lock for their
/// whole duration, proof search included. Reads share the lock.
pub struct Ledger {
    state: RwLock<LedgerState>,
    storage: Option<Arc<dyn BlockPersistence>>,
    config: LedgerConfig,
}

impl Ledger {
    /// Create an in-memory ledger with its genesis block
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate().map_err(LedgerError::Config)?;
        let state = Self::genesis_state(&config);
        Ok(Self {
            state: RwLock::new(state),
            storage: None,
            config,
        })
    }

    /// Create or load a persisted ledger
    pub fn open(
        config: LedgerConfig,
        storage: Arc<dyn BlockPersistence>,
    ) -> Result<Self, LedgerError> {
        config.validate().map_err(LedgerError::Config)?;
        let chain = storage.load_chain()?;

        let state = if chain.is_empty() {
            tracing::info!("Creating new ledger with genesis block");
            let state = Self::genesis_state(&config);
            storage.append_block(state.store.last_block()?)?;
            state
        } else {
            tracing::info!("Loaded existing ledger with {} blocks", chain.len());
            let report = ChainValidator::validate(&chain);
            if !report.valid {
                tracing::warn!(
                    "Stored chain fails validation at block {:?}; loading it for inspection",
                    report.first_invalid_index
                );
            }
            let fingerprints = FingerprintIndex::rebuild(&chain);
            LedgerState {
                store: BlockStore::from_blocks(chain)?,
                pending: PendingBuffer::new(),
                fingerprints,
            }
        };

        Ok(Self {
            state: RwLock::new(state),
            storage: Some(storage),
            config,
        })
    }

    /// Open storage when the config asks for persistence, else stay in memory
    pub fn from_config(config: LedgerConfig) -> Result<Self, LedgerError> {
        if config.storage.persist {
            let storage = Arc::new(LedgerStorage::open(&config.storage.db_path)?);
            Self::open(config, storage)
        } else {
            Self::new(config)
        }
    }

    fn genesis_state(config: &LedgerConfig) -> LedgerState {
        let store = BlockStore::construct(
            config.ledger.genesis_proof,
            config.ledger.genesis_previous_hash.clone(),
            Vec::new(),
        );
        LedgerState {
            store,
            pending: PendingBuffer::new(),
            fingerprints: FingerprintIndex::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validate and buffer a record, flagging duplicate content.
    ///
    /// A fingerprint already present in sealed history or in the buffer flags
    /// the new record; it is still accepted.
    pub fn submit_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<Submission, LedgerError> {
        let result = self.submit_locked(request);
        match &result {
            Ok(submission) => metrics::record_submission(true, submission.flagged),
            Err(e) if e.is_rejection() => metrics::record_submission(false, false),
            Err(_) => {}
        }
        result
    }

    fn submit_locked(&self, request: TransactionRequest) -> Result<Submission, LedgerError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut tx = Transaction::from_request(request, timestamp)?;

        let mut state = self.state.write();
        let last_index = state.store.last_block()?.index;

        let duplicate = tx
            .fingerprint
            .as_deref()
            .and_then(|fingerprint| state.fingerprints.check(fingerprint).flag_reason());
        if let Some(reason) = duplicate {
            tracing::warn!("Duplicate content submitted by {}: {}", tx.actor, reason);
            tx.flag(reason);
        }

        let fingerprint = tx.fingerprint.clone();
        let actor = tx.actor.clone();
        let flagged = tx.flagged;
        let flag_reason = tx.flag_reason.clone();

        let predicted_index = state.pending.submit(tx, last_index)?;
        if let Some(fingerprint) = fingerprint {
            state
                .fingerprints
                .record_pending(&fingerprint, predicted_index, &actor);
        }
        metrics::update_chain_metrics(state.store.height(), state.pending.len());

        tracing::info!("Transaction from {} buffered for block {}", actor, predicted_index);
        Ok(Submission {
            predicted_index,
            flagged,
            flag_reason,
        })
    }

    /// Seal the buffer into a new block using the configured difficulty
    pub fn seal(&self) -> Result<Block, LedgerError> {
        self.seal_block(self.config.ledger.difficulty)
    }

    /// Drain the buffer into a new block linked to the tip.
    ///
    /// Blocks the caller (and every other ledger operation) for the proof
    /// search. A persisted ledger writes the block before appending it; if
    /// that write fails the drained records go back to the buffer.
    pub fn seal_block(&self, difficulty: u32) -> Result<Block, LedgerError> {
        let pow = ProofOfWork::new(difficulty)?
            .with_max_iterations(self.config.ledger.max_pow_iterations);
        let start = Instant::now();

        let mut guard = self.state.write();
        let state = &mut *guard;
        let block = state.store.prepare(&pow, &mut state.pending)?;

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.append_block(&block) {
                tracing::warn!("Failed to persist block {}: {}", block.index, e);
                state.pending.restore(block.transactions);
                return Err(e.into());
            }
        }

        state.store.append(block.clone())?;
        state.fingerprints.commit(&block);

        let elapsed = start.elapsed().as_secs_f64();
        metrics::record_block_sealed(elapsed);
        metrics::update_chain_metrics(state.store.height(), state.pending.len());
        tracing::info!(
            "Block {} sealed: {} txs, proof {}, difficulty {}, {:.3}s",
            block.index,
            block.transactions.len(),
            block.proof,
            difficulty,
            elapsed
        );
        Ok(block)
    }

    /// Digest of a block's fields; stable across restarts
    pub fn compute_hash(block: &Block) -> String {
        block.compute_hash()
    }

    /// Replay the chain and report the first integrity failure, if any
    pub fn validate_chain(&self) -> ValidationReport {
        let state = self.state.read();
        let report = ChainValidator::validate(state.store.all_blocks());
        metrics::record_validation(report.valid);
        report
    }

    /// Every integrity failure, earliest first
    pub fn audit_chain(&self) -> Vec<IntegrityFinding> {
        ChainValidator::audit(self.state.read().store.all_blocks())
    }

    /// Advisory lookup: has this content been recorded before?
    pub fn check_fingerprint(
        &self,
        input: FingerprintInput<'_>,
    ) -> Result<FingerprintCheck, LedgerError> {
        let fingerprint = input.resolve()?;
        Ok(self.state.read().fingerprints.check(&fingerprint))
    }

    /// Read-only snapshot of the chain, genesis first
    pub fn export_chain(&self) -> Vec<Block> {
        self.state.read().store.all_blocks().to_vec()
    }

    pub fn last_block(&self) -> Result<Block, LedgerError> {
        Ok(self.state.read().store.last_block()?.clone())
    }

    pub fn get_block(&self, index: u64) -> Option<Block> {
        self.state.read().store.get(index).cloned()
    }

    /// Records not yet sealed, in submission order
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.read().pending.transactions().to_vec()
    }

    /// Blocks holding at least one record from `actor` (per-issuer view)
    pub fn blocks_for_actor(&self, actor: &str) -> Vec<Block> {
        self.state
            .read()
            .store
            .all_blocks()
            .iter()
            .filter(|block| block.transactions.iter().any(|tx| tx.actor == actor))
            .cloned()
            .collect()
    }

    /// Most recent sealed record carrying this fingerprint, with its block index
    pub fn find_by_fingerprint(
        &self,
        input: FingerprintInput<'_>,
    ) -> Result<Option<(u64, Transaction)>, LedgerError> {
        let fingerprint = input.resolve()?;
        let state = self.state.read();
        let found = state.store.all_blocks().iter().rev().find_map(|block| {
            block
                .transactions
                .iter()
                .rev()
                .find(|tx| tx.fingerprint.as_deref() == Some(fingerprint.as_str()))
                .map(|tx| (block.index, tx.clone()))
        });
        Ok(found)
    }

    /// Get ledger statistics
    pub fn stats(&self) -> LedgerStats {
        let state = self.state.read();
        let blocks = state.store.all_blocks();
        let all_txs = || blocks.iter().flat_map(|block| &block.transactions);

        LedgerStats {
            chain_length: blocks.len(),
            total_transactions: all_txs().count(),
            flagged_transactions: all_txs().filter(|tx| tx.flagged).count(),
            pending_transactions: state.pending.len(),
            distinct_fingerprints: state.fingerprints.sealed_len(),
            difficulty: self.config.ledger.difficulty,
            last_hash: blocks.last().map(|block| block.hash.clone()),
            persisted: self.storage.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub chain_length: usize,
    pub total_transactions: usize,
    pub flagged_transactions: usize,
    pub pending_transactions: usize,
    pub distinct_fingerprints: usize,
    pub difficulty: u32,
    pub last_hash: Option<String>,
    pub persisted: bool,
}
