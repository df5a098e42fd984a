use crate::core::transaction::{Transaction, ValidationError};

/// Records awaiting the next seal, in submission order
#[derive(Clone, Debug, Default)]
pub struct PendingBuffer {
    transactions: Vec<Transaction>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction and predict the block it will land in.
    ///
    /// The prediction is `last_sealed_index + 1`; it only becomes a fact once
    /// that block is sealed.
    pub fn submit(
        &mut self,
        tx: Transaction,
        last_sealed_index: u64,
    ) -> Result<u64, ValidationError> {
        if tx.actor.trim().is_empty() {
            return Err(ValidationError::MissingField("actor"));
        }
        if tx.action.trim().is_empty() {
            return Err(ValidationError::MissingField("action"));
        }
        self.transactions.push(tx);
        Ok(last_sealed_index + 1)
    }

    /// Take every pending transaction, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Put a drained batch back ahead of anything submitted since
    pub fn restore(&mut self, mut batch: Vec<Transaction>) {
        batch.append(&mut self.transactions);
        self.transactions = batch;
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TransactionRequest;

    fn tx(actor: &str, action: &str) -> Transaction {
        Transaction {
            actor: actor.to_string(),
            action: action.to_string(),
            payload: Default::default(),
            fingerprint: None,
            flagged: false,
            flag_reason: None,
            timestamp: 123456789,
        }
    }

    #[test]
    fn test_buffer_operations() {
        let mut buffer = PendingBuffer::new();

        assert_eq!(buffer.submit(tx("s-1", "attendance"), 4).unwrap(), 5);
        assert_eq!(buffer.submit(tx("s-2", "attendance"), 4).unwrap(), 5);
        assert_eq!(buffer.len(), 2);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].actor, "s-1");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_missing_fields_not_buffered() {
        let mut buffer = PendingBuffer::new();
        assert_eq!(
            buffer.submit(tx("", "vote"), 1),
            Err(ValidationError::MissingField("actor"))
        );
        assert_eq!(
            buffer.submit(tx("0xabc", " "), 1),
            Err(ValidationError::MissingField("action"))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_restore_keeps_order() {
        let mut buffer = PendingBuffer::new();
        buffer.submit(tx("a", "register"), 1).unwrap();
        let batch = buffer.drain();
        buffer.submit(tx("b", "register"), 1).unwrap();

        buffer.restore(batch);
        let actors: Vec<_> = buffer.transactions().iter().map(|t| t.actor.as_str()).collect();
        assert_eq!(actors, vec!["a", "b"]);
    }

    #[test]
    fn test_request_path_matches_buffer_rules() {
        let req = TransactionRequest::new("alice", "transfer");
        let built = Transaction::from_request(req, 0).unwrap();
        let mut buffer = PendingBuffer::new();
        assert_eq!(buffer.submit(built, 1).unwrap(), 2);
    }
}
