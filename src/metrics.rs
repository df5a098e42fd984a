use prometheus::{
    Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Chain metrics
    pub static ref CHAIN_HEIGHT: Gauge = Gauge::with_opts(
        Opts::new("sealchain_chain_height", "Number of sealed blocks")
    ).unwrap();

    pub static ref PENDING_SIZE: Gauge = Gauge::with_opts(
        Opts::new("sealchain_pending_transactions", "Transactions waiting for the next seal")
    ).unwrap();

    pub static ref BLOCKS_SEALED: Counter = Counter::with_opts(
        Opts::new("sealchain_blocks_sealed_total", "Total blocks sealed")
    ).unwrap();

    pub static ref SEAL_TIME: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "sealchain_seal_time_seconds",
            "Time to seal a block, proof search included"
        )
    ).unwrap();

    // Transaction metrics
    pub static ref TRANSACTIONS_SUBMITTED: Counter = Counter::with_opts(
        Opts::new("sealchain_transactions_submitted_total", "Transactions accepted into the buffer")
    ).unwrap();

    pub static ref TRANSACTIONS_REJECTED: Counter = Counter::with_opts(
        Opts::new("sealchain_transactions_rejected_total", "Submissions failing validation")
    ).unwrap();

    pub static ref DUPLICATES_FLAGGED: Counter = Counter::with_opts(
        Opts::new("sealchain_duplicates_flagged_total", "Submissions flagged as duplicate content")
    ).unwrap();

    // Integrity metrics
    pub static ref INTEGRITY_FAILURES: Counter = Counter::with_opts(
        Opts::new("sealchain_integrity_failures_total", "Validations that found a tampered chain")
    ).unwrap();
}

pub fn register_metrics() {
    REGISTRY.register(Box::new(CHAIN_HEIGHT.clone())).ok();
    REGISTRY.register(Box::new(PENDING_SIZE.clone())).ok();
    REGISTRY.register(Box::new(BLOCKS_SEALED.clone())).ok();
    REGISTRY.register(Box::new(SEAL_TIME.clone())).ok();
    REGISTRY.register(Box::new(TRANSACTIONS_SUBMITTED.clone())).ok();
    REGISTRY.register(Box::new(TRANSACTIONS_REJECTED.clone())).ok();
    REGISTRY.register(Box::new(DUPLICATES_FLAGGED.clone())).ok();
    REGISTRY.register(Box::new(INTEGRITY_FAILURES.clone())).ok();
}

/// Export metrics in Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Record a submission outcome
pub fn record_submission(accepted: bool, flagged: bool) {
    if !accepted {
        TRANSACTIONS_REJECTED.inc();
        return;
    }
    TRANSACTIONS_SUBMITTED.inc();
    if flagged {
        DUPLICATES_FLAGGED.inc();
    }
}

/// Record block sealed
pub fn record_block_sealed(seal_time_secs: f64) {
    BLOCKS_SEALED.inc();
    SEAL_TIME.observe(seal_time_secs);
}

pub fn update_chain_metrics(height: u64, pending: usize) {
    CHAIN_HEIGHT.set(height as f64);
    PENDING_SIZE.set(pending as f64);
}

pub fn record_validation(valid: bool) {
    if !valid {
        INTEGRITY_FAILURES.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_exposes_registered_metrics() {
        register_metrics();
        record_block_sealed(0.01);
        update_chain_metrics(3, 1);
        let text = render().unwrap();
        assert!(text.contains("sealchain_blocks_sealed_total"));
        assert!(text.contains("sealchain_chain_height"));
    }
}
