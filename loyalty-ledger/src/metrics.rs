//! Metrics collection for observability
//!
//! Every ledger owns its own Prometheus registry so isolated instances can
//! coexist in one process.
//!
//! # Metrics
//!
//! - `loyalty_transactions_created_total{type}` - Pending records written
//! - `loyalty_transactions_completed_total{type}` - Settled records
//! - `loyalty_transactions_failed_total{type}` - Records marked failed
//! - `loyalty_redemptions_rejected_total` - Redemptions refused for balance
//! - `loyalty_settlement_duration_seconds` - Gateway transfer latency
//! - `loyalty_tokens_minted_total` - Supply added through minting

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};
use std::sync::Arc;

use crate::types::TransactionType;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Pending records written, by type
    pub transactions_created: IntCounterVec,

    /// Settled records, by type
    pub transactions_completed: IntCounterVec,

    /// Failed records, by type
    pub transactions_failed: IntCounterVec,

    /// Redemptions refused with insufficient balance
    pub redemptions_rejected: IntCounter,

    /// Gateway transfer latency
    pub settlement_duration: Histogram,

    /// Supply added through minting
    pub tokens_minted: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_created = IntCounterVec::new(
            Opts::new(
                "loyalty_transactions_created_total",
                "Pending transactions written",
            ),
            &["type"],
        )?;
        registry.register(Box::new(transactions_created.clone()))?;

        let transactions_completed = IntCounterVec::new(
            Opts::new(
                "loyalty_transactions_completed_total",
                "Transactions settled successfully",
            ),
            &["type"],
        )?;
        registry.register(Box::new(transactions_completed.clone()))?;

        let transactions_failed = IntCounterVec::new(
            Opts::new(
                "loyalty_transactions_failed_total",
                "Transactions marked failed",
            ),
            &["type"],
        )?;
        registry.register(Box::new(transactions_failed.clone()))?;

        let redemptions_rejected = IntCounter::new(
            "loyalty_redemptions_rejected_total",
            "Redemptions refused for insufficient balance",
        )?;
        registry.register(Box::new(redemptions_rejected.clone()))?;

        let settlement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "loyalty_settlement_duration_seconds",
                "Settlement gateway transfer latency",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(settlement_duration.clone()))?;

        let tokens_minted = IntCounter::new(
            "loyalty_tokens_minted_total",
            "Declared supply added through minting",
        )?;
        registry.register(Box::new(tokens_minted.clone()))?;

        Ok(Self {
            transactions_created,
            transactions_completed,
            transactions_failed,
            redemptions_rejected,
            settlement_duration,
            tokens_minted,
            registry,
        })
    }

    /// Record a pending transaction
    pub fn record_created(&self, tx_type: TransactionType) {
        self.transactions_created
            .with_label_values(&[tx_type.as_str()])
            .inc();
    }

    /// Record a completed transaction
    pub fn record_completed(&self, tx_type: TransactionType) {
        self.transactions_completed
            .with_label_values(&[tx_type.as_str()])
            .inc();
    }

    /// Record a failed transaction
    pub fn record_failed(&self, tx_type: TransactionType) {
        self.transactions_failed
            .with_label_values(&[tx_type.as_str()])
            .inc();
    }

    /// Record an insufficient-balance rejection
    pub fn record_redemption_rejected(&self) {
        self.redemptions_rejected.inc();
    }

    /// Record gateway latency
    pub fn record_settlement_duration(&self, duration_seconds: f64) {
        self.settlement_duration.observe(duration_seconds);
    }

    /// Record minted supply
    pub fn record_minted(&self, amount: u64) {
        self.tokens_minted.inc_by(amount);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.redemptions_rejected.get(), 0);
        assert_eq!(metrics.tokens_minted.get(), 0);
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_redemption_rejected();
        assert_eq!(a.redemptions_rejected.get(), 1);
        assert_eq!(b.redemptions_rejected.get(), 0);
    }

    #[test]
    fn test_labelled_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_created(TransactionType::Earn);
        metrics.record_created(TransactionType::Earn);
        metrics.record_failed(TransactionType::Redeem);

        assert_eq!(
            metrics
                .transactions_created
                .with_label_values(&["earn"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .transactions_failed
                .with_label_values(&["redeem"])
                .get(),
            1
        );
    }

    #[test]
    fn test_record_minted() {
        let metrics = Metrics::new().unwrap();
        metrics.record_minted(500);
        assert_eq!(metrics.tokens_minted.get(), 500);
        assert!(!metrics.registry().gather().is_empty());
    }
}
