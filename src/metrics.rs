//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the ledger:
//!
//! - `ledger_submissions_total` - Transactions submitted
//! - `ledger_committed_total` - Transactions committed
//! - `ledger_rejected_total` - Transactions rejected pre-commit
//! - `ledger_conflicts_total` - Transactions conflicted at commit
//! - `ledger_events_published_total` - Balance-change events published
//! - `ledger_commit_duration_seconds` - Histogram of submit-to-terminal latency

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Registers against its own registry rather than the process-global one,
/// so multiple ledgers can coexist in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Transactions submitted
    pub submissions_total: IntCounter,

    /// Transactions committed
    pub committed_total: IntCounter,

    /// Transactions rejected before commit
    pub rejected_total: IntCounter,

    /// Transactions conflicted at commit
    pub conflicts_total: IntCounter,

    /// Events published to the log
    pub events_published_total: IntCounter,

    /// Submit-to-terminal latency
    pub commit_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let submissions_total =
            IntCounter::new("ledger_submissions_total", "Transactions submitted")?;
        registry.register(Box::new(submissions_total.clone()))?;

        let committed_total = IntCounter::new("ledger_committed_total", "Transactions committed")?;
        registry.register(Box::new(committed_total.clone()))?;

        let rejected_total = IntCounter::new(
            "ledger_rejected_total",
            "Transactions rejected before commit",
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let conflicts_total = IntCounter::new(
            "ledger_conflicts_total",
            "Transactions conflicted at commit",
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let events_published_total = IntCounter::new(
            "ledger_events_published_total",
            "Balance-change events published",
        )?;
        registry.register(Box::new(events_published_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_commit_duration_seconds",
                "Histogram of submit-to-terminal latency",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            submissions_total,
            committed_total,
            rejected_total,
            conflicts_total,
            events_published_total,
            commit_duration,
            registry,
        })
    }

    /// Record a submission
    pub fn record_submission(&self) {
        self.submissions_total.inc();
    }

    /// Record a committed transaction and its published events
    pub fn record_committed(&self, event_count: usize) {
        self.committed_total.inc();
        self.events_published_total.inc_by(event_count as u64);
    }

    /// Record a pre-commit rejection
    pub fn record_rejected(&self) {
        self.rejected_total.inc();
    }

    /// Record a commit-time conflict
    pub fn record_conflicted(&self) {
        self.conflicts_total.inc();
    }

    /// Record submit-to-terminal latency
    pub fn record_duration(&self, seconds: f64) {
        self.commit_duration.observe(seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
