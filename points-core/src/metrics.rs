//! Metrics collection for observability
//!
//! Prometheus metrics for the points core. Every collector is registered on the `Metrics`
//! instance's own registry, so several cores (and tests) can live in one process.
//!
//! # Metrics
//!
//! - `points_redemptions_total{outcome}` - Redemption attempts by outcome
//! - `points_compensations_total` - Rollbacks issued for unfinished redemptions
//! - `points_compensation_failures_total` - Rollbacks that failed and need reconciliation
//! - `points_credited_total` - Points added to balances
//! - `points_debited_total` - Points removed from balances
//! - `points_redemption_duration_seconds` - Histogram of redemption latencies

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Redemption attempts by outcome
    pub redemptions_total: IntCounterVec,

    /// Compensations issued
    pub compensations_total: IntCounter,

    /// Compensations that failed
    pub compensation_failures_total: IntCounter,

    /// Points credited
    pub credited_total: IntCounter,

    /// Points debited
    pub debited_total: IntCounter,

    /// Redemption duration histogram
    pub redemption_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let redemptions_total = IntCounterVec::new(
            Opts::new("points_redemptions_total", "Redemption attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(redemptions_total.clone()))?;

        let compensations_total = IntCounter::new(
            "points_compensations_total",
            "Rollbacks issued for unfinished redemptions",
        )?;
        registry.register(Box::new(compensations_total.clone()))?;

        let compensation_failures_total = IntCounter::new(
            "points_compensation_failures_total",
            "Rollbacks that failed and need manual reconciliation",
        )?;
        registry.register(Box::new(compensation_failures_total.clone()))?;

        let credited_total =
            IntCounter::new("points_credited_total", "Points added to balances")?;
        registry.register(Box::new(credited_total.clone()))?;

        let debited_total =
            IntCounter::new("points_debited_total", "Points removed from balances")?;
        registry.register(Box::new(debited_total.clone()))?;

        let redemption_duration = Histogram::with_opts(
            HistogramOpts::new(
                "points_redemption_duration_seconds",
                "Histogram of redemption latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(redemption_duration.clone()))?;

        Ok(Self {
            redemptions_total,
            compensations_total,
            compensation_failures_total,
            credited_total,
            debited_total,
            redemption_duration,
            registry,
        })
    }

    /// Record a finished redemption attempt
    pub fn record_redemption(&self, outcome: &str, duration_seconds: f64) {
        self.redemptions_total.with_label_values(&[outcome]).inc();
        self.redemption_duration.observe(duration_seconds);
    }

    /// Record a compensation and whether it succeeded
    pub fn record_compensation(&self, succeeded: bool) {
        self.compensations_total.inc();
        if !succeeded {
            self.compensation_failures_total.inc();
        }
    }

    /// Record a signed balance movement
    pub fn record_movement(&self, amount: i64) {
        if amount >= 0 {
            self.credited_total.inc_by(amount.unsigned_abs());
        } else {
            self.debited_total.inc_by(amount.unsigned_abs());
        }
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every collector
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
