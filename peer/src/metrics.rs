//! Prometheus metrics for the replication layer.
//!
//! The [`MetricsRegistry`] owns a Prometheus registry and a set of
//! strongly-typed peer metrics. The text exposition is served by the
//! peer's own router under `GET /metrics`.

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Replication-related Prometheus metrics.
#[derive(Clone)]
pub struct PeerMetrics {
    /// Blocks accepted from peers or local closures.
    pub blocks_ingressed_total: IntCounter,
    /// Tip closures applied successfully.
    pub blocks_closed_total: IntCounter,
    /// Closure tuples rejected (stale tip, bad key, bad signature).
    pub closures_rejected_total: IntCounter,
    /// Messages pooled into the open tip.
    pub messages_pooled_total: IntCounter,
    /// Current chain length of this replica.
    pub chain_height: IntGauge,
}

impl PeerMetrics {
    /// Registers the peer metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_ingressed_total = IntCounter::with_opts(Opts::new(
            "blocks_ingressed_total",
            "Total number of blocks accepted into the replica",
        ))?;
        registry.register(Box::new(blocks_ingressed_total.clone()))?;

        let blocks_closed_total = IntCounter::with_opts(Opts::new(
            "blocks_closed_total",
            "Total number of tip closures applied",
        ))?;
        registry.register(Box::new(blocks_closed_total.clone()))?;

        let closures_rejected_total = IntCounter::with_opts(Opts::new(
            "closures_rejected_total",
            "Total number of closure tuples rejected",
        ))?;
        registry.register(Box::new(closures_rejected_total.clone()))?;

        let messages_pooled_total = IntCounter::with_opts(Opts::new(
            "messages_pooled_total",
            "Total number of messages pooled into the open tip",
        ))?;
        registry.register(Box::new(messages_pooled_total.clone()))?;

        let chain_height = IntGauge::with_opts(Opts::new(
            "chain_height",
            "Current number of blocks in the replica, open tip included",
        ))?;
        registry.register(Box::new(chain_height.clone()))?;

        Ok(Self {
            blocks_ingressed_total,
            blocks_closed_total,
            closures_rejected_total,
            messages_pooled_total,
            chain_height,
        })
    }
}

/// Wrapper around a Prometheus registry and the peer metrics.
///
/// Wrap it in an [`std::sync::Arc`] and share it between the endpoint and
/// any background tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub peer: PeerMetrics,
}

impl MetricsRegistry {
    /// Creates a registry with the peer metrics registered under the
    /// `peer` namespace.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("peer".to_string()), None)?;
        let peer = PeerMetrics::register(&registry)?;
        Ok(Self { registry, peer })
    }

    /// Encodes all metrics into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
