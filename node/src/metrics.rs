//! # Prometheus Metrics
//!
//! Exposes operational metrics for the custody node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total deposits accepted into vault custody.
    pub deposits_total: IntCounter,
    /// Total withdrawals released from vault custody.
    pub withdrawals_total: IntCounter,
    /// Total withdrawal attempts rejected (any gate).
    pub withdrawals_rejected_total: IntCounter,
    /// Total stake locks opened.
    pub stakes_opened_total: IntCounter,
    /// Total matured stakes paid out.
    pub stakes_released_total: IntCounter,
    /// Stake slots currently holding a lock.
    pub active_stakes: IntGauge,
    /// Total checkpoints written to disk.
    pub checkpoints_written_total: IntCounter,
    /// Histogram of released withdrawal amounts in smallest units.
    pub withdrawal_amount: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("haven".into()), None)
            .expect("failed to create prometheus registry");

        let deposits_total = IntCounter::new(
            "deposits_total",
            "Total deposits accepted into vault custody",
        )
        .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total = IntCounter::new(
            "withdrawals_total",
            "Total withdrawals released from vault custody",
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let withdrawals_rejected_total = IntCounter::new(
            "withdrawals_rejected_total",
            "Total withdrawal attempts rejected by any precondition",
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawals_rejected_total.clone()))
            .expect("metric registration");

        let stakes_opened_total =
            IntCounter::new("stakes_opened_total", "Total stake locks opened")
                .expect("metric creation");
        registry
            .register(Box::new(stakes_opened_total.clone()))
            .expect("metric registration");

        let stakes_released_total =
            IntCounter::new("stakes_released_total", "Total matured stakes paid out")
                .expect("metric creation");
        registry
            .register(Box::new(stakes_released_total.clone()))
            .expect("metric registration");

        let active_stakes =
            IntGauge::new("active_stakes", "Stake slots currently holding a lock")
                .expect("metric creation");
        registry
            .register(Box::new(active_stakes.clone()))
            .expect("metric registration");

        let checkpoints_written_total = IntCounter::new(
            "checkpoints_written_total",
            "Total ledger checkpoints written to disk",
        )
        .expect("metric creation");
        registry
            .register(Box::new(checkpoints_written_total.clone()))
            .expect("metric registration");

        let withdrawal_amount = Histogram::with_opts(
            HistogramOpts::new(
                "withdrawal_amount",
                "Released withdrawal amounts in smallest units",
            )
            .buckets(vec![
                1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawal_amount.clone()))
            .expect("metric registration");

        Self {
            registry,
            deposits_total,
            withdrawals_total,
            withdrawals_rejected_total,
            stakes_opened_total,
            stakes_released_total,
            active_stakes,
            checkpoints_written_total,
            withdrawal_amount,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
