//! Prometheus metrics for the Ironic database operator
//!
//! # Exported metrics
//! - `ironic_database_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `ironic_database_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `ironic_database_available` (gauge): 1 when the database is available, labeled by namespace/name.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64};

use axum::{http::header, response::IntoResponse, routing::get, Router};
use once_cell::sync::Lazy;
use prometheus_client::encoding::{text::encode, EncodeLabelSet};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use tracing::info;

use crate::error::{Error, Result};

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "ironicdatabase"
    pub controller: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Error kind/category, e.g. "kube", "validation", "deployment"
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DatabaseLabels {
    pub namespace: String,
    pub name: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Gauge tracking database availability
pub static DATABASE_AVAILABLE: Lazy<Family<DatabaseLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "ironic_database_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "ironic_database_reconcile_errors_total",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "ironic_database_available",
        "Whether the database is available (1) or progressing (0)",
        DATABASE_AVAILABLE.clone(),
    );
    registry
});

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    let labels = ReconcileLabels {
        controller: controller.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(controller: &str, kind: &str) {
    let labels = ErrorLabels {
        controller: controller.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

pub fn set_database_available(namespace: &str, name: &str, available: bool) {
    let labels = DatabaseLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    DATABASE_AVAILABLE
        .get_or_create(&labels)
        .set(i64::from(available));
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<String> {
    let mut buffer = String::new();
    encode(&mut buffer, &REGISTRY)
        .map_err(|e| Error::ConfigError(format!("failed to encode metrics: {e}")))?;
    Ok(buffer)
}

async fn metrics_handler() -> impl IntoResponse {
    match render() {
        Ok(body) => (
            axum::http::StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
}

/// Serve `/metrics` and `/healthz` until the process exits
pub async fn serve_metrics(addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("failed to bind metrics address {addr}: {e}")))?;

    info!("Serving metrics on {}", addr);
    axum::serve(listener, metrics_router())
        .await
        .map_err(|e| Error::ConfigError(format!("metrics server error: {e}")))
}
