//! OpenTelemetry initialization
//!
//! Spans from the reconcile loop are exported over OTLP when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use std::env;

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime,
    trace::{self, Sampler},
    Resource,
};
use tracing_subscriber::{registry::LookupSpan, Layer};

use crate::error::{Error, Result};

pub const SERVICE_NAME: &str = "ironic-database-operator";

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Endpoint for the OTLP exporter, `None` when tracing export is disabled
pub fn otlp_endpoint() -> Option<String> {
    env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .map(|endpoint| {
            if endpoint.is_empty() {
                DEFAULT_OTLP_ENDPOINT.to_string()
            } else {
                endpoint
            }
        })
}

/// Build the tracing layer that exports spans to `endpoint`
pub fn init_telemetry<S>(_subscriber: &S, endpoint: &str) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::new(vec![
        KeyValue::new("service.name", SERVICE_NAME),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_resource(resource)
                .with_sampler(Sampler::AlwaysOn),
        )
        .install_batch(runtime::Tokio)
        .map_err(|e| Error::ConfigError(format!("failed to initialize OpenTelemetry tracer: {e}")))?;

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

/// Flush and shut down the tracer provider
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
