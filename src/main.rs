//! Ironic database operator entry point
//!
//! Starts the IronicDatabase controller, the metrics endpoint and the admission webhooks.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ironic_database_operator::{config::OperatorConfig, controller, telemetry};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let (json_layer, text_layer) = if config.log_json {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true)))
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer);

    match telemetry::otlp_endpoint() {
        Some(endpoint) => {
            let otel_layer = telemetry::init_telemetry(&registry, &endpoint)?;
            registry.with(otel_layer).init();
            info!("OpenTelemetry tracing initialized, exporting to {}", endpoint);
        }
        None => {
            registry.init();
            info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
        }
    }

    info!(
        "Starting Ironic database operator v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHA"),
        env!("BUILD_DATE")
    );

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    info!("Connected to Kubernetes cluster");
    match &config.namespace {
        Some(ns) => info!("Watching namespace: {}", ns),
        None => info!("Watching all namespaces"),
    }

    #[cfg(feature = "metrics")]
    {
        let addr = config.metrics_addr;
        tokio::spawn(async move {
            if let Err(e) = controller::metrics::serve_metrics(addr).await {
                error!("Metrics server error: {:?}", e);
            }
        });
    }

    #[cfg(feature = "admission-webhook")]
    {
        if config.enable_webhook {
            let addr = config.webhook_addr;
            let cert_path = config.webhook_cert_path();
            let key_path = config.webhook_key_path();
            tokio::spawn(async move {
                if let Err(e) = ironic_database_operator::webhook::serve_webhook(
                    addr, &cert_path, &key_path,
                )
                .await
                {
                    error!("Webhook server error: {:?}", e);
                }
            });
        } else {
            info!("Admission webhooks disabled");
        }
    }

    let state = Arc::new(controller::ControllerState { client, config });

    let result = controller::run_controller(state).await;

    telemetry::shutdown_telemetry();

    result.context("controller exited with an error")
}
