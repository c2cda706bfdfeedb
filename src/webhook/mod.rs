//! Admission webhook server for IronicDatabase
//!
//! Serves the validating and mutating hooks over TLS using the certificate pair
//! mounted into the webhook cert directory.

mod validation;

use std::net::SocketAddr;
use std::path::Path;

use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};

pub use validation::{
    default, review_defaulting, review_validation, validate_create, validate_delete,
    validate_update,
};

pub const VALIDATE_PATH: &str = "/validate-metal3-io-v1alpha1-ironicdatabase";
pub const MUTATE_PATH: &str = "/mutate-metal3-io-v1alpha1-ironicdatabase";

pub fn webhook_router() -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validation::validate_handler))
        .route(MUTATE_PATH, post(validation::mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admission hooks until the process exits
pub async fn serve_webhook(addr: SocketAddr, cert_path: &Path, key_path: &Path) -> Result<()> {
    let tls = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| {
            Error::WebhookError(format!(
                "failed to load webhook certificate from {}: {e}",
                cert_path.display()
            ))
        })?;

    info!("Serving admission webhooks on {}", addr);
    axum_server::bind_rustls(addr, tls)
        .serve(webhook_router().into_make_service())
        .await
        .map_err(|e| Error::WebhookError(format!("webhook server error: {e}")))
}
