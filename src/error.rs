//! Error types for the Ironic database operator

use thiserror::Error;

/// Errors raised while converging an `IronicDatabase`
#[derive(Error, Debug)]
pub enum Error {
    /// Any failure talking to the Kubernetes API, including optimistic-concurrency conflicts
    #[error("Kubernetes API error: {0}")]
    KubeError(#[source] kube::Error),

    /// The desired state was rejected by the validator
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The Deployment reports a true `ReplicaFailure` condition
    #[error("deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The dependent object is already controlled by another owner
    #[error("{kind} {name} is already owned by another controller {owner}")]
    AlreadyOwned {
        kind: String,
        name: String,
        owner: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Webhook error: {0}")]
    WebhookError(String),
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::KubeError(e)
    }
}

impl Error {
    /// Whether the controller should retry quickly.
    ///
    /// API errors and a failing rollout can resolve on their own; a bad spec or a
    /// conflicting owner needs a human.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::KubeError(_) | Error::DeploymentFailed(_))
    }

    /// Short label used for the error counter
    pub fn metric_kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::ValidationError(_) => "validation",
            Error::DeploymentFailed(_) => "deployment",
            Error::MissingField(_) => "missing_field",
            Error::AlreadyOwned { .. } => "already_owned",
            Error::SerializationError(_) => "serialization",
            Error::ConfigError(_) => "config",
            Error::WebhookError(_) => "webhook",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
