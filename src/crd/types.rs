//! Shared types for the IronicDatabase CRD

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label carried by every object the operator manages, and used as the pod selector
pub const IRONIC_OPERATOR_LABEL: &str = "ironic.metal3.io/app";

/// Coarse status reported for a database
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum IronicStatus {
    /// Not yet converged, or converging with a reported failure
    #[default]
    Progressing,
    /// Workload is up and the Service has a cluster address
    Available,
}

impl fmt::Display for IronicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IronicStatus::Progressing => write!(f, "Progressing"),
            IronicStatus::Available => write!(f, "Available"),
        }
    }
}

/// Kubernetes-style status condition
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_transition_time: String,
    pub reason: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    pub fn new(
        type_: &str,
        status: bool,
        reason: &str,
        message: &str,
        observed_generation: Option<i64>,
    ) -> Self {
        Self {
            type_: type_.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: chrono::Utc::now().to_rfc3339(),
            reason: reason.to_string(),
            message: message.to_string(),
            observed_generation,
        }
    }
}
