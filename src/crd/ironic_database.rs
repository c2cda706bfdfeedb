//! IronicDatabase Custom Resource Definition
//!
//! An IronicDatabase describes the MariaDB instance an Ironic deployment talks to.
//! Either the operator runs it (a Deployment plus a ClusterIP Service), or it points
//! at an externally hosted database through `externalIP`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, IronicStatus};

/// The IronicDatabase CRD.
///
/// # Example
///
/// ```yaml
/// apiVersion: metal3.io/v1alpha1
/// kind: IronicDatabase
/// metadata:
///   name: ironic
///   namespace: baremetal-operator-system
/// spec:
///   image: quay.io/metal3-io/mariadb:latest
///   credentialsSecretName: ironic-db-credentials
///   tlsSecretName: ironic-db-tls
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "metal3.io",
    version = "v1alpha1",
    kind = "IronicDatabase",
    namespaced,
    status = "IronicDatabaseStatus",
    shortname = "idb",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IronicDatabaseSpec {
    /// MariaDB container image
    pub image: String,

    /// Secret holding the database password under the `password` key.
    /// Required when `externalIP` is set.
    #[serde(default)]
    pub credentials_secret_name: String,

    /// Secret with TLS material, mounted read-only into the database container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret_name: Option<String>,

    /// Address of an externally hosted database. When set, nothing is deployed.
    #[serde(
        default,
        rename = "externalIP",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_ip: Option<String>,
}

impl IronicDatabaseSpec {
    /// Check the spec before it is persisted.
    ///
    /// `previous` is the spec being replaced on update and `None` on create. No rule
    /// compares the two yet.
    pub fn validate(&self, _previous: Option<&IronicDatabaseSpec>) -> Result<(), String> {
        if self.external_ip().is_some() && self.credentials_secret_name.is_empty() {
            return Err("external database requires credentials".to_string());
        }
        Ok(())
    }

    /// External database address, treating an empty string as unset
    pub fn external_ip(&self) -> Option<&str> {
        non_empty(self.external_ip.as_deref())
    }

    /// TLS secret name, treating an empty string as unset
    pub fn tls_secret_name(&self) -> Option<&str> {
        non_empty(self.tls_secret_name.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Status subresource for IronicDatabase
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IronicDatabaseStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Sorted `host:port` endpoints, set once the database is reachable.
    /// Always serialized so a merge patch can clear it.
    #[serde(default)]
    pub endpoints: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl IronicDatabaseStatus {
    /// Coarse status derived from the `Ready` condition
    pub fn status(&self) -> IronicStatus {
        match self.condition("Ready") {
            Some(c) if c.status == "True" => IronicStatus::Available,
            _ => IronicStatus::Progressing,
        }
    }

    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Insert or update a condition, keeping the transition time unless the status flips
    pub fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status != condition.status {
                    existing.last_transition_time = condition.last_transition_time;
                }
                existing.status = condition.status;
                existing.reason = condition.reason;
                existing.message = condition.message;
                existing.observed_generation = condition.observed_generation;
            }
            None => self.conditions.push(condition),
        }
    }
}
