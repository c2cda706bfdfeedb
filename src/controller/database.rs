//! MariaDB workload and Service for an IronicDatabase
//!
//! Both objects are named `<name>-database`, live next to their IronicDatabase and
//! are controller-owned by it. Nothing here deletes them: removal is left to the
//! garbage collector following owner references.

use std::collections::BTreeMap;
use std::net::IpAddr;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, SecretKeySelector,
    SecretVolumeSource, SecurityContext, Service, ServicePort, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;
use tracing::{debug, info};

use super::owner::set_controller_reference;
use super::status::deployment_status;
use super::store::{create_or_update, OperationResult, ResourceStore};
use crate::crd::{IronicDatabase, IronicStatus, IRONIC_OPERATOR_LABEL};
use crate::error::Result;

/// Value of [`IRONIC_OPERATOR_LABEL`] on the database pods and Service
pub const DATABASE_APP_NAME: &str = "ironic-database";
pub const DATABASE_PORT: i32 = 3306;

const CONTAINER_NAME: &str = "mariadb";
const PASSWORD_ENV: &str = "MARIADB_PASSWORD";
const PASSWORD_KEY: &str = "password";
const RESTART_ON_CERT_UPDATE_ENV: &str = "RESTART_CONTAINER_CERTIFICATE_UPDATED";
const TLS_VOLUME: &str = "cert-mariadb";
const TLS_MOUNT_PATH: &str = "/certs/mariadb";

/// Security context applied to the MariaDB container.
///
/// The default runs privileged and allows root: the rootless image does not work
/// on every cluster yet. Operators that can run it unprivileged should turn both
/// knobs off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub privileged: bool,
    pub run_as_non_root: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            privileged: true,
            run_as_non_root: false,
        }
    }
}

/// Result of a successful [`DatabaseManager::ensure_database`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseState {
    pub status: IronicStatus,
    /// Sorted `host:port` strings; empty until the database is available
    pub endpoints: Vec<String>,
}

/// Name shared by the Deployment and the Service
pub fn deployment_name(db: &IronicDatabase) -> String {
    format!("{}-database", db.name_any())
}

fn app_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        IRONIC_OPERATOR_LABEL.to_string(),
        DATABASE_APP_NAME.to_string(),
    )])
}

fn database_password_env_var(db: &IronicDatabase) -> EnvVar {
    EnvVar {
        name: PASSWORD_ENV.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: Some(db.spec.credentials_secret_name.clone()),
                key: PASSWORD_KEY.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod template for the database, rebuilt from scratch on every convergence
pub fn database_pod_template(db: &IronicDatabase, security: &SecurityPolicy) -> PodTemplateSpec {
    let (volumes, mounts) = match db.spec.tls_secret_name() {
        Some(secret_name) => (
            Some(vec![Volume {
                name: TLS_VOLUME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret_name.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            Some(vec![VolumeMount {
                name: TLS_VOLUME.to_string(),
                mount_path: TLS_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
        ),
        None => (None, None),
    };

    // TODO: add liveness and readiness probes once the image ships a health check script
    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(db.spec.image.clone()),
        env: Some(vec![
            database_password_env_var(db),
            EnvVar {
                name: RESTART_ON_CERT_UPDATE_ENV.to_string(),
                value: Some("true".to_string()),
                ..Default::default()
            },
        ]),
        volume_mounts: mounts,
        security_context: Some(SecurityContext {
            privileged: Some(security.privileged),
            run_as_non_root: Some(security.run_as_non_root),
            ..Default::default()
        }),
        ..Default::default()
    };

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(app_labels()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            volumes,
            ..Default::default()
        }),
    }
}

/// Bring a fetched (or freshly defaulted) Deployment in line with `db`.
///
/// The selector is only written before the object exists: it is immutable on the
/// server side. Everything else this operator owns is overwritten.
pub fn mutate_deployment(
    db: &IronicDatabase,
    security: &SecurityPolicy,
    deploy: &mut Deployment,
) -> Result<()> {
    let spec = deploy.spec.get_or_insert_with(Default::default);
    if deploy.metadata.creation_timestamp.is_none() {
        spec.selector = LabelSelector {
            match_labels: Some(app_labels()),
            ..Default::default()
        };
    }
    spec.template = database_pod_template(db, security);

    set_controller_reference(db, deploy)
}

/// Bring a fetched (or freshly defaulted) Service in line with `db`.
///
/// Cluster IPs and other server-assigned fields are left untouched.
pub fn mutate_service(db: &IronicDatabase, service: &mut Service) -> Result<()> {
    service
        .labels_mut()
        .insert(IRONIC_OPERATOR_LABEL.to_string(), DATABASE_APP_NAME.to_string());

    let spec = service.spec.get_or_insert_with(Default::default);
    spec.selector = Some(app_labels());
    spec.ports = Some(vec![ServicePort {
        protocol: Some("TCP".to_string()),
        port: DATABASE_PORT,
        ..Default::default()
    }]);
    spec.type_ = Some("ClusterIP".to_string());

    set_controller_reference(db, service)
}

/// Format each address as `host:3306` and sort the result
pub fn build_endpoints(ips: &[String]) -> Vec<String> {
    let mut endpoints: Vec<String> = ips.iter().map(|ip| join_host_port(ip, DATABASE_PORT)).collect();
    endpoints.sort();
    endpoints
}

fn join_host_port(host: &str, port: i32) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{host}]:{port}"),
        _ => format!("{host}:{port}"),
    }
}

/// Converges the MariaDB Deployment and Service of IronicDatabase resources
pub struct DatabaseManager<S> {
    store: S,
    security: SecurityPolicy,
}

impl<S: ResourceStore> DatabaseManager<S> {
    pub fn new(store: S, security: SecurityPolicy) -> Self {
        Self { store, security }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ensure MariaDB is running with the current configuration.
    ///
    /// The Service is only converged once the Deployment is available.
    pub async fn ensure_database(&self, db: &IronicDatabase) -> Result<DatabaseState> {
        let status = self.ensure_deployment(db).await?;
        if status != IronicStatus::Available {
            return Ok(DatabaseState {
                status,
                endpoints: Vec::new(),
            });
        }

        let (status, endpoints) = self.ensure_service(db).await?;
        Ok(DatabaseState { status, endpoints })
    }

    /// Remove the database.
    ///
    /// Nothing to do: the Deployment and Service carry a controller reference to the
    /// IronicDatabase and are garbage collected with it.
    pub async fn remove_database(&self, db: &IronicDatabase) -> Result<()> {
        debug!(
            "Leaving removal of {} to the garbage collector",
            deployment_name(db)
        );
        Ok(())
    }

    /// Create or update the Deployment and classify its status
    pub async fn ensure_deployment(&self, db: &IronicDatabase) -> Result<IronicStatus> {
        let namespace = db.namespace().unwrap_or_else(|| "default".to_string());
        let name = deployment_name(db);

        let (deploy, result) = create_or_update::<Deployment, _, _>(
            &self.store,
            &namespace,
            &name,
            |deploy| mutate_deployment(db, &self.security, deploy),
        )
        .await?;
        log_operation("Deployment", &namespace, &name, result);

        deployment_status(&deploy)
    }

    /// Create or update the Service and collect its endpoints
    pub async fn ensure_service(&self, db: &IronicDatabase) -> Result<(IronicStatus, Vec<String>)> {
        let namespace = db.namespace().unwrap_or_else(|| "default".to_string());
        let name = deployment_name(db);

        let (service, result) =
            create_or_update::<Service, _, _>(&self.store, &namespace, &name, |service| {
                mutate_service(db, service)
            })
            .await?;
        log_operation("Service", &namespace, &name, result);

        let cluster_ips = service
            .spec
            .as_ref()
            .and_then(|s| s.cluster_ips.as_deref())
            .unwrap_or_default();
        if cluster_ips.is_empty() {
            debug!("Service {}/{} has no cluster IP yet", namespace, name);
            return Ok((IronicStatus::Progressing, Vec::new()));
        }

        Ok((IronicStatus::Available, build_endpoints(cluster_ips)))
    }
}

fn log_operation(kind: &str, namespace: &str, name: &str, result: OperationResult) {
    match result {
        OperationResult::Created => info!("Created {} {}/{}", kind, namespace, name),
        OperationResult::Updated => info!("Updated {} {}/{}", kind, namespace, name),
        OperationResult::Unchanged => {}
    }
}
