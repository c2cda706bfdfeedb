//! Controller loop for IronicDatabase resources
//!
//! Hands each IronicDatabase snapshot to the [`DatabaseManager`] and records the
//! outcome on the status subresource. Deletion needs no handling here: the managed
//! objects are garbage collected through their owner references.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Resource, ResourceExt,
};
use tracing::{error, info, instrument, warn};

use super::database::{build_endpoints, DatabaseManager, DatabaseState};
use super::store::{KubeStore, ResourceStore};
use crate::config::OperatorConfig;
use crate::crd::{Condition, IronicDatabase, IronicDatabaseStatus, IronicStatus};
use crate::error::{Error, Result};

const CONTROLLER_NAME: &str = "ironicdatabase";
const FIELD_MANAGER: &str = "ironic-database-operator";

const READY_CONDITION: &str = "Ready";
const PROGRESSING_CONDITION: &str = "Progressing";

/// Shared state for the IronicDatabase controller
pub struct ControllerState {
    /// Kubernetes client for API interactions
    pub client: Client,
    pub config: OperatorConfig,
}

impl ControllerState {
    fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
    {
        match &self.config.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Main entry point to start the IronicDatabase controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let databases: Api<IronicDatabase> = state.api();

    info!("Starting IronicDatabase controller");

    match databases.list(&ListParams::default().limit(1)).await {
        Ok(_) => info!("IronicDatabase CRD is available"),
        Err(e) => {
            error!("IronicDatabase CRD not found: {:?}", e);
            return Err(Error::ConfigError(
                "IronicDatabase CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(databases, Config::default())
        .owns::<Deployment>(state.api(), Config::default())
        .owns::<Service>(state.api(), Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => info!("Reconciled IronicDatabase: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

#[instrument(skip(db, ctx), fields(name = %db.name_any(), namespace = ?db.namespace()))]
async fn reconcile(db: Arc<IronicDatabase>, ctx: Arc<ControllerState>) -> Result<Action> {
    let started = Instant::now();
    let result = reconcile_database(&db, &ctx).await;

    #[cfg(feature = "metrics")]
    {
        super::metrics::observe_reconcile_duration_seconds(
            CONTROLLER_NAME,
            started.elapsed().as_secs_f64(),
        );
        record_availability(&db, &result);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = started;

    result.map(|state| requeue_for(state.status))
}

/// Set the availability gauge; a failed pass counts as unavailable
#[cfg(feature = "metrics")]
fn record_availability(db: &IronicDatabase, result: &Result<DatabaseState>) {
    let available = matches!(result, Ok(state) if state.status == IronicStatus::Available);
    super::metrics::set_database_available(
        &db.namespace().unwrap_or_default(),
        &db.name_any(),
        available,
    );
}

async fn reconcile_database(db: &IronicDatabase, ctx: &ControllerState) -> Result<DatabaseState> {
    let namespace = db.namespace().unwrap_or_else(|| "default".to_string());
    let name = db.name_any();
    let generation = db.meta().generation;

    info!("Reconciling IronicDatabase {}/{}", namespace, name);

    let manager = DatabaseManager::new(
        KubeStore::new(ctx.client.clone()),
        ctx.config.security_policy(),
    );

    match converge_database(db, &manager).await {
        Ok(state) => {
            update_status(&ctx.client, db, |status| record_state(status, &state, generation))
                .await?;
            Ok(state)
        }
        Err(failure) => {
            let message = failure.error.to_string();
            update_status(&ctx.client, db, |status| {
                record_failure(status, failure.reason, &message, generation)
            })
            .await?;
            Err(failure.error)
        }
    }
}

/// A failed convergence and the condition reason it is recorded under
#[derive(Debug)]
pub struct ConvergeFailure {
    pub reason: &'static str,
    pub error: Error,
}

/// Decide the database state for `db` without touching its status.
///
/// The spec is validated again since the webhook may be disabled. An external
/// database is reported available without calling the store.
pub async fn converge_database<S: ResourceStore>(
    db: &IronicDatabase,
    manager: &DatabaseManager<S>,
) -> std::result::Result<DatabaseState, ConvergeFailure> {
    let namespace = db.namespace().unwrap_or_else(|| "default".to_string());
    let name = db.name_any();

    if let Err(e) = db.spec.validate(None) {
        warn!("Validation failed for {}/{}: {}", namespace, name, e);
        return Err(ConvergeFailure {
            reason: "ValidationFailed",
            error: Error::ValidationError(e),
        });
    }

    if let Some(ip) = db.spec.external_ip() {
        info!("{}/{} uses an external database at {}", namespace, name, ip);
        return Ok(DatabaseState {
            status: IronicStatus::Available,
            endpoints: build_endpoints(&[ip.to_string()]),
        });
    }

    manager.ensure_database(db).await.map_err(|e| {
        warn!("Failed to ensure database {}/{}: {}", namespace, name, e);
        let reason = match e {
            Error::DeploymentFailed(_) => "DeploymentFailed",
            _ => "ReconcileError",
        };
        ConvergeFailure { reason, error: e }
    })
}

fn requeue_for(status: IronicStatus) -> Action {
    match status {
        IronicStatus::Available => Action::requeue(Duration::from_secs(300)),
        IronicStatus::Progressing => Action::requeue(Duration::from_secs(10)),
    }
}

/// Write the result of a successful convergence into `status`
pub fn record_state(status: &mut IronicDatabaseStatus, state: &DatabaseState, generation: Option<i64>) {
    let available = state.status == IronicStatus::Available;
    let (reason, message) = if available {
        ("DatabaseAvailable", "database is available")
    } else {
        ("DatabaseProgressing", "waiting for the database to become available")
    };

    status.set_condition(Condition::new(READY_CONDITION, available, reason, message, generation));
    status.set_condition(Condition::new(
        PROGRESSING_CONDITION,
        !available,
        reason,
        message,
        generation,
    ));
    status.endpoints = state.endpoints.clone();
    status.observed_generation = generation;
}

/// Record a failed convergence; the database is reported as progressing
pub fn record_failure(
    status: &mut IronicDatabaseStatus,
    reason: &str,
    message: &str,
    generation: Option<i64>,
) {
    status.set_condition(Condition::new(READY_CONDITION, false, reason, message, generation));
    status.set_condition(Condition::new(PROGRESSING_CONDITION, true, reason, message, generation));
    status.endpoints.clear();
    status.observed_generation = generation;
}

/// Patch the status subresource, skipping the write when nothing changed
async fn update_status<F>(client: &Client, db: &IronicDatabase, f: F) -> Result<()>
where
    F: FnOnce(&mut IronicDatabaseStatus),
{
    let namespace = db.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<IronicDatabase> = Api::namespaced(client.clone(), &namespace);

    let current = db.status.clone().unwrap_or_default();
    let mut status = current.clone();
    f(&mut status);
    if status == current {
        return Ok(());
    }

    let patch = status_patch(&status);
    api.patch_status(
        &db.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    Ok(())
}

/// Merge patch body for the status subresource
fn status_patch(status: &IronicDatabaseStatus) -> serde_json::Value {
    serde_json::json!({ "status": status })
}

/// Error policy for the controller
fn error_policy(db: Arc<IronicDatabase>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {:?}", db.name_any(), error);

    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(CONTROLLER_NAME, error.metric_kind());

    let retry_duration = if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    };

    Action::requeue(retry_duration)
}
