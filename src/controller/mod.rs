//! Controller module for IronicDatabase reconciliation
//!
//! This module contains the convergence engine for the MariaDB workload and Service,
//! the status classifier, and the controller loop that drives them.

mod database;
#[cfg(feature = "metrics")]
pub mod metrics;
mod owner;
mod reconciler;
mod status;
mod store;

pub use database::{
    build_endpoints, database_pod_template, deployment_name, mutate_deployment, mutate_service,
    DatabaseManager, DatabaseState, SecurityPolicy, DATABASE_APP_NAME, DATABASE_PORT,
};
pub use owner::set_controller_reference;
pub use reconciler::{
    converge_database, record_failure, record_state, run_controller, ControllerState,
    ConvergeFailure,
};
pub use status::deployment_status;
pub use store::{create_or_update, KubeStore, ManagedObject, OperationResult, ResourceStore};
