//! Custom Resource Definitions for the Ironic database operator

mod ironic_database;
mod types;

pub use ironic_database::{IronicDatabase, IronicDatabaseSpec, IronicDatabaseStatus};
pub use types::*;
