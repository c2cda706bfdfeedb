//! Ironic database operator
//!
//! Reconciles `IronicDatabase` resources into a single-replica MariaDB Deployment
//! and ClusterIP Service, and reports availability and endpoints on the resource status.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod telemetry;
#[cfg(feature = "admission-webhook")]
pub mod webhook;

pub use error::{Error, Result};
