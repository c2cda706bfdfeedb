//! Access to the objects the operator manages
//!
//! Convergence code never holds a `kube::Client` directly. It goes through
//! [`ResourceStore`], so every write is expressed as a fetch, a pure mutation and a
//! single create or replace. [`KubeStore`] is the production implementation.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, PostParams},
    client::Client,
    Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// A namespaced Kubernetes object that can be converged through a [`ResourceStore`]
pub trait ManagedObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Default
    + PartialEq
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Minimal object store the convergence code needs
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an object, `None` when it does not exist
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// Create a new object and return what the server stored
    async fn create<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Replace an existing object. The object's `resourceVersion` guards against
    /// concurrent writers.
    async fn replace<K: ManagedObject>(&self, namespace: &str, name: &str, obj: &K) -> Result<K>;
}

/// Outcome of [`create_or_update`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

/// Fetch-or-default an object, apply `mutate`, then create or replace it.
///
/// `mutate` must be deterministic: it may run again on a later attempt against a
/// freshly fetched object, and its result is discarded when nothing changed. It must
/// not touch the object's name or namespace.
pub async fn create_or_update<K, S, F>(
    store: &S,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<(K, OperationResult)>
where
    K: ManagedObject,
    S: ResourceStore,
    F: Fn(&mut K) -> Result<()>,
{
    let kind = K::kind(&());

    match store.get::<K>(namespace, name).await? {
        None => {
            let mut obj = K::default();
            obj.meta_mut().name = Some(name.to_string());
            obj.meta_mut().namespace = Some(namespace.to_string());
            mutate(&mut obj)?;
            check_identity(&obj, namespace, name)?;

            let created = store.create(namespace, &obj).await?;
            Ok((created, OperationResult::Created))
        }
        Some(current) => {
            let mut obj = current.clone();
            mutate(&mut obj)?;
            check_identity(&obj, namespace, name)?;

            if obj == current {
                debug!("{} {}/{} unchanged", kind, namespace, name);
                return Ok((current, OperationResult::Unchanged));
            }

            let updated = store.replace(namespace, name, &obj).await?;
            Ok((updated, OperationResult::Updated))
        }
    }
}

fn check_identity<K: ManagedObject>(obj: &K, namespace: &str, name: &str) -> Result<()> {
    let meta = obj.meta();
    if meta.name.as_deref() != Some(name) || meta.namespace.as_deref() != Some(namespace) {
        return Err(Error::ConfigError(format!(
            "mutating {} {}/{} must not change its name or namespace",
            K::kind(&()),
            namespace,
            name
        )));
    }
    Ok(())
}

/// [`ResourceStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await.map_err(Error::KubeError)
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), obj)
            .await
            .map_err(Error::KubeError)
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, name: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), obj)
            .await
            .map_err(Error::KubeError)
    }
}
