//! In-memory object store shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ironic_database_operator::controller::{ManagedObject, ResourceStore};
use ironic_database_operator::crd::{IronicDatabase, IronicDatabaseSpec};
use ironic_database_operator::{Error, Result};
use kube::core::ErrorResponse;
use serde_json::{json, Value};

type Key = (String, String, String);

/// Stores objects as JSON, assigning the metadata the API server would
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<Key, Value>>,
    fail_with: Mutex<Option<u16>>,
    writes: AtomicU32,
    next_uid: AtomicU32,
}

fn key<K: ManagedObject>(namespace: &str, name: &str) -> Key {
    (
        K::kind(&()).to_string(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn api_error(code: u16, message: &str) -> Error {
    Error::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: match code {
            404 => "NotFound",
            409 => "Conflict",
            _ => "InternalError",
        }
        .to_string(),
        code,
    }))
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with an API error carrying `code`
    pub fn fail_with(&self, code: u16) {
        *self.fail_with.lock().unwrap() = Some(code);
    }

    /// Number of create and replace calls served so far
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn object(&self, kind: &str, namespace: &str, name: &str) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind.to_string(), namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn typed<K: ManagedObject>(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    fn edit(&self, kind: &str, namespace: &str, name: &str, f: impl FnOnce(&mut Value)) {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .get_mut(&(kind.to_string(), namespace.to_string(), name.to_string()))
            .unwrap_or_else(|| panic!("{kind} {namespace}/{name} does not exist"));
        f(obj);
    }

    /// Report the Deployment as rolled out and available at its current generation
    pub fn mark_deployment_available(&self, namespace: &str, name: &str) {
        self.set_deployment_condition(namespace, name, "Available", "MinimumReplicasAvailable", "");
    }

    pub fn mark_replica_failure(&self, namespace: &str, name: &str, message: &str) {
        self.set_deployment_condition(namespace, name, "ReplicaFailure", "FailedCreate", message);
    }

    fn set_deployment_condition(
        &self,
        namespace: &str,
        name: &str,
        type_: &str,
        reason: &str,
        message: &str,
    ) {
        self.edit("Deployment", namespace, name, |obj| {
            let generation = obj["metadata"]["generation"].clone();
            obj["status"] = json!({
                "observedGeneration": generation,
                "conditions": [{
                    "type": type_,
                    "status": "True",
                    "reason": reason,
                    "message": message,
                }],
            });
        });
    }

    /// Assign cluster IPs the way the service allocator would
    pub fn assign_cluster_ips(&self, namespace: &str, name: &str, ips: &[&str]) {
        self.edit("Service", namespace, name, |obj| {
            obj["spec"]["clusterIP"] = json!(ips.first());
            obj["spec"]["clusterIPs"] = json!(ips);
        });
    }

    fn check_failure(&self) -> Result<()> {
        match *self.fail_with.lock().unwrap() {
            Some(code) => Err(api_error(code, "injected failure")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceStore for FakeStore {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        self.check_failure()?;
        let objects = self.objects.lock().unwrap();
        match objects.get(&key::<K>(namespace, name)) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K> {
        self.check_failure()?;
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut objects = self.objects.lock().unwrap();
        let key = key::<K>(namespace, &name);
        if objects.contains_key(&key) {
            return Err(api_error(409, "already exists"));
        }

        let uid = self.next_uid.fetch_add(1, Ordering::SeqCst);
        let mut value = serde_json::to_value(obj)?;
        value["metadata"]["uid"] = json!(format!("uid-{uid}"));
        value["metadata"]["generation"] = json!(1);
        value["metadata"]["resourceVersion"] = json!("1");
        value["metadata"]["creationTimestamp"] = json!("2024-01-01T00:00:00Z");

        objects.insert(key, value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, name: &str, obj: &K) -> Result<K> {
        self.check_failure()?;
        let mut objects = self.objects.lock().unwrap();
        let key = key::<K>(namespace, name);
        let current = objects
            .get(&key)
            .ok_or_else(|| api_error(404, "not found"))?
            .clone();

        let mut value = serde_json::to_value(obj)?;
        if value["metadata"]["resourceVersion"] != current["metadata"]["resourceVersion"] {
            return Err(api_error(409, "the object has been modified"));
        }
        let generation = current["metadata"]["generation"].as_i64().unwrap_or(0) + 1;
        value["metadata"]["generation"] = json!(generation);
        value["metadata"]["resourceVersion"] = json!(generation.to_string());
        value["status"] = current["status"].clone();

        objects.insert(key, value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(value)?)
    }
}

/// Store that must never be called
pub struct PanicStore;

#[async_trait]
impl ResourceStore for PanicStore {
    async fn get<K: ManagedObject>(&self, _namespace: &str, _name: &str) -> Result<Option<K>> {
        panic!("unexpected get");
    }

    async fn create<K: ManagedObject>(&self, _namespace: &str, _obj: &K) -> Result<K> {
        panic!("unexpected create");
    }

    async fn replace<K: ManagedObject>(&self, _namespace: &str, _name: &str, _obj: &K) -> Result<K> {
        panic!("unexpected replace");
    }
}

pub fn ironic_database(tls_secret_name: Option<&str>) -> IronicDatabase {
    let mut db = IronicDatabase::new(
        "ironic",
        IronicDatabaseSpec {
            image: "quay.io/metal3-io/mariadb:main".to_string(),
            credentials_secret_name: "ironic-db-creds".to_string(),
            tls_secret_name: tls_secret_name.map(str::to_string),
            external_ip: None,
        },
    );
    db.metadata.namespace = Some("metal3".to_string());
    db.metadata.uid = Some("ironic-db-uid".to_string());
    db
}
