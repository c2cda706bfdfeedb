//! Owner references tying managed objects to their IronicDatabase
//!
//! The garbage collector deletes dependents once their controller owner is gone, so no
//! explicit cleanup exists anywhere in the operator.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::error::{Error, Result};

/// Record `owner` as the controlling owner of `dependent`.
///
/// An existing reference to the same owner is replaced; references to other,
/// non-controlling owners are kept. Fails if the owner has not been persisted yet
/// (no uid) or if a different controller already claims the object.
pub fn set_controller_reference<O, K>(owner: &O, dependent: &mut K) -> Result<()>
where
    O: Resource<DynamicType = ()>,
    K: Resource<DynamicType = ()>,
{
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or(Error::MissingField("metadata.uid"))?;

    if let Some(other) = dependent
        .owner_references()
        .iter()
        .find(|r| r.controller == Some(true) && !same_owner(r, &owner_ref))
    {
        return Err(Error::AlreadyOwned {
            kind: K::kind(&()).to_string(),
            name: dependent.name_any(),
            owner: format!("{}/{}", other.kind, other.name),
        });
    }

    let refs = dependent.owner_references_mut();
    refs.retain(|r| !same_owner(r, &owner_ref));
    refs.push(owner_ref);
    Ok(())
}

fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.uid == b.uid
        || (group_of(&a.api_version) == group_of(&b.api_version)
            && a.kind == b.kind
            && a.name == b.name)
}

fn group_of(api_version: &str) -> &str {
    api_version.rsplit_once('/').map_or("", |(group, _)| group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{IronicDatabase, IronicDatabaseSpec};
    use k8s_openapi::api::apps::v1::Deployment;

    fn owner(uid: Option<&str>) -> IronicDatabase {
        let mut db = IronicDatabase::new("ironic", IronicDatabaseSpec::default());
        db.metadata.namespace = Some("metal3".to_string());
        db.metadata.uid = uid.map(String::from);
        db
    }

    #[test]
    fn test_sets_controller_reference() {
        let mut deploy = Deployment::default();
        set_controller_reference(&owner(Some("uid-1")), &mut deploy).unwrap();

        let refs = deploy.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "IronicDatabase");
        assert_eq!(refs[0].api_version, "metal3.io/v1alpha1");
        assert_eq!(refs[0].name, "ironic");
        assert_eq!(refs[0].uid, "uid-1");
        assert_eq!(refs[0].controller, Some(true));
    }

    #[test]
    fn test_is_idempotent() {
        let db = owner(Some("uid-1"));
        let mut deploy = Deployment::default();
        set_controller_reference(&db, &mut deploy).unwrap();
        let first = deploy.clone();
        set_controller_reference(&db, &mut deploy).unwrap();
        assert_eq!(first, deploy);
    }

    #[test]
    fn test_requires_uid() {
        let mut deploy = Deployment::default();
        let err = set_controller_reference(&owner(None), &mut deploy).unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
    }

    #[test]
    fn test_rejects_other_controller() {
        let mut deploy = Deployment::default();
        deploy.metadata.name = Some("ironic-database".to_string());
        deploy.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "ReplicaSet".to_string(),
            name: "someone-else".to_string(),
            uid: "uid-9".to_string(),
            controller: Some(true),
            block_owner_deletion: None,
        }]);

        let err = set_controller_reference(&owner(Some("uid-1")), &mut deploy).unwrap_err();
        assert!(matches!(err, Error::AlreadyOwned { .. }));
    }

    #[test]
    fn test_keeps_non_controller_owners() {
        let mut deploy = Deployment::default();
        deploy.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            name: "extra".to_string(),
            uid: "uid-2".to_string(),
            controller: None,
            block_owner_deletion: None,
        }]);

        set_controller_reference(&owner(Some("uid-1")), &mut deploy).unwrap();
        assert_eq!(deploy.metadata.owner_references.unwrap().len(), 2);
    }
}
