//! Admission hooks for IronicDatabase
//!
//! Create and update are checked with [`IronicDatabaseSpec::validate`]; deletion is
//! always allowed. The defaulting hook exists so a mutating webhook can be registered,
//! but sets nothing.
//!
//! [`IronicDatabaseSpec::validate`]: crate::crd::IronicDatabaseSpec::validate

use axum::Json;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::ResourceExt;
use tracing::{debug, error, info, warn};

use crate::crd::IronicDatabase;

pub fn validate_create(db: &IronicDatabase) -> Result<(), String> {
    info!(name = %db.name_any(), "validate create");
    db.spec.validate(None)
}

pub fn validate_update(old: &IronicDatabase, new: &IronicDatabase) -> Result<(), String> {
    info!(name = %new.name_any(), "validate update");
    new.spec.validate(Some(&old.spec))
}

pub fn validate_delete(_db: &IronicDatabase) -> Result<(), String> {
    Ok(())
}

/// No field of IronicDatabase has a default applied at admission time
pub fn default(_db: &mut IronicDatabase) {}

/// Decide a validating admission request
pub fn review_validation(req: &AdmissionRequest<IronicDatabase>) -> AdmissionResponse {
    let response = AdmissionResponse::from(req);

    let result = match (&req.operation, &req.object, &req.old_object) {
        (Operation::Create, Some(obj), _) => validate_create(obj),
        (Operation::Update, Some(new), Some(old)) => validate_update(old, new),
        (Operation::Update, Some(_), None) => Err("update request without the old object".to_string()),
        (Operation::Delete, _, Some(old)) => validate_delete(old),
        (Operation::Delete, _, None) | (Operation::Connect, _, _) => Ok(()),
        (_, None, _) => Err("admission request without an object".to_string()),
    };

    match result {
        Ok(()) => response,
        Err(reason) => {
            warn!(uid = %req.uid, reason = %reason, "denying IronicDatabase");
            response.deny(reason)
        }
    }
}

/// Decide a mutating admission request
pub fn review_defaulting(req: &AdmissionRequest<IronicDatabase>) -> AdmissionResponse {
    if let Some(obj) = &req.object {
        let mut defaulted = obj.clone();
        default(&mut defaulted);
        debug!(uid = %req.uid, name = %defaulted.name_any(), "no defaults to apply");
    }
    AdmissionResponse::from(req)
}

pub async fn validate_handler(
    Json(review): Json<AdmissionReview<IronicDatabase>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<IronicDatabase> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(review_validation(&req).into_review())
}

pub async fn mutate_handler(
    Json(review): Json<AdmissionReview<IronicDatabase>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<IronicDatabase> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(review_defaulting(&req).into_review())
}
