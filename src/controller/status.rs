//! Reduce a Deployment's observed state to an [`IronicStatus`]
//!
//! A generation the Deployment controller has not caught up with is always
//! progressing. Otherwise a true `ReplicaFailure` condition wins over `Available`.

use k8s_openapi::api::apps::v1::Deployment;

use crate::crd::IronicStatus;
use crate::error::{Error, Result};

const DEPLOYMENT_AVAILABLE: &str = "Available";
const DEPLOYMENT_REPLICA_FAILURE: &str = "ReplicaFailure";

/// Classify a Deployment.
///
/// `Err(Error::DeploymentFailed)` carries the platform's failure message; callers
/// treat it as `Progressing` and keep retrying.
pub fn deployment_status(deploy: &Deployment) -> Result<IronicStatus> {
    let generation = deploy.metadata.generation.unwrap_or_default();
    let observed_generation = deploy
        .status
        .as_ref()
        .and_then(|s| s.observed_generation)
        .unwrap_or_default();

    if observed_generation != generation {
        return Ok(IronicStatus::Progressing);
    }

    let conditions = deploy
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();

    let mut available = false;
    for cond in conditions {
        if cond.status != "True" {
            continue;
        }
        match cond.type_.as_str() {
            DEPLOYMENT_REPLICA_FAILURE => {
                return Err(Error::DeploymentFailed(
                    cond.message.clone().unwrap_or_default(),
                ));
            }
            DEPLOYMENT_AVAILABLE => available = true,
            _ => {}
        }
    }

    if available {
        Ok(IronicStatus::Available)
    } else {
        Ok(IronicStatus::Progressing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};

    fn condition(type_: &str, status: &str, message: &str) -> DeploymentCondition {
        DeploymentCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            message: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn deployment(
        generation: i64,
        observed: i64,
        conditions: Vec<DeploymentCondition>,
    ) -> Deployment {
        let mut deploy = Deployment::default();
        deploy.metadata.generation = Some(generation);
        deploy.status = Some(DeploymentStatus {
            observed_generation: Some(observed),
            conditions: Some(conditions),
            ..Default::default()
        });
        deploy
    }

    #[test]
    fn test_generation_lag_is_progressing() {
        let deploy = deployment(3, 2, vec![condition("Available", "True", "")]);
        assert_eq!(deployment_status(&deploy).unwrap(), IronicStatus::Progressing);
    }

    #[test]
    fn test_generation_lag_hides_failure() {
        let deploy = deployment(3, 2, vec![condition("ReplicaFailure", "True", "boom")]);
        assert_eq!(deployment_status(&deploy).unwrap(), IronicStatus::Progressing);
    }

    #[test]
    fn test_available() {
        let deploy = deployment(2, 2, vec![condition("Available", "True", "")]);
        assert_eq!(deployment_status(&deploy).unwrap(), IronicStatus::Available);
    }

    #[test]
    fn test_not_available() {
        let deploy = deployment(2, 2, vec![condition("Available", "False", "")]);
        assert_eq!(deployment_status(&deploy).unwrap(), IronicStatus::Progressing);
    }

    #[test]
    fn test_no_status_is_progressing() {
        let mut deploy = Deployment::default();
        deploy.metadata.generation = Some(1);
        assert_eq!(deployment_status(&deploy).unwrap(), IronicStatus::Progressing);
    }

    #[test]
    fn test_replica_failure_wins_over_available() {
        let deploy = deployment(
            1,
            1,
            vec![
                condition("Available", "True", ""),
                condition("ReplicaFailure", "True", "exceeded quota"),
            ],
        );
        let err = deployment_status(&deploy).unwrap_err();
        assert!(matches!(err, Error::DeploymentFailed(ref m) if m == "exceeded quota"));
        assert_eq!(err.to_string(), "deployment failed: exceeded quota");
    }

    #[test]
    fn test_false_replica_failure_is_ignored() {
        let deploy = deployment(
            1,
            1,
            vec![
                condition("ReplicaFailure", "False", ""),
                condition("Available", "True", ""),
            ],
        );
        assert_eq!(deployment_status(&deploy).unwrap(), IronicStatus::Available);
    }
}
