//! Operator configuration, from command-line flags or the environment

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::controller::SecurityPolicy;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ironic-database-operator",
    version,
    about = "Keeps the MariaDB database backing Ironic converged"
)]
pub struct OperatorConfig {
    /// Only watch IronicDatabase resources in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Run the MariaDB container privileged
    #[arg(long, env = "DATABASE_PRIVILEGED", default_value_t = true, action = ArgAction::Set)]
    pub database_privileged: bool,

    /// Require the MariaDB container to run as a non-root user
    #[arg(long, env = "DATABASE_RUN_AS_NON_ROOT", default_value_t = false, action = ArgAction::Set)]
    pub database_run_as_non_root: bool,

    /// Serve the validating and mutating admission webhooks
    #[arg(long, env = "ENABLE_WEBHOOK", default_value_t = true, action = ArgAction::Set)]
    pub enable_webhook: bool,

    #[arg(long, env = "WEBHOOK_ADDR", default_value = "0.0.0.0:9443")]
    pub webhook_addr: SocketAddr,

    /// Directory holding `tls.crt` and `tls.key` for the webhook server
    #[arg(
        long,
        env = "WEBHOOK_CERT_DIR",
        default_value = "/tmp/k8s-webhook-server/serving-certs"
    )]
    pub webhook_cert_dir: PathBuf,

    /// Address for `/metrics` and `/healthz`
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: SocketAddr,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl OperatorConfig {
    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy {
            privileged: self.database_privileged,
            run_as_non_root: self.database_run_as_non_root,
        }
    }

    pub fn webhook_cert_path(&self) -> PathBuf {
        self.webhook_cert_dir.join("tls.crt")
    }

    pub fn webhook_key_path(&self) -> PathBuf {
        self.webhook_cert_dir.join("tls.key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_privileged_posture() {
        let config = OperatorConfig::try_parse_from(["ironic-database-operator"]).unwrap();
        assert_eq!(config.security_policy(), SecurityPolicy::default());
        assert!(config.enable_webhook);
        assert_eq!(config.webhook_addr.port(), 9443);
        assert_eq!(
            config.webhook_cert_path(),
            PathBuf::from("/tmp/k8s-webhook-server/serving-certs/tls.crt")
        );
    }

    #[test]
    fn test_security_policy_flags() {
        let config = OperatorConfig::try_parse_from([
            "ironic-database-operator",
            "--database-privileged",
            "false",
            "--database-run-as-non-root",
            "true",
            "--namespace",
            "metal3",
        ])
        .unwrap();

        let policy = config.security_policy();
        assert!(!policy.privileged);
        assert!(policy.run_as_non_root);
        assert_eq!(config.namespace.as_deref(), Some("metal3"));
    }
}
