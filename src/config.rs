//! Audit configuration
//!
//! One explicit configuration object threaded through every component
//! at construction time. Flags take precedence; each has a `GCPAUDIT_*`
//! environment fallback.

use anyhow::Result;

/// OAuth scopes considered minimal for GKE cluster nodes
pub const DEFAULT_MINIMAL_OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/devstorage.read_only",
    "https://www.googleapis.com/auth/logging.write",
    "https://www.googleapis.com/auth/monitoring",
    "https://www.googleapis.com/auth/servicecontrol",
    "https://www.googleapis.com/auth/service.management.readonly",
    "https://www.googleapis.com/auth/trace.append",
];

/// Configuration for one audit run
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Project name filter selecting the projects in scope (required)
    pub project_filter: Option<String>,

    /// How many collection workers may be in flight per category
    pub collector_concurrency: usize,
    /// Keep collecting unaffected projects when one project fails,
    /// reporting the failed ones as explicitly unknown
    pub continue_on_error: bool,

    /// Expected number of network interfaces per instance
    pub compute_num_interfaces: usize,
    /// Whether instances are allowed external (NAT) IP addresses
    pub compute_allow_nat: bool,
    /// Whether instances are allowed to perform IP forwarding
    pub compute_allow_ip_forwarding: bool,

    /// Domains human-type members may belong to (empty = check disabled)
    pub iam_user_domains: Vec<String>,
    /// Allowed age of user-managed service account keys, in days
    pub iam_sa_key_rotation_days: i64,
    /// OAuth scopes allowed for GKE cluster nodes
    pub container_oauth_scopes: Vec<String>,

    /// Emit the full report array on stdout
    pub reports_stdout: bool,
    /// Publish each report as one Pub/Sub message
    pub reports_pubsub: bool,
    /// Project hosting the Pub/Sub topic
    pub pubsub_project: Option<String>,
    /// Topic to publish reports to
    pub pubsub_topic: String,
    /// Drop passed controls from stored reports
    pub only_failures: bool,

    /// Push metrics to a Prometheus push gateway
    pub metrics_enabled: bool,
    /// Push gateway address (host:port)
    pub metrics_gateway: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            project_filter: None,
            collector_concurrency: 8,
            continue_on_error: false,
            compute_num_interfaces: 1,
            compute_allow_nat: false,
            compute_allow_ip_forwarding: false,
            iam_user_domains: Vec::new(),
            iam_sa_key_rotation_days: 90,
            container_oauth_scopes: DEFAULT_MINIMAL_OAUTH_SCOPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reports_stdout: false,
            reports_pubsub: false,
            pubsub_project: None,
            pubsub_topic: "gcpaudit".to_string(),
            only_failures: false,
            metrics_enabled: false,
            metrics_gateway: "127.0.0.1:9091".to_string(),
        }
    }
}

impl AuditConfig {
    /// Check for configuration errors that must stop the run before any
    /// collection begins.
    pub fn validate(&self) -> Result<()> {
        match &self.project_filter {
            None => {
                return Err(anyhow::anyhow!(
                    "No project filter was provided. Either specify --project-filter or set \
                     GCPAUDIT_PROJECT_FILTER to the appropriate filter (e.g. my-cool-projects-*)"
                ));
            }
            Some(filter) if filter.is_empty() => {
                return Err(anyhow::anyhow!("Project filter must not be empty"));
            }
            Some(_) => {}
        }

        if self.reports_pubsub {
            if self.pubsub_project.as_deref().unwrap_or("").is_empty() {
                return Err(anyhow::anyhow!("PubSub project not specified"));
            }
            if self.pubsub_topic.is_empty() {
                return Err(anyhow::anyhow!("PubSub topic not specified"));
            }
        }

        if self.metrics_enabled && self.metrics_gateway.is_empty() {
            return Err(anyhow::anyhow!("Metrics gateway not specified"));
        }

        if self.collector_concurrency == 0 {
            return Err(anyhow::anyhow!("Collector concurrency must be at least 1"));
        }

        Ok(())
    }

    /// The project filter, after [`validate`](Self::validate) has passed
    pub fn project_filter(&self) -> &str {
        self.project_filter.as_deref().unwrap_or_default()
    }
}

/// Read a string environment variable with a default
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean environment variable (absent or unparseable = false)
pub fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false)
}

/// Split a comma-separated value into its non-empty entries
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_project_filter_is_a_config_error() {
        let config = AuditConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("project filter"));
    }

    #[test]
    fn test_pubsub_sink_requires_project() {
        let config = AuditConfig {
            project_filter: Some("prod-*".to_string()),
            reports_pubsub: true,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PubSub project"));
    }

    #[test]
    fn test_valid_config_passes() {
        let config = AuditConfig {
            project_filter: Some("prod-*".to_string()),
            reports_stdout: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_split_csv_drops_empty_entries() {
        assert_eq!(
            split_csv("a, b,,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_csv("").is_empty());
    }
}
