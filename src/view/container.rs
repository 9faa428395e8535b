//! GKE resource views

use serde_json::Value;

const LOGGING_SERVICE: &str = "logging.googleapis.com";
const MONITORING_SERVICE: &str = "monitoring.googleapis.com";

/// A GKE cluster
#[derive(Debug, Clone)]
pub struct ClusterView {
    raw: Value,
}

impl ClusterView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn bool_at(&self, pointer: &str) -> bool {
        self.raw
            .pointer(pointer)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// The node pools embedded in the cluster payload
    pub fn node_pools(&self) -> Vec<NodePoolView> {
        self.raw
            .get("nodePools")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .map(|np| NodePoolView::new(np.clone()))
            .collect()
    }

    /// Whether logging.googleapis.com is set as the logging service
    pub fn is_stackdriver_logging_enabled(&self) -> bool {
        self.raw.get("loggingService").and_then(|v| v.as_str()) == Some(LOGGING_SERVICE)
    }

    /// Whether monitoring.googleapis.com is set as the monitoring service
    pub fn is_stackdriver_monitoring_enabled(&self) -> bool {
        self.raw.get("monitoringService").and_then(|v| v.as_str()) == Some(MONITORING_SERVICE)
    }

    /// Whether (legacy) Attribute-Based Access Control is disabled.
    /// An absent legacyAbac block means ABAC is disabled.
    pub fn is_abac_disabled(&self) -> bool {
        !self.bool_at("/legacyAbac/enabled")
    }

    /// Whether the cluster restricts master access to authorized networks
    pub fn is_master_authorized_networks_enabled(&self) -> bool {
        self.bool_at("/masterAuthorizedNetworksConfig/enabled")
    }

    /// Whether the Kubernetes Dashboard add-on is disabled
    pub fn is_dashboard_addon_disabled(&self) -> bool {
        self.bool_at("/addonsConfig/kubernetesDashboard/disabled")
    }

    /// Whether the Network Policy add-on is enabled
    pub fn is_network_policy_addon_enabled(&self) -> bool {
        !self.bool_at("/addonsConfig/networkPolicyConfig/disabled")
    }

    /// Whether client certificate issuance is disabled.
    /// An absent clientCertificateConfig means no certificates are issued.
    pub fn is_client_certificate_disabled(&self) -> bool {
        !self.bool_at("/masterAuth/clientCertificateConfig/issueClientCertificate")
    }

    /// Whether basic (username/password) authentication is disabled
    pub fn is_master_auth_password_disabled(&self) -> bool {
        self.raw
            .pointer("/masterAuth/password")
            .and_then(|v| v.as_str())
            .map(|p| p.is_empty())
            .unwrap_or(true)
    }

    /// Whether the cluster uses VPC-native alias IP ranges
    pub fn is_alias_ip_enabled(&self) -> bool {
        self.bool_at("/ipAllocationPolicy/useIpAliases")
    }

    /// Whether the cluster master is only accessible on private networks
    pub fn is_master_private(&self) -> bool {
        self.bool_at("/privateClusterConfig/enablePrivateEndpoint")
    }

    /// Whether the cluster nodes are only accessible on private networks
    pub fn is_nodes_private(&self) -> bool {
        self.bool_at("/privateClusterConfig/enablePrivateNodes")
    }

    /// Whether the cluster nodes run as the default compute service account
    pub fn is_using_default_service_account(&self) -> bool {
        self.raw.pointer("/nodeConfig/serviceAccount").and_then(|v| v.as_str()) == Some("default")
    }

    /// Whether the cluster's granted OAuth scopes are limited to the
    /// configured minimal allow-list. Any capability outside the
    /// allow-list is reported individually by name.
    pub fn is_using_minimal_oauth_scopes(&self, minimal_scopes: &[String]) -> Result<(), String> {
        let extra_scopes: Vec<&str> = self
            .raw
            .pointer("/nodeConfig/oauthScopes")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
            .filter(|scope| !minimal_scopes.iter().any(|m| m == scope))
            .collect();

        if extra_scopes.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "Cluster is not using minimal scopes. The following scopes are not considered minimal: {extra_scopes:?}"
            ))
        }
    }
}

/// A GKE node pool
#[derive(Debug, Clone)]
pub struct NodePoolView {
    raw: Value,
}

impl NodePoolView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether the node pool has legacy metadata APIs disabled
    pub fn is_legacy_metadata_api_disabled(&self) -> Result<(), String> {
        match self
            .raw
            .pointer("/config/metadata/disable-legacy-endpoints")
            .and_then(|v| v.as_str())
        {
            None => Err("Could not find key 'disable-legacy-endpoints'".to_string()),
            Some("true") => Ok(()),
            Some(val) => Err(format!(
                "Invalid value for 'disable-legacy-endpoints', got '{val}'"
            )),
        }
    }

    /// Whether the node pool automatically repairs on error
    pub fn is_auto_repair_enabled(&self) -> bool {
        self.raw
            .pointer("/management/autoRepair")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Whether the node pool automatically upgrades GKE versions
    pub fn is_auto_upgrade_enabled(&self) -> bool {
        self.raw
            .pointer("/management/autoUpgrade")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Whether the node pool's OS distribution is the expected type
    pub fn distribution_type_is(&self, expected: &str) -> Result<(), String> {
        let actual = self
            .raw
            .pointer("/config/imageType")
            .and_then(|v| v.as_str())
            .unwrap_or("-");

        if actual == expected {
            Ok(())
        } else {
            Err(format!("Node pool is using {actual}, not {expected}"))
        }
    }
}
