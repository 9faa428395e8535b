//! Compute Engine resource views

use super::{metadata_key_absent, metadata_key_equals};
use serde_json::Value;

/// The Compute Engine view of an audited project
#[derive(Debug, Clone)]
pub struct ComputeProjectView {
    raw: Value,
}

impl ComputeProjectView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The project name (compute projects are named by their project id)
    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    /// Whether the project is a Shared VPC (Xpn) host project
    pub fn is_xpn_host(&self) -> bool {
        self.raw.get("xpnProjectStatus").and_then(|v| v.as_str()) == Some("HOST")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The project's common instance metadata
    pub fn common_instance_metadata(&self) -> ProjectMetadataView {
        ProjectMetadataView::new(
            self.raw
                .get("commonInstanceMetadata")
                .cloned()
                .unwrap_or(Value::Null),
        )
    }
}

/// A project's common instance metadata configuration
#[derive(Debug, Clone)]
pub struct ProjectMetadataView {
    raw: Value,
}

impl ProjectMetadataView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Whether the metadata key equals a given value.
    /// Reports an error if the metadata key does not exist.
    pub fn key_value_equals(&self, key: &str, value: &str) -> Result<(), String> {
        metadata_key_equals("Project", &self.raw, key, value)
    }

    /// Whether the metadata key is absent
    pub fn key_absent(&self, key: &str) -> bool {
        metadata_key_absent(&self.raw, key)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// A Compute Engine instance
#[derive(Debug, Clone)]
pub struct InstanceView {
    raw: Value,
}

impl InstanceView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether the instance has an external / NAT ip on its primary interface
    pub fn has_nat_ip(&self) -> bool {
        self.raw
            .pointer("/networkInterfaces/0/accessConfigs")
            .and_then(|v| v.as_array())
            .is_some_and(|configs| !configs.is_empty())
    }

    /// Whether the instance has the expected number of network interfaces
    pub fn has_num_network_interfaces(&self, num: usize) -> Result<(), String> {
        let actual = self
            .raw
            .get("networkInterfaces")
            .and_then(|v| v.as_array())
            .map(|a| a.len())
            .unwrap_or(0);

        if actual == num {
            Ok(())
        } else {
            Err(format!("Expected {num} interfaces, found {actual}"))
        }
    }

    /// Whether the instance metadata key equals a given value.
    /// Reports an error if the metadata key does not exist.
    pub fn key_value_equals(&self, key: &str, value: &str) -> Result<(), String> {
        let metadata = self.raw.get("metadata").cloned().unwrap_or(Value::Null);
        metadata_key_equals("Instance", &metadata, key, value)
    }

    /// Whether the instance metadata key is absent
    pub fn key_absent(&self, key: &str) -> bool {
        let metadata = self.raw.get("metadata").cloned().unwrap_or(Value::Null);
        metadata_key_absent(&metadata, key)
    }

    /// Whether the service account used to launch the instance is a
    /// default compute service account for any project
    pub fn uses_default_service_account(&self) -> bool {
        self.raw
            .get("serviceAccounts")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|sa| sa.get("email").and_then(|v| v.as_str()))
            .any(|email| email.contains("-compute@developer.gserviceaccount.com"))
    }

    /// Whether the instance can forward packets for different sources
    pub fn has_ip_forwarding_enabled(&self) -> bool {
        self.raw
            .get("canIpForward")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Whether every attached disk is encrypted with a customer-supplied key
    pub fn uses_customer_supplied_encryption_keys(&self) -> Result<(), String> {
        let mut errors = String::new();

        for disk in self
            .raw
            .get("disks")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            if disk.get("diskEncryptionKey").is_none() {
                let source = disk.get("source").and_then(|v| v.as_str()).unwrap_or("-");
                errors.push_str(&format!("Disk does not use CSEK: {source}. "));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(value: Value) -> InstanceView {
        InstanceView::new(value)
    }

    #[test]
    fn test_nat_ip_detection() {
        let with_nat = instance(json!({
            "name": "vm-1",
            "networkInterfaces": [
                {"accessConfigs": [{"natIP": "1.2.3.4", "type": "ONE_TO_ONE_NAT"}]}
            ]
        }));
        assert!(with_nat.has_nat_ip());

        let without_nat = instance(json!({
            "name": "vm-2",
            "networkInterfaces": [{"network": "default"}]
        }));
        assert!(!without_nat.has_nat_ip());

        // No interfaces at all should not panic
        let no_interfaces = instance(json!({"name": "vm-3"}));
        assert!(!no_interfaces.has_nat_ip());
    }

    #[test]
    fn test_num_network_interfaces() {
        let one_nic = instance(json!({"networkInterfaces": [{}]}));
        assert!(one_nic.has_num_network_interfaces(1).is_ok());

        let err = one_nic.has_num_network_interfaces(2).unwrap_err();
        assert_eq!(err, "Expected 2 interfaces, found 1");
    }

    #[test]
    fn test_default_service_account() {
        let default_sa = instance(json!({
            "serviceAccounts": [{"email": "12345-compute@developer.gserviceaccount.com"}]
        }));
        assert!(default_sa.uses_default_service_account());

        let custom_sa = instance(json!({
            "serviceAccounts": [{"email": "audit@my-project.iam.gserviceaccount.com"}]
        }));
        assert!(!custom_sa.uses_default_service_account());
    }

    #[test]
    fn test_csek_reports_each_unencrypted_disk() {
        let mixed = instance(json!({
            "disks": [
                {"source": "disk-a", "diskEncryptionKey": {"sha256": "abc"}},
                {"source": "disk-b"}
            ]
        }));

        let err = mixed.uses_customer_supplied_encryption_keys().unwrap_err();
        assert!(err.contains("disk-b"));
        assert!(!err.contains("disk-a"));
    }

    #[test]
    fn test_project_metadata_view() {
        let project = ComputeProjectView::new(json!({
            "name": "audited-project",
            "commonInstanceMetadata": {
                "items": [{"key": "enable-oslogin", "value": "true"}]
            }
        }));

        assert_eq!(project.name(), "audited-project");
        let metadata = project.common_instance_metadata();
        assert!(metadata.key_value_equals("enable-oslogin", "true").is_ok());
        assert!(metadata.key_absent("serial-port-enable"));
    }
}
