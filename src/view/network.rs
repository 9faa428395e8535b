//! Compute Engine networking resource views

use super::short_name;
use serde_json::Value;

/// A Compute Engine VPC network
#[derive(Debug, Clone)]
pub struct NetworkView {
    raw: Value,
}

impl NetworkView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether the network is the `default` network that comes with a
    /// project that just enabled its Compute API
    pub fn is_default(&self) -> bool {
        self.name() == "default"
    }

    /// Whether the network is a legacy (non-subnet) network.
    /// A non-empty IPv4Range marks a legacy network.
    pub fn is_legacy(&self) -> bool {
        self.raw
            .get("IPv4Range")
            .and_then(|v| v.as_str())
            .is_some_and(|r| !r.is_empty())
    }
}

/// A Compute Engine subnetwork
#[derive(Debug, Clone)]
pub struct SubnetworkView {
    raw: Value,
}

impl SubnetworkView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    /// The region of the subnetwork (short name, not the resource URL)
    pub fn region(&self) -> &str {
        self.raw
            .get("region")
            .and_then(|v| v.as_str())
            .map(short_name)
            .unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether private Google network access is enabled
    pub fn is_private_google_access_enabled(&self) -> bool {
        self.raw
            .get("privateIpGoogleAccess")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Whether the subnet has VPC flow logs enabled
    pub fn is_flow_logs_enabled(&self) -> bool {
        self.raw
            .get("enableFlowLogs")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// A Compute Engine firewall rule
#[derive(Debug, Clone)]
pub struct FirewallRuleView {
    raw: Value,
}

impl FirewallRuleView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    /// The network the firewall rule resides within (short name)
    pub fn network(&self) -> &str {
        self.raw
            .get("network")
            .and_then(|v| v.as_str())
            .map(short_name)
            .unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether a given CIDR range is allowed as a source by this rule
    pub fn allows_source_range(&self, source_range: &str) -> bool {
        self.raw
            .get("sourceRanges")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
            .any(|range| range == source_range)
    }

    /// Whether a given protocol:port combination is allowed by this rule.
    /// Protocol comparison is case-insensitive (the API echoes whatever
    /// casing the rule was created with).
    pub fn allows_protocol_port(&self, protocol: &str, port: &str) -> bool {
        self.raw
            .get("allowed")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter(|rule| {
                rule.get("IPProtocol")
                    .and_then(|v| v.as_str())
                    .is_some_and(|p| p.eq_ignore_ascii_case(protocol))
            })
            .any(|rule| {
                rule.get("ports")
                    .and_then(|v| v.as_array())
                    .into_iter()
                    .flatten()
                    .filter_map(|v| v.as_str())
                    .any(|p| p == port)
            })
    }
}

/// A Compute Engine address (reserved external or internal IP)
#[derive(Debug, Clone)]
pub struct AddressView {
    raw: Value,
}

impl AddressView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}
