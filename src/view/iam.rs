//! IAM resource views
//!
//! The project IAM policy is a project-level aggregate: one view per
//! project, consulted by several recommendation checks. Service
//! accounts carry their user-managed keys, merged in by the collector.

use chrono::{DateTime, Utc};
use serde_json::Value;

const EDITOR_ROLE: &str = "roles/editor";
const SERVICE_ACCOUNT_USER_ROLE: &str = "roles/iam.serviceAccountUser";
const SERVICE_ACCOUNT_ADMIN_ROLE: &str = "roles/iam.serviceAccountAdmin";
const KMS_ADMIN_ROLE: &str = "roles/cloudkms.admin";
const KMS_ROLE_MATCHER: &str = "roles/cloudkms.";

/// Cloud Audit log types a compliant policy must configure
const LOG_TYPES: &[&str] = &["ADMIN_READ", "DATA_READ", "DATA_WRITE"];

/// Whether a member is a service account managed by the platform itself
fn is_gcp_managed_account(member: &str) -> bool {
    member.contains("developer.gserviceaccount.com") || member.contains("appspot.gserviceaccount.com")
}

/// Whether a role grants broad administrative capability
fn is_admin_role(role: &str) -> bool {
    role.contains("admin") || role.contains("owner") || role.contains("editor")
}

/// Whether a member is a human/group/domain principal (as opposed to a
/// service-managed principal)
fn is_user_member(member: &str) -> bool {
    member.starts_with("user:") || member.starts_with("group:") || member.starts_with("domain:")
}

/// A project's IAM policy
#[derive(Debug, Clone)]
pub struct IamPolicyView {
    raw: Value,
}

impl IamPolicyView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn bindings(&self) -> impl Iterator<Item = &Value> {
        self.raw
            .get("bindings")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
    }

    fn binding_members(binding: &Value) -> impl Iterator<Item = &str> {
        binding
            .get("members")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|m| m.as_str())
    }

    /// The member list of the single binding for `role`.
    ///
    /// A policy with more than one binding for the same role (e.g.
    /// conditional bindings) is ambiguous for the role-overlap checks;
    /// it is reported as an evaluation error and never merged.
    fn members_with_role(&self, role: &str) -> Result<Vec<&str>, String> {
        let mut matching = self.bindings().filter(|b| {
            b.get("role").and_then(|v| v.as_str()) == Some(role)
        });

        let Some(binding) = matching.next() else {
            return Ok(Vec::new());
        };

        if matching.next().is_some() {
            return Err(format!(
                "Policy has multiple bindings for role {role}; cannot evaluate unambiguously"
            ));
        }

        Ok(Self::binding_members(binding).collect())
    }

    /// Whether the policy grants a role to a human-type member outside
    /// the allowed domains. An empty whitelist disables the check; a
    /// member passes if it matches any one of the allowed domains.
    pub fn violates_user_domain_whitelist(&self, allowed_domains: &[String]) -> Result<(), String> {
        if allowed_domains.is_empty() {
            return Ok(());
        }

        let mut errors = String::new();
        for binding in self.bindings() {
            for member in Self::binding_members(binding) {
                if is_user_member(member)
                    && !allowed_domains.iter().any(|d| member.contains(d.as_str()))
                {
                    errors.push_str(&format!(
                        "{member} is not allowed by your domain whitelist. "
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether a given member holds an admin-like role.
    ///
    /// Default compute and appengine service accounts are allowed to
    /// hold exactly the `editor` role.
    pub fn member_has_admin_role(&self, member: &str) -> Result<(), String> {
        for binding in self.bindings() {
            let role = binding.get("role").and_then(|v| v.as_str()).unwrap_or("");
            if Self::binding_members(binding).any(|m| m == member) && is_admin_role(role) {
                if is_gcp_managed_account(member) && role == EDITOR_ROLE {
                    continue;
                }
                return Err(format!("Member has admin role {role}"));
            }
        }
        Ok(())
    }

    /// Whether the policy lets human-type members impersonate service
    /// accounts project-wide (privilege escalation)
    pub fn allows_user_service_account_user_role(&self) -> Result<(), String> {
        let members = self.members_with_role(SERVICE_ACCOUNT_USER_ROLE)?;

        let mut errors = String::new();
        for member in members {
            if is_user_member(member) {
                errors.push_str(&format!("{member} has Service Account User role. "));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Members holding both roles, in the first role's member order
    fn members_with_overlapping_roles(
        &self,
        role_a: &str,
        role_b: &str,
    ) -> Result<Vec<String>, String> {
        let a_members = self.members_with_role(role_a)?;
        let b_members = self.members_with_role(role_b)?;

        Ok(a_members
            .iter()
            .filter(|m| b_members.contains(m))
            .map(|m| m.to_string())
            .collect())
    }

    /// Whether the policy allows IAM users to both administrate and
    /// impersonate service accounts
    pub fn violates_service_account_separation_of_duties(&self) -> Result<(), String> {
        let overlap = self
            .members_with_overlapping_roles(SERVICE_ACCOUNT_ADMIN_ROLE, SERVICE_ACCOUNT_USER_ROLE)?;

        let mut errors = String::new();
        for member in &overlap {
            errors.push_str(&format!(
                "{member} can both administrate and impersonate service accounts. "
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether the policy allows KMS users to both administrate keyrings
    /// and encrypt/decrypt with keys
    pub fn violates_kms_separation_of_duties(&self) -> Result<(), String> {
        // Without an admin binding there is nothing to overlap with
        if self.members_with_role(KMS_ADMIN_ROLE)?.is_empty() {
            return Ok(());
        }

        let kms_roles: Vec<String> = self
            .bindings()
            .filter_map(|b| b.get("role").and_then(|v| v.as_str()))
            .filter(|role| *role != KMS_ADMIN_ROLE && role.contains(KMS_ROLE_MATCHER))
            .map(|role| role.to_string())
            .collect();

        let mut errors = String::new();
        for role in &kms_roles {
            let overlap = self.members_with_overlapping_roles(KMS_ADMIN_ROLE, role)?;
            for member in &overlap {
                errors.push_str(&format!(
                    "{member} can both administrate and perform actions with {role}. "
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether the policy defines Cloud Audit logging for all services
    /// with all required log types
    pub fn configures_audit_logging(&self) -> Result<(), String> {
        let Some(configs) = self.raw.get("auditConfigs").and_then(|v| v.as_array()) else {
            return Err("Policy does not define auditConfigs".to_string());
        };

        let Some(first) = configs.first() else {
            return Err("Policy does not define auditConfigs".to_string());
        };

        if first.get("service").and_then(|v| v.as_str()) != Some("allServices") {
            return Err("allServices is not the default audit config policy".to_string());
        }

        let Some(log_configs) = first.get("auditLogConfigs").and_then(|v| v.as_array()) else {
            return Err("Policy does not define auditLogConfigs".to_string());
        };

        if log_configs.len() != LOG_TYPES.len() {
            return Err(
                "Policy does not define all required log types (requires ADMIN_READ, DATA_READ, DATA_WRITE)"
                    .to_string(),
            );
        }

        for cfg in log_configs {
            let log_type = cfg.get("logType").and_then(|v| v.as_str()).unwrap_or("");
            if !LOG_TYPES.contains(&log_type) {
                return Err("Policy has an unrecognized auditLogConfig type".to_string());
            }
        }

        Ok(())
    }

    /// Whether the policy allows any member to be exempted from audit logging
    pub fn has_no_audit_log_exceptions(&self) -> Result<(), String> {
        let Some(configs) = self.raw.get("auditConfigs").and_then(|v| v.as_array()) else {
            return Err("Policy does not define auditConfigs".to_string());
        };

        let mut errors = String::new();
        for cfg in configs {
            for log_config in cfg
                .get("auditLogConfigs")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
            {
                let exempted: Vec<&str> = log_config
                    .get("exemptedMembers")
                    .and_then(|v| v.as_array())
                    .into_iter()
                    .flatten()
                    .filter_map(|m| m.as_str())
                    .collect();

                if !exempted.is_empty() {
                    let log_type = log_config
                        .get("logType")
                        .and_then(|v| v.as_str())
                        .unwrap_or("-");
                    errors.push_str(&format!(
                        "{log_type} has the following exceptions: {}. ",
                        exempted.join(",")
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// An IAM service account with its user-managed keys
#[derive(Debug, Clone)]
pub struct ServiceAccountView {
    raw: Value,
    keys: Vec<Value>,
}

impl ServiceAccountView {
    pub fn new(raw: Value, keys: Vec<Value>) -> Self {
        Self { raw, keys }
    }

    /// The email address of the service account
    pub fn email(&self) -> &str {
        self.raw.get("email").and_then(|v| v.as_str()).unwrap_or("-")
    }

    /// The provider-assigned unique id of the service account
    pub fn unique_id(&self) -> &str {
        self.raw
            .get("uniqueId")
            .and_then(|v| v.as_str())
            .unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether the service account has user-managed keys
    pub fn has_user_managed_keys(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Whether any user-managed key is older than the allowed rotation
    /// window. Unparseable key timestamps are evaluation errors.
    pub fn has_keys_needing_rotation(&self, max_age_days: i64) -> Result<(), String> {
        let mut errors = String::new();

        for key in &self.keys {
            let name = key.get("name").and_then(|v| v.as_str()).unwrap_or("-");
            let valid_after = key
                .get("validAfterTime")
                .and_then(|v| v.as_str())
                .unwrap_or("");

            let created = DateTime::parse_from_rfc3339(valid_after)
                .map_err(|e| format!("Failed to parse timestamp for key {name}: {e}"))?;

            let age = Utc::now().signed_duration_since(created.with_timezone(&Utc));
            if age.num_days() > max_age_days {
                errors.push_str(&format!("{name} has key older than {max_age_days} days. "));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
