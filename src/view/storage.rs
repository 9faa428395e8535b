//! Cloud Storage resource views

use serde_json::Value;

/// A Cloud Storage bucket, with its access controls merged in by the
/// collector (the list call does not include ACLs)
#[derive(Debug, Clone)]
pub struct BucketView {
    raw: Value,
}

impl BucketView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn acl_entities(&self) -> impl Iterator<Item = &str> {
        self.raw
            .get("acl")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|acl| acl.get("entity").and_then(|v| v.as_str()))
    }

    /// Whether the bucket is configured to be world readable.
    /// The `allUsers` entity denotes public access.
    pub fn allows_all_users(&self) -> bool {
        self.acl_entities().any(|e| e == "allUsers")
    }

    /// Whether the bucket is readable by anyone with a Google account.
    /// The `allAuthenticatedUsers` entity denotes such access.
    pub fn allows_all_authenticated_users(&self) -> bool {
        self.acl_entities().any(|e| e == "allAuthenticatedUsers")
    }

    /// Whether the bucket enforces permissions uniformly across the
    /// entire bucket (Bucket Policy Only)
    pub fn has_bucket_policy_only_enabled(&self) -> Result<bool, String> {
        let Some(iam_config) = self.raw.get("iamConfiguration") else {
            return Err(format!(
                "Could not retrieve IAM configuration for gs://{}",
                self.name()
            ));
        };

        Ok(iam_config
            .pointer("/bucketPolicyOnly/enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn private_bucket() -> Value {
        json!({
            "name": "my-test-bucket",
            "iamConfiguration": {"bucketPolicyOnly": {}},
            "acl": [
                {"entity": "project-owners-01010101010101", "role": "OWNER"},
                {"entity": "project-editors-01010101010101", "role": "OWNER"},
                {"entity": "project-viewers-01010101010101", "role": "READER"}
            ]
        })
    }

    #[test]
    fn test_private_bucket_has_no_public_entities() {
        let bucket = BucketView::new(private_bucket());
        assert_eq!(bucket.name(), "my-test-bucket");
        assert!(!bucket.allows_all_users());
        assert!(!bucket.allows_all_authenticated_users());
    }

    #[test]
    fn test_all_users_entity_is_detected() {
        let mut raw = private_bucket();
        raw["acl"]
            .as_array_mut()
            .unwrap()
            .push(json!({"entity": "allUsers", "role": "READER"}));

        let bucket = BucketView::new(raw);
        assert!(bucket.allows_all_users());
        assert!(!bucket.allows_all_authenticated_users());
    }

    #[test]
    fn test_all_authenticated_users_entity_is_detected() {
        let mut raw = private_bucket();
        raw["acl"]
            .as_array_mut()
            .unwrap()
            .push(json!({"entity": "allAuthenticatedUsers", "role": "READER"}));

        let bucket = BucketView::new(raw);
        assert!(!bucket.allows_all_users());
        assert!(bucket.allows_all_authenticated_users());
    }

    #[test]
    fn test_bucket_policy_only() {
        let bucket = BucketView::new(private_bucket());
        assert_eq!(bucket.has_bucket_policy_only_enabled(), Ok(false));

        let enabled = BucketView::new(json!({
            "name": "b",
            "iamConfiguration": {"bucketPolicyOnly": {"enabled": true}}
        }));
        assert_eq!(enabled.has_bucket_policy_only_enabled(), Ok(true));

        let missing = BucketView::new(json!({"name": "b"}));
        assert!(missing.has_bucket_policy_only_enabled().is_err());
    }
}
