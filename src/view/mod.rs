//! Resource views
//!
//! Read-only wrappers around the raw JSON objects returned by the
//! provider APIs. Each view exposes the named predicates the checks
//! evaluate; none of them mutate the wrapped object.
//!
//! - [`compute`] - compute project, common-instance metadata, instances
//! - [`network`] - networks, subnetworks, firewall rules, addresses
//! - [`storage`] - storage buckets (with merged ACLs)
//! - [`iam`] - project IAM policy, service accounts
//! - [`logging`] - logging sinks and log-based metrics
//! - [`container`] - GKE clusters and node pools

pub mod compute;
pub mod container;
pub mod iam;
pub mod logging;
pub mod network;
pub mod storage;

use serde_json::Value;

/// Look up a key in a GCP metadata object (`{"items": [{"key", "value"}]}`)
fn metadata_value<'a>(metadata: &'a Value, key: &str) -> Option<&'a str> {
    metadata
        .get("items")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .find(|item| item.get("key").and_then(|k| k.as_str()) == Some(key))
        .and_then(|item| item.get("value").and_then(|v| v.as_str()))
}

/// Whether a metadata key is absent
pub(crate) fn metadata_key_absent(metadata: &Value, key: &str) -> bool {
    metadata_value(metadata, key).is_none()
}

/// Whether a metadata key equals a given value (case-insensitive).
///
/// Absence of the key is an evaluation error, not a pass: only checks
/// with an explicit secure default (e.g. `serial-port-enable`) may treat
/// a missing key as compliant, and they do so by consulting
/// [`metadata_key_absent`] first.
pub(crate) fn metadata_key_equals(
    scope: &str,
    metadata: &Value,
    key: &str,
    want: &str,
) -> Result<(), String> {
    match metadata_value(metadata, key) {
        Some(value) if value.eq_ignore_ascii_case(want) => Ok(()),
        Some(value) => Err(format!("{scope} metadata key '{key}' is set to '{value}'")),
        None => Err(format!("Could not find {} metadata key: {key}", scope.to_lowercase())),
    }
}

/// Extract the trailing path segment of a GCP resource URL
/// (e.g. `.../regions/us-east1` -> `us-east1`)
pub(crate) fn short_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
