//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality. Every service consumed by the auditor gets a
//! URL builder here; base URLs live in [`ApiEndpoints`] so tests can
//! point the client at a mock server.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;

/// Base URLs for the GCP services consumed by an audit
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub compute: String,
    pub storage: String,
    pub container: String,
    pub iam: String,
    pub logging: String,
    pub serviceusage: String,
    pub resourcemanager: String,
    pub pubsub: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            storage: "https://storage.googleapis.com/storage/v1".to_string(),
            container: "https://container.googleapis.com/v1".to_string(),
            iam: "https://iam.googleapis.com/v1".to_string(),
            logging: "https://logging.googleapis.com/v2".to_string(),
            serviceusage: "https://serviceusage.googleapis.com/v1".to_string(),
            resourcemanager: "https://cloudresourcemanager.googleapis.com/v1".to_string(),
            pubsub: "https://pubsub.googleapis.com/v1".to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Point every service at a single base URL (mock server in tests)
    pub fn with_base(base: &str) -> Self {
        Self {
            compute: format!("{base}/compute/v1"),
            storage: format!("{base}/storage/v1"),
            container: format!("{base}/container/v1"),
            iam: format!("{base}/iam/v1"),
            logging: format!("{base}/logging/v2"),
            serviceusage: format!("{base}/serviceusage/v1"),
            resourcemanager: format!("{base}/resourcemanager/v1"),
            pubsub: format!("{base}/pubsub/v1"),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub endpoints: ApiEndpoints,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            endpoints: ApiEndpoints::default(),
        })
    }

    /// Create a client with fixed credentials and endpoints (tests)
    pub fn with_endpoints(credentials: GcpCredentials, endpoints: ApiEndpoints) -> Result<Self> {
        let http = GcpHttpClient::new()?;
        Ok(Self {
            credentials,
            http,
            endpoints,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Fetch all pages of a list call, following `nextPageToken` until
    /// exhausted, and collect the array found under `items_key`.
    ///
    /// A page without `items_key` contributes nothing (GCP omits empty
    /// collections rather than returning `[]`).
    pub async fn get_paginated(&self, url: &str, items_key: &str) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_url = match &page_token {
                Some(token) => append_query(url, "pageToken", token),
                None => url.to_string(),
            };

            let response = self.get(&page_url).await?;

            if let Some(items) = response.get(items_key).and_then(|v| v.as_array()) {
                all_items.extend(items.iter().cloned());
            }

            page_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            if page_token.is_none() {
                break;
            }
        }

        Ok(all_items)
    }

    // =========================================================================
    // Compute Engine API
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, project: &str, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.compute, project, path)
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, project: &str, zone: &str, resource: &str) -> String {
        self.compute_url(project, &format!("zones/{zone}/{resource}"))
    }

    /// Build regional Compute Engine API URL
    pub fn compute_regional_url(&self, project: &str, region: &str, resource: &str) -> String {
        self.compute_url(project, &format!("regions/{region}/{resource}"))
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, project: &str, resource: &str) -> String {
        self.compute_url(project, &format!("global/{resource}"))
    }

    /// Build aggregated Compute Engine API URL (all scopes)
    pub fn compute_aggregated_url(&self, project: &str, resource: &str) -> String {
        self.compute_url(project, &format!("aggregated/{resource}"))
    }

    // =========================================================================
    // Cloud Storage API
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.storage, path)
    }

    // =========================================================================
    // GKE API
    // =========================================================================

    /// Build GKE API URL
    pub fn container_url(&self, project: &str, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.container, project, path)
    }

    // =========================================================================
    // IAM API
    // =========================================================================

    /// Build IAM API URL
    pub fn iam_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.iam, path)
    }

    // =========================================================================
    // Cloud Logging API
    // =========================================================================

    /// Build Cloud Logging API URL
    pub fn logging_url(&self, project: &str, resource: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.logging, project, resource)
    }

    // =========================================================================
    // Service Usage API
    // =========================================================================

    /// Build Service Usage API URL
    pub fn serviceusage_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.serviceusage, path)
    }

    // =========================================================================
    // Resource Manager API
    // =========================================================================

    /// Build Resource Manager API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.resourcemanager, path)
    }

    // =========================================================================
    // Pub/Sub API
    // =========================================================================

    /// Build Pub/Sub topic publish URL
    pub fn pubsub_publish_url(&self, project: &str, topic: &str) -> String {
        format!(
            "{}/projects/{}/topics/{}:publish",
            self.endpoints.pubsub, project, topic
        )
    }
}

/// Append a query parameter to a URL that may already carry a query string
pub fn append_query(url: &str, key: &str, value: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{key}={}", urlencoding::encode(value))
}

/// Flatten a compute `aggregated/*` response into a plain item list.
///
/// Aggregated responses nest items under per-scope keys:
/// `{"items": {"regions/us-east1": {"addresses": [...]}, ...}}`
pub fn flatten_aggregated(response: &Value, resource_key: &str) -> Vec<Value> {
    let mut flattened = Vec::new();

    if let Some(scopes) = response.get("items").and_then(|v| v.as_object()) {
        for scope in scopes.values() {
            if let Some(items) = scope.get(resource_key).and_then(|v| v.as_array()) {
                flattened.extend(items.iter().cloned());
            }
        }
    }

    flattened
}

/// Format a GCP API error for display
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    super::http::format_gcp_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_query_handles_existing_query_string() {
        assert_eq!(
            append_query("http://x/y", "pageToken", "abc"),
            "http://x/y?pageToken=abc"
        );
        assert_eq!(
            append_query("http://x/y?filter=f", "pageToken", "a b"),
            "http://x/y?filter=f&pageToken=a%20b"
        );
    }

    #[test]
    fn test_flatten_aggregated_collects_all_scopes() {
        let response = json!({
            "items": {
                "regions/us-east1": {"addresses": [{"name": "a"}]},
                "regions/eu-west1": {"addresses": [{"name": "b"}, {"name": "c"}]},
                "regions/empty": {"warning": {"code": "NO_RESULTS_ON_PAGE"}}
            }
        });

        let items = flatten_aggregated(&response, "addresses");
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = ApiEndpoints::with_base("http://127.0.0.1:9");
        assert_eq!(
            endpoints.compute,
            "http://127.0.0.1:9/compute/v1".to_string()
        );
    }
}
