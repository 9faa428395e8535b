//! GCP Projects
//!
//! Project discovery for an audit run: a filtered, paginated
//! `projects.list` call followed by a bounded fan-out fetching each
//! project's enabled service APIs.

use super::client::{append_query, GcpClient};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde_json::Value;

/// A cloud project in scope for the audit
#[derive(Debug, Clone)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    pub project_number: String,
    /// Names of the service APIs enabled on this project
    pub services: Vec<String>,
}

impl From<&Value> for Project {
    fn from(value: &Value) -> Self {
        Self {
            project_id: value
                .get("projectId")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            name: value
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            project_number: value
                .get("projectNumber")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            services: Vec::new(),
        }
    }
}

impl Project {
    /// Whether a service API is enabled for this project.
    ///
    /// Matches by substring against the recorded service names, which
    /// are fully qualified (`projects/123/services/compute.googleapis.com`).
    pub fn has_service(&self, service: &str) -> bool {
        self.services.iter().any(|s| s.contains(service))
    }
}

/// Discover all active projects matching the configured filter, along
/// with the service APIs enabled on each.
///
/// An empty result is an error: auditing nothing is always a
/// misconfiguration, not a clean run.
pub async fn discover(
    client: &GcpClient,
    filter: &str,
    concurrency: usize,
) -> Result<Vec<Project>> {
    // Only ACTIVE projects can be audited; any other lifecycle state
    // returns errors from the resource APIs.
    let full_filter = format!("name:{filter} AND lifecycleState=ACTIVE");
    let url = append_query(
        &client.resourcemanager_url("projects"),
        "filter",
        &full_filter,
    );

    let items = client
        .get_paginated(&url, "projects")
        .await
        .context("Failed to list projects")?;

    let mut projects: Vec<Project> = items.iter().map(Project::from).collect();

    if projects.is_empty() {
        return Err(anyhow::anyhow!(
            "No projects found when matching against '{full_filter}'"
        ));
    }

    tracing::info!("Discovered {} projects in scope", projects.len());

    // Fetch each project's enabled services with bounded concurrency
    let services: Vec<Result<(String, Vec<String>)>> = stream::iter(projects.iter())
        .map(|p| {
            let id = p.project_id.clone();
            async move {
                let services = list_enabled_services(client, &id).await?;
                Ok((id, services))
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for result in services {
        let (id, enabled) = result?;
        if let Some(project) = projects.iter_mut().find(|p| p.project_id == id) {
            project.services = enabled;
        }
    }

    Ok(projects)
}

/// List the enabled service API names for one project
async fn list_enabled_services(client: &GcpClient, project_id: &str) -> Result<Vec<String>> {
    let url = append_query(
        &client.serviceusage_url(&format!("projects/{project_id}/services")),
        "filter",
        "state:ENABLED",
    );

    let items = client
        .get_paginated(&url, "services")
        .await
        .with_context(|| format!("Failed to list services for project {project_id}"))?;

    Ok(items
        .iter()
        .filter_map(|s| s.get("name").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_from_value() {
        let value = json!({
            "projectId": "audit-me",
            "name": "Audit Me",
            "projectNumber": "1234",
            "lifecycleState": "ACTIVE"
        });

        let project = Project::from(&value);
        assert_eq!(project.project_id, "audit-me");
        assert_eq!(project.name, "Audit Me");
        assert!(project.services.is_empty());
    }

    #[test]
    fn test_has_service_matches_by_substring() {
        let mut project = Project::from(&json!({"projectId": "p"}));
        project.services = vec![
            "projects/1234/services/compute.googleapis.com".to_string(),
            "projects/1234/services/storage.googleapis.com".to_string(),
        ];

        assert!(project.has_service("compute.googleapis.com"));
        assert!(!project.has_service("container.googleapis.com"));
    }
}
