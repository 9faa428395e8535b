//! GKE collection

use super::{for_each_project, Collected};
use crate::gcp::client::GcpClient;
use crate::gcp::projects::Project;
use crate::view::container::ClusterView;
use anyhow::{Context, Result};

const CONTAINER_API: &str = "container.googleapis.com";

/// Collect the GKE clusters for all projects. Node pools are carried
/// inside each cluster payload and materialized at evaluation time.
/// Projects without the container API enabled yield an empty result.
pub async fn collect(
    client: &GcpClient,
    projects: &[Project],
    concurrency: usize,
) -> Collected<Vec<ClusterView>> {
    for_each_project(projects, concurrency, |project| async move {
        if !project.has_service(CONTAINER_API) {
            tracing::debug!(
                "Skipping container collection for {} (API not enabled)",
                project.project_id
            );
            return Ok(Vec::new());
        }

        collect_project(client, &project.project_id).await
    })
    .await
}

async fn collect_project(client: &GcpClient, project_id: &str) -> Result<Vec<ClusterView>> {
    // `locations/-` lists clusters across every zone and region at once
    let url = client.container_url(project_id, "locations/-/clusters");
    let response = client
        .get(&url)
        .await
        .with_context(|| format!("Error retrieving container clusters in project {project_id}"))?;

    Ok(response
        .get("clusters")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(ClusterView::new)
        .collect())
}
