//! Compute Engine collection

use super::{for_each_project, Collected};
use crate::gcp::client::GcpClient;
use crate::gcp::projects::Project;
use crate::view::compute::{ComputeProjectView, InstanceView};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};

const COMPUTE_API: &str = "compute.googleapis.com";

/// Compute resources discovered for one project
#[derive(Default)]
pub struct ComputeResources {
    /// The Compute Engine view of the project itself (carries the
    /// common instance metadata). Absent when the API is not enabled.
    pub project: Option<ComputeProjectView>,
    pub instances: Vec<InstanceView>,
}

/// Collect compute resources across all projects. Projects without the
/// compute API enabled yield an empty result rather than an error.
pub async fn collect(
    client: &GcpClient,
    projects: &[Project],
    zones: &[String],
    concurrency: usize,
) -> Collected<ComputeResources> {
    for_each_project(projects, concurrency, |project| async move {
        if !project.has_service(COMPUTE_API) {
            tracing::debug!(
                "Skipping compute collection for {} (API not enabled)",
                project.project_id
            );
            return Ok(ComputeResources::default());
        }

        collect_project(client, &project.project_id, zones, concurrency).await
    })
    .await
}

async fn collect_project(
    client: &GcpClient,
    project_id: &str,
    zones: &[String],
    concurrency: usize,
) -> Result<ComputeResources> {
    let project_url = client.compute_url(project_id, "");
    let project_url = project_url.trim_end_matches('/');
    let raw_project = client
        .get(project_url)
        .await
        .with_context(|| format!("Error retrieving project {project_id}'s metadata"))?;

    // One bounded fan-out over zones inside this project's worker
    let zone_results: Vec<Result<Vec<InstanceView>>> = stream::iter(zones)
        .map(|zone| async move {
            let url = client.compute_zonal_url(project_id, zone, "instances");
            let items = client
                .get_paginated(&url, "items")
                .await
                .with_context(|| {
                    format!("Error retrieving project {project_id}'s instances in zone {zone}")
                })?;
            Ok(items.into_iter().map(InstanceView::new).collect())
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut instances = Vec::new();
    for result in zone_results {
        instances.extend(result?);
    }

    Ok(ComputeResources {
        project: Some(ComputeProjectView::new(raw_project)),
        instances,
    })
}
