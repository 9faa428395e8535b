//! Cloud Logging collection

use super::{for_each_project, Collected};
use crate::gcp::client::GcpClient;
use crate::gcp::projects::Project;
use crate::view::logging::{LogMetricView, LogSinkView};
use anyhow::{Context, Result};

/// Logging configuration discovered for one project
#[derive(Default)]
pub struct LoggingResources {
    pub sinks: Vec<LogSinkView>,
    pub metrics: Vec<LogMetricView>,
}

/// Collect the logging sinks and log-based metrics for all projects
pub async fn collect(
    client: &GcpClient,
    projects: &[Project],
    concurrency: usize,
) -> Collected<LoggingResources> {
    for_each_project(projects, concurrency, |project| async move {
        collect_project(client, &project.project_id).await
    })
    .await
}

async fn collect_project(client: &GcpClient, project_id: &str) -> Result<LoggingResources> {
    let url = client.logging_url(project_id, "sinks");
    let sinks = client
        .get_paginated(&url, "sinks")
        .await
        .with_context(|| format!("Failed to retrieve logging sinks for project {project_id}"))?;

    let url = client.logging_url(project_id, "metrics");
    let metrics = client
        .get_paginated(&url, "metrics")
        .await
        .with_context(|| format!("Failed to retrieve log metrics for project {project_id}"))?;

    Ok(LoggingResources {
        sinks: sinks.into_iter().map(LogSinkView::new).collect(),
        metrics: metrics.into_iter().map(LogMetricView::new).collect(),
    })
}
