//! Resource collection
//!
//! One collector per resource category. Each collector fans out over
//! the in-scope projects with bounded concurrency, follows pagination,
//! honors per-project API-enablement gating, and stores one outcome per
//! project: either the collected resource views or the reason the
//! project could not be collected.
//!
//! - [`compute`] - compute project, common metadata, instances (per zone)
//! - [`network`] - networks, subnetworks, firewall rules, addresses
//! - [`storage`] - buckets with merged ACLs
//! - [`iam`] - project IAM policy, service accounts and their keys
//! - [`logging`] - logging sinks and log-based metrics
//! - [`container`] - GKE clusters (node pools ride along in the payload)

pub mod compute;
pub mod container;
pub mod iam;
pub mod logging;
pub mod network;
pub mod storage;

use crate::gcp::client::GcpClient;
use crate::gcp::projects::Project;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;

/// What came back for one project: its resources, or why collection failed
pub type ProjectOutcome<T> = Result<T, anyhow::Error>;

/// A category's collection results, indexed by project id
pub struct Collected<T> {
    outcomes: HashMap<String, ProjectOutcome<T>>,
}

impl<T> Collected<T> {
    pub fn get(&self, project_id: &str) -> Option<&ProjectOutcome<T>> {
        self.outcomes.get(project_id)
    }

    /// Fail on the first project whose collection failed. This is the
    /// default completeness policy: partial compliance results are
    /// misleading, so an incomplete category aborts the run unless the
    /// caller opted into `continue_on_error`.
    pub fn ensure_complete(&self) -> Result<()> {
        for (project_id, outcome) in &self.outcomes {
            if let Err(e) = outcome {
                return Err(anyhow::anyhow!(
                    "Collection failed for project {project_id}: {e:#}"
                ));
            }
        }
        Ok(())
    }
}

/// Run `f` once per project with at most `concurrency` workers in
/// flight, and gather every project's outcome. The fan-in side always
/// receives exactly one outcome per project; a worker failure becomes
/// that project's error outcome rather than tearing down its peers.
pub async fn for_each_project<'a, T, F, Fut>(
    projects: &'a [Project],
    concurrency: usize,
    f: F,
) -> Collected<T>
where
    F: Fn(&'a Project) -> Fut,
    Fut: Future<Output = Result<T>> + 'a,
{
    let outcomes: HashMap<String, ProjectOutcome<T>> = stream::iter(projects)
        .map(|project| {
            let outcome = f(project);
            async move { (project.project_id.clone(), outcome.await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    Collected { outcomes }
}

/// Fetch the zone names visible to the audit. Zones are identical
/// across projects, so the first project whose compute API answers
/// wins.
pub async fn zone_names(client: &GcpClient, projects: &[Project]) -> Result<Vec<String>> {
    location_names(client, projects, "zones").await
}

/// Fetch the region names visible to the audit, from the first project
/// whose compute API answers.
pub async fn region_names(client: &GcpClient, projects: &[Project]) -> Result<Vec<String>> {
    location_names(client, projects, "regions").await
}

async fn location_names(
    client: &GcpClient,
    projects: &[Project],
    resource: &str,
) -> Result<Vec<String>> {
    let mut last_error = None;

    for project in projects {
        if !project.has_service("compute.googleapis.com") {
            continue;
        }

        let url = client.compute_url(&project.project_id, resource);
        match client.get_paginated(&url, "items").await {
            Ok(items) => {
                return Ok(items
                    .iter()
                    .filter_map(|z| z.get("name").and_then(|v| v.as_str()))
                    .map(|s| s.to_string())
                    .collect());
            }
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(anyhow::anyhow!(
            "Error retrieving {resource} list from any project: {e:#}"
        )),
        // No project has the compute API; nothing zonal will be collected
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(id: &str) -> Project {
        let mut p = Project::from(&json!({"projectId": id, "name": id}));
        p.services = vec!["projects/1/services/compute.googleapis.com".to_string()];
        p
    }

    #[tokio::test]
    async fn test_for_each_project_returns_one_outcome_per_project() {
        let projects = vec![project("a"), project("b"), project("c")];

        let collected = for_each_project(&projects, 2, |p| {
            let id = p.project_id.clone();
            async move {
                if id == "b" {
                    Err(anyhow::anyhow!("boom"))
                } else {
                    Ok(id.len())
                }
            }
        })
        .await;

        assert!(matches!(collected.get("a"), Some(Ok(1))));
        assert!(matches!(collected.get("b"), Some(Err(_))));
        assert!(matches!(collected.get("c"), Some(Ok(1))));
        assert!(collected.ensure_complete().is_err());
    }

    #[tokio::test]
    async fn test_ensure_complete_passes_when_all_projects_collected() {
        let projects = vec![project("a"), project("b")];
        let collected = for_each_project(&projects, 8, |_| async { Ok(()) }).await;
        assert!(collected.ensure_complete().is_ok());
    }
}
