//! Cloud Storage collection

use super::{for_each_project, Collected};
use crate::gcp::client::{append_query, GcpClient};
use crate::gcp::projects::Project;
use crate::view::storage::BucketView;
use anyhow::{Context, Result};
use serde_json::Value;

/// Collect the storage buckets (with their ACLs) for all projects
pub async fn collect(
    client: &GcpClient,
    projects: &[Project],
    concurrency: usize,
) -> Collected<Vec<BucketView>> {
    for_each_project(projects, concurrency, |project| async move {
        collect_project(client, &project.project_id).await
    })
    .await
}

async fn collect_project(client: &GcpClient, project_id: &str) -> Result<Vec<BucketView>> {
    let url = append_query(&client.storage_url("b"), "project", project_id);
    let items = client
        .get_paginated(&url, "items")
        .await
        .with_context(|| format!("Error retrieving project {project_id}'s bucket list"))?;

    let mut buckets = Vec::new();

    for mut bucket in items {
        let name = bucket
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("-")
            .to_string();

        // ACLs are not included in the list call. The ACL endpoint
        // returns 400 for buckets with Bucket Policy Only enabled; such
        // buckets are skipped rather than failing the project.
        let acl_url = client.storage_url(&format!("b/{name}/acl"));
        let acls = match client.get(&acl_url).await {
            Ok(response) => response
                .get("items")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
            Err(e) => {
                tracing::debug!("Skipping bucket {name}: could not list ACLs: {e:#}");
                continue;
            }
        };

        if let Value::Object(ref mut map) = bucket {
            map.insert("acl".to_string(), Value::Array(acls));
        }

        buckets.push(BucketView::new(bucket));
    }

    Ok(buckets)
}
