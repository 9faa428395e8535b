//! IAM collection

use super::{for_each_project, Collected};
use crate::gcp::client::{append_query, GcpClient};
use crate::gcp::projects::Project;
use crate::view::iam::{IamPolicyView, ServiceAccountView};
use anyhow::{Context, Result};
use serde_json::json;

/// IAM resources discovered for one project
pub struct IamResources {
    pub policy: IamPolicyView,
    pub service_accounts: Vec<ServiceAccountView>,
}

/// Collect the IAM policy and service accounts for all projects
pub async fn collect(
    client: &GcpClient,
    projects: &[Project],
    concurrency: usize,
) -> Collected<IamResources> {
    for_each_project(projects, concurrency, |project| async move {
        collect_project(client, &project.project_id).await
    })
    .await
}

async fn collect_project(client: &GcpClient, project_id: &str) -> Result<IamResources> {
    let url = client.resourcemanager_url(&format!("projects/{project_id}:getIamPolicy"));
    let policy = client
        .post(&url, Some(&json!({})))
        .await
        .with_context(|| format!("Failed to retrieve IAM policy for project {project_id}"))?;

    let url = client.iam_url(&format!("projects/{project_id}/serviceAccounts"));
    let accounts = client
        .get_paginated(&url, "accounts")
        .await
        .with_context(|| format!("Failed to retrieve service accounts from project {project_id}"))?;

    let mut service_accounts = Vec::new();
    for account in accounts {
        let unique_id = account
            .get("uniqueId")
            .and_then(|v| v.as_str())
            .unwrap_or("-")
            .to_string();

        let keys_url = append_query(
            &client.iam_url(&format!(
                "projects/{project_id}/serviceAccounts/{unique_id}/keys"
            )),
            "keyTypes",
            "USER_MANAGED",
        );
        let keys = client
            .get(&keys_url)
            .await
            .with_context(|| {
                format!("Failed to retrieve service account keys from project {project_id}")
            })?
            .get("keys")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        service_accounts.push(ServiceAccountView::new(account, keys));
    }

    Ok(IamResources {
        policy: IamPolicyView::new(policy),
        service_accounts,
    })
}
