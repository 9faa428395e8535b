//! Compute networking collection

use super::{for_each_project, Collected};
use crate::gcp::client::{flatten_aggregated, GcpClient};
use crate::gcp::projects::Project;
use crate::view::network::{AddressView, FirewallRuleView, NetworkView, SubnetworkView};
use anyhow::{Context, Result};

const COMPUTE_API: &str = "compute.googleapis.com";

/// Networking resources discovered for one project
#[derive(Default)]
pub struct NetworkResources {
    pub networks: Vec<NetworkView>,
    pub subnetworks: Vec<SubnetworkView>,
    pub firewalls: Vec<FirewallRuleView>,
    pub addresses: Vec<AddressView>,
}

/// Collect networking resources across all projects. Networking rides
/// on the compute API, so projects without it yield an empty result.
pub async fn collect(
    client: &GcpClient,
    projects: &[Project],
    regions: &[String],
    concurrency: usize,
) -> Collected<NetworkResources> {
    for_each_project(projects, concurrency, |project| async move {
        if !project.has_service(COMPUTE_API) {
            return Ok(NetworkResources::default());
        }

        collect_project(client, &project.project_id, regions).await
    })
    .await
}

async fn collect_project(
    client: &GcpClient,
    project_id: &str,
    regions: &[String],
) -> Result<NetworkResources> {
    let mut resources = NetworkResources::default();

    // All networks active in the project
    let url = client.compute_global_url(project_id, "networks");
    let items = client
        .get_paginated(&url, "items")
        .await
        .with_context(|| format!("Error retrieving networks from project '{project_id}'"))?;
    resources.networks = items.into_iter().map(NetworkView::new).collect();

    // Subnetworks are regional; walk every region
    for region in regions {
        let url = client.compute_regional_url(project_id, region, "subnetworks");
        let items = client
            .get_paginated(&url, "items")
            .await
            .with_context(|| {
                format!("Error retrieving subnetworks from project '{project_id}'")
            })?;
        resources
            .subnetworks
            .extend(items.into_iter().map(SubnetworkView::new));
    }

    // Firewall rules for all networks in the project
    let url = client.compute_global_url(project_id, "firewalls");
    let items = client
        .get_paginated(&url, "items")
        .await
        .with_context(|| format!("Error retrieving firewall rules from project '{project_id}'"))?;
    resources.firewalls = items.into_iter().map(FirewallRuleView::new).collect();

    // Reserved addresses, aggregated over all scopes
    let url = client.compute_aggregated_url(project_id, "addresses");
    let response = client
        .get(&url)
        .await
        .with_context(|| format!("Error retrieving addresses from project '{project_id}'"))?;
    resources.addresses = flatten_aggregated(&response, "addresses")
        .into_iter()
        .map(AddressView::new)
        .collect();

    Ok(resources)
}
