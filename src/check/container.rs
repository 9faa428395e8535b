//! GKE checks

use super::EvalContext;
use crate::collect::Collected;
use crate::gcp::projects::Project;
use crate::report::{Control, Report};
use crate::view::container::ClusterView;
use anyhow::Result;

/// Build one report per GKE cluster
pub fn evaluate_clusters(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<Vec<ClusterView>>,
) -> Result<Vec<Report>> {
    let typ = "container_cluster";
    let mut reports = Vec::new();

    for project in projects {
        let outcome = collected.get(&project.project_id);
        if ctx.note_failed(&mut reports, typ, &project.project_id, outcome) {
            continue;
        }
        let Some(Ok(clusters)) = outcome else { continue };
        let project_id = project.project_id.as_str();

        for cluster in clusters {
            let name = cluster.name();
            let mut report = Report::new(
                typ,
                &format!("Project {project_id} Container Cluster {name}"),
            );
            report.set_data(cluster.raw().clone());

            let as_outcome = |ok: bool, error: &str| -> std::result::Result<(), String> {
                if ok {
                    Ok(())
                } else {
                    Err(error.to_string())
                }
            };

            let sd_logging = Control::cis(
                "7.1",
                &format!("Cluster {name} should have Stackdriver logging enabled"),
            )?
            .resolve(as_outcome(
                cluster.is_stackdriver_logging_enabled(),
                "Stackdriver logging is not enabled",
            ));

            let sd_monitoring = Control::cis(
                "7.2",
                &format!("Cluster {name} should have Stackdriver monitoring enabled"),
            )?
            .resolve(as_outcome(
                cluster.is_stackdriver_monitoring_enabled(),
                "Stackdriver monitoring is not enabled",
            ));

            let abac = Control::cis(
                "7.3",
                &format!("Cluster {name} should have Legacy ABAC disabled"),
            )?
            .resolve(as_outcome(
                cluster.is_abac_disabled(),
                "Cluster has Legacy ABAC enabled when it should not",
            ));

            let master_auth_networks = Control::cis(
                "7.4",
                &format!("Cluster {name} should have Master authorized networks enabled"),
            )?
            .resolve(as_outcome(
                cluster.is_master_authorized_networks_enabled(),
                "Cluster does not have Master Authorized Networks enabled",
            ));

            let dashboard = Control::cis(
                "7.6",
                &format!("Cluster {name} should have Kubernetes Dashboard disabled"),
            )?
            .resolve(as_outcome(
                cluster.is_dashboard_addon_disabled(),
                "Cluster has Kubernetes Dashboard add-on enabled when it should not",
            ));

            let basic_auth = Control::cis(
                "7.10",
                &format!("Cluster {name} should not have a password configured"),
            )?
            .resolve(as_outcome(
                cluster.is_master_auth_password_disabled(),
                "Cluster has a password configured to allow basic auth when it should not",
            ));

            let network_policy = Control::cis(
                "7.11",
                &format!("Cluster {name} should have Network Policy addon enabled"),
            )?
            .resolve(as_outcome(
                cluster.is_network_policy_addon_enabled(),
                "Cluster does not have Network Policy addon enabled when it should",
            ));

            let client_cert = Control::cis(
                "7.12",
                &format!("Cluster {name} should not issue client certificates"),
            )?
            .resolve(as_outcome(
                cluster.is_client_certificate_disabled(),
                "Cluster issues client certificates when it should not",
            ));

            let alias_ips = Control::cis(
                "7.13",
                &format!("Cluster {name} should use VPC-native alias IP ranges"),
            )?
            .resolve(as_outcome(
                cluster.is_alias_ip_enabled(),
                "Cluster is not using VPC-native alias IP ranges",
            ));

            let private_master = Control::cis(
                "7.15",
                &format!("Cluster {name} master should be private and not accessible over public IP"),
            )?
            .resolve(as_outcome(
                cluster.is_master_private(),
                "Cluster master is not private and is routeable on public internet",
            ));

            let private_nodes = Control::cis(
                "7.15",
                &format!("Cluster {name} nodes should be private and not accessible over public IPs"),
            )?
            .resolve(as_outcome(
                cluster.is_nodes_private(),
                "Cluster nodes are not private and are routable on the public internet",
            ));

            let default_sa = Control::cis(
                "7.17",
                &format!("Cluster {name} should not be using the default compute service account"),
            )?
            .resolve(as_outcome(
                !cluster.is_using_default_service_account(),
                "Cluster is using the default compute service account",
            ));

            let oauth_scopes = Control::cis(
                "7.18",
                &format!("Cluster {name} should be launched with minimal OAuth scopes"),
            )?
            .resolve(cluster.is_using_minimal_oauth_scopes(&ctx.config.container_oauth_scopes));

            report.add_controls(
                ctx.config.only_failures,
                vec![
                    sd_logging,
                    sd_monitoring,
                    abac,
                    master_auth_networks,
                    dashboard,
                    basic_auth,
                    network_policy,
                    client_cert,
                    alias_ips,
                    private_master,
                    private_nodes,
                    default_sa,
                    oauth_scopes,
                ],
            );

            ctx.finish(&mut reports, report, name, project_id);
        }
    }

    Ok(reports)
}

/// Build one report per GKE node pool
pub fn evaluate_node_pools(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<Vec<ClusterView>>,
) -> Result<Vec<Report>> {
    let typ = "container_nodepool";
    let mut reports = Vec::new();

    for project in projects {
        let Some(Ok(clusters)) = collected.get(&project.project_id) else {
            continue;
        };
        let project_id = project.project_id.as_str();

        for cluster in clusters {
            for pool in cluster.node_pools() {
                let name = pool.name().to_string();
                let mut report = Report::new(
                    typ,
                    &format!("Project {project_id} Container Node Pool {name}"),
                );
                report.set_data(pool.raw().clone());

                let legacy_api = Control::new(
                    "disableLegacyMetadataAPI",
                    &format!("Node pool {name} should have legacy metadata API disabled"),
                )
                .resolve(pool.is_legacy_metadata_api_disabled());

                let repair = Control::cis(
                    "7.7",
                    &format!("Node pool {name} should have automatic repairs enabled"),
                )?
                .resolve(if pool.is_auto_repair_enabled() {
                    Ok(())
                } else {
                    Err("Automatic node repair is not enabled".to_string())
                });

                let upgrade = Control::cis(
                    "7.8",
                    &format!("Node pool {name} should have automatic upgrades enabled"),
                )?
                .resolve(if pool.is_auto_upgrade_enabled() {
                    Ok(())
                } else {
                    Err("Automatic node upgrade is not enabled".to_string())
                });

                let cos = Control::cis("7.9", &format!("Node pool {name} should be using COS"))?
                    .resolve(pool.distribution_type_is("COS"));

                report.add_controls(
                    ctx.config.only_failures,
                    vec![legacy_api, repair, upgrade, cos],
                );

                ctx.finish(&mut reports, report, &name, project_id);
            }
        }
    }

    Ok(reports)
}
