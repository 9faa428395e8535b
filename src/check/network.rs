//! Compute networking checks

use super::EvalContext;
use crate::collect::network::NetworkResources;
use crate::collect::Collected;
use crate::gcp::projects::Project;
use crate::report::{Control, Report};
use crate::view::network::FirewallRuleView;
use anyhow::Result;

const INTERNET: &str = "0.0.0.0/0";

/// Whether the rule exposes a well-known port to the whole internet
pub fn check_port_closed_to_internet(rule: &FirewallRuleView, port: &str) -> Result<(), String> {
    let open = (rule.allows_protocol_port("tcp", port) || rule.allows_protocol_port("udp", port))
        && rule.allows_source_range(INTERNET);

    if open {
        Err(format!("{} allows port {port} from the internet", rule.name()))
    } else {
        Ok(())
    }
}

/// Build one report per VPC network
pub fn evaluate_networks(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<NetworkResources>,
) -> Result<Vec<Report>> {
    let typ = "compute_network";
    let mut reports = Vec::new();

    for project in projects {
        let outcome = collected.get(&project.project_id);
        if ctx.note_failed(&mut reports, typ, &project.project_id, outcome) {
            continue;
        }
        let Some(Ok(resources)) = outcome else { continue };
        let project_id = project.project_id.as_str();

        for network in &resources.networks {
            let mut report = Report::new(
                typ,
                &format!("Network {} in Project {project_id}", network.name()),
            );
            report.set_data(network.raw().clone());

            let default_network = Control::cis(
                "3.1",
                &format!("Project {project_id} should not have a default network"),
            )?
            .resolve(if network.is_default() {
                Err(format!("Network {} is the default network", network.name()))
            } else {
                Ok(())
            });

            let legacy_network = Control::cis(
                "3.2",
                &format!("Project {project_id} should not have legacy networks"),
            )?
            .resolve(if network.is_legacy() {
                Err(format!("Network {} is a legacy network", network.name()))
            } else {
                Ok(())
            });

            report.add_controls(ctx.config.only_failures, vec![default_network, legacy_network]);
            ctx.finish(&mut reports, report, network.name(), project_id);
        }
    }

    Ok(reports)
}

/// Build one report per subnetwork
pub fn evaluate_subnetworks(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<NetworkResources>,
) -> Result<Vec<Report>> {
    let typ = "compute_subnetwork";
    let mut reports = Vec::new();

    for project in projects {
        let Some(Ok(resources)) = collected.get(&project.project_id) else {
            continue;
        };
        let project_id = project.project_id.as_str();

        for subnetwork in &resources.subnetworks {
            let mut report = Report::new(
                typ,
                &format!(
                    "Subnetwork {} in region {} for Project {project_id}",
                    subnetwork.name(),
                    subnetwork.region()
                ),
            );
            report.set_data(subnetwork.raw().clone());

            let private_access = Control::cis(
                "3.8",
                &format!(
                    "Subnetwork {} should have Private Google Access enabled",
                    subnetwork.name()
                ),
            )?
            .resolve(if subnetwork.is_private_google_access_enabled() {
                Ok(())
            } else {
                Err(format!(
                    "Subnetwork {} does not have Private Google Access enabled",
                    subnetwork.name()
                ))
            });

            let flow_logs = Control::cis(
                "3.9",
                &format!(
                    "Subnetwork {} should have VPC flow logs enabled",
                    subnetwork.name()
                ),
            )?
            .resolve(if subnetwork.is_flow_logs_enabled() {
                Ok(())
            } else {
                Err(format!(
                    "Subnetwork {} does not have VPC flow logs enabled",
                    subnetwork.name()
                ))
            });

            report.add_controls(ctx.config.only_failures, vec![private_access, flow_logs]);
            ctx.finish(&mut reports, report, subnetwork.name(), project_id);
        }
    }

    Ok(reports)
}

/// Build one report per firewall rule
pub fn evaluate_firewalls(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<NetworkResources>,
) -> Result<Vec<Report>> {
    let typ = "compute_firewall_rule";
    let mut reports = Vec::new();

    for project in projects {
        let Some(Ok(resources)) = collected.get(&project.project_id) else {
            continue;
        };
        let project_id = project.project_id.as_str();

        for rule in &resources.firewalls {
            let mut report = Report::new(
                typ,
                &format!("Network {} Firewall Rule {}", rule.network(), rule.name()),
            );
            report.set_data(rule.raw().clone());

            let ssh = Control::cis("3.6", "SSH should not be allowed from the internet")?
                .resolve(check_port_closed_to_internet(rule, "22"));

            let rdp = Control::cis("3.7", "RDP should not be allowed from the internet")?
                .resolve(check_port_closed_to_internet(rule, "3389"));

            report.add_controls(ctx.config.only_failures, vec![ssh, rdp]);
            ctx.finish(&mut reports, report, rule.name(), project_id);
        }
    }

    Ok(reports)
}

/// Build one inventory report per reserved address (no controls)
pub fn evaluate_addresses(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<NetworkResources>,
) -> Result<Vec<Report>> {
    let typ = "compute_address";
    let mut reports = Vec::new();

    for project in projects {
        let Some(Ok(resources)) = collected.get(&project.project_id) else {
            continue;
        };
        let project_id = project.project_id.as_str();

        for address in &resources.addresses {
            let mut report = Report::new(typ, &format!("Compute Address {}", address.name()));
            report.set_data(address.raw().clone());

            ctx.finish(&mut reports, report, address.name(), project_id);
        }
    }

    Ok(reports)
}
