//! Compute Engine checks

use super::EvalContext;
use crate::collect::compute::ComputeResources;
use crate::collect::Collected;
use crate::gcp::projects::Project;
use crate::report::{Control, Report};
use crate::view::compute::{InstanceView, ProjectMetadataView};
use anyhow::Result;

const SERIAL_PORT_KEY: &str = "serial-port-enable";

/// Resolve a boolean-like metadata key for an instance: the instance's
/// own value wins when the key is present, otherwise the project-wide
/// value applies.
pub fn resolve_instance_metadata(
    instance: &InstanceView,
    project_metadata: &ProjectMetadataView,
    key: &str,
    want: &str,
) -> Result<(), String> {
    if instance.key_absent(key) {
        project_metadata.key_value_equals(key, want)
    } else {
        instance.key_value_equals(key, want)
    }
}

/// Serial port access for an instance. Absence of the key everywhere is
/// equivalent to the secure default (serial ports disabled).
pub fn check_serial_port_disabled(
    instance: &InstanceView,
    project_metadata: &ProjectMetadataView,
) -> Result<(), String> {
    if instance.key_absent(SERIAL_PORT_KEY) && project_metadata.key_absent(SERIAL_PORT_KEY) {
        return Ok(());
    }
    resolve_instance_metadata(instance, project_metadata, SERIAL_PORT_KEY, "0")
}

/// Serial port access at the project level, with the same
/// absence-is-secure semantics
pub fn check_project_serial_port_disabled(
    project_metadata: &ProjectMetadataView,
) -> Result<(), String> {
    if project_metadata.key_absent(SERIAL_PORT_KEY) {
        return Ok(());
    }
    project_metadata.key_value_equals(SERIAL_PORT_KEY, "0")
}

/// Whether the instance's external (NAT) IP posture matches the
/// configured expectation
pub fn check_nat_ip_posture(instance: &InstanceView, allow_nat: bool) -> Result<(), String> {
    match (instance.has_nat_ip(), allow_nat) {
        (true, true) | (false, false) => Ok(()),
        (true, false) => Err("Compute Instance has NAT IP address, but should not".to_string()),
        (false, true) => {
            Err("Compute Instance does not have a NAT IP address, but it should".to_string())
        }
    }
}

/// Whether the instance's IP forwarding posture matches the configured
/// expectation
pub fn check_ip_forwarding(instance: &InstanceView, allow_forwarding: bool) -> Result<(), String> {
    if !instance.has_ip_forwarding_enabled() || allow_forwarding {
        Ok(())
    } else {
        Err("Compute Instance allows IP Forwarding".to_string())
    }
}

/// Build one report per project covering its common instance metadata
pub fn evaluate_metadata(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<ComputeResources>,
) -> Result<Vec<Report>> {
    let typ = "compute_metadata";
    let mut reports = Vec::new();

    for project in projects {
        let outcome = collected.get(&project.project_id);
        if ctx.note_failed(&mut reports, typ, &project.project_id, outcome) {
            continue;
        }

        // Gated projects have no compute view and no metadata to audit
        let Some(Ok(resources)) = outcome else { continue };
        let Some(compute_project) = &resources.project else {
            continue;
        };

        let project_id = compute_project.name();
        let metadata = compute_project.common_instance_metadata();

        let mut report = Report::new(typ, &format!("Project {project_id} Common Instance Metadata"));
        report.set_data(metadata.raw().clone());

        let block_ssh_keys = Control::cis(
            "4.2",
            "Project metadata should include 'block-project-ssh-keys' and be set to 'true'",
        )?
        .resolve(metadata.key_value_equals("block-project-ssh-keys", "true"));

        let os_login = Control::cis(
            "4.3",
            "Project metadata should include the key 'enable-oslogin' with value set to 'true'",
        )?
        .resolve(metadata.key_value_equals("enable-oslogin", "true"));

        let serial_port = Control::cis(
            "4.4",
            "Project metadata should include the key 'serial-port-enable' with value set to '0'",
        )?
        .resolve(check_project_serial_port_disabled(&metadata));

        let legacy_endpoints = Control::new(
            "Ensure legacy metadata endpoints are not enabled for VM Instance",
            "Project metadata should include the key 'disable-legacy-endpoints' with value set to 'true'",
        )
        .resolve(metadata.key_value_equals("disable-legacy-endpoints", "true"));

        report.add_controls(
            ctx.config.only_failures,
            vec![block_ssh_keys, os_login, serial_port, legacy_endpoints],
        );

        ctx.finish(&mut reports, report, project_id, project_id);
    }

    Ok(reports)
}

/// Build one report per compute instance
pub fn evaluate_instances(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<ComputeResources>,
) -> Result<Vec<Report>> {
    let typ = "compute_instance";
    let mut reports = Vec::new();

    for project in projects {
        let Some(Ok(resources)) = collected.get(&project.project_id) else {
            // Failed projects were already reported by the metadata pass
            continue;
        };
        let Some(compute_project) = &resources.project else {
            continue;
        };

        let project_id = compute_project.name();
        let metadata = compute_project.common_instance_metadata();

        for instance in &resources.instances {
            let mut report = Report::new(
                typ,
                &format!("Project {project_id} Compute Instance {}", instance.name()),
            );
            report.set_data(instance.raw().clone());

            let expected_nics = ctx.config.compute_num_interfaces;
            let num_nics = Control::new(
                &format!("numNetworkInterfaces={expected_nics}"),
                &format!(
                    "Compute Instance should have a number of network interfaces equal to {expected_nics}"
                ),
            )
            .resolve(instance.has_num_network_interfaces(expected_nics));

            let allow_nat = ctx.config.compute_allow_nat;
            let nat_ip = Control::new(
                &format!("hasNatIP={allow_nat}"),
                &format!("Compute Instance should have a NAT ip configured: {allow_nat}"),
            )
            .resolve(check_nat_ip_posture(instance, allow_nat));

            let default_sa = Control::cis(
                "4.1",
                "Compute Instance should not use the project default compute service account",
            )?
            .resolve(if instance.uses_default_service_account() {
                Err("Compute instance uses a default compute service account".to_string())
            } else {
                Ok(())
            });

            let block_ssh_keys = Control::cis(
                "4.2",
                "Compute Instance metadata should include 'block-project-ssh-keys' and be set to 'true'",
            )?
            .resolve(resolve_instance_metadata(
                instance,
                &metadata,
                "block-project-ssh-keys",
                "true",
            ));

            let os_login = Control::cis(
                "4.3",
                "Compute Instance metadata should include the key 'enable-oslogin' with value set to 'true'",
            )?
            .resolve(resolve_instance_metadata(
                instance,
                &metadata,
                "enable-oslogin",
                "true",
            ));

            let serial_port = Control::cis(
                "4.4",
                "Compute Instance metadata should include the key 'serial-port-enable' with value set to '0'",
            )?
            .resolve(check_serial_port_disabled(instance, &metadata));

            let ip_forwarding = Control::cis(
                "4.5",
                "Compute Instance should not allow ip forwarding of packets",
            )?
            .resolve(check_ip_forwarding(
                instance,
                ctx.config.compute_allow_ip_forwarding,
            ));

            let csek = Control::cis("4.6", "Compute Instance should be encrypted with a CSEK")?
                .resolve(instance.uses_customer_supplied_encryption_keys());

            report.add_controls(
                ctx.config.only_failures,
                vec![
                    num_nics,
                    nat_ip,
                    default_sa,
                    block_ssh_keys,
                    os_login,
                    serial_port,
                    ip_forwarding,
                    csek,
                ],
            );

            ctx.finish(&mut reports, report, instance.name(), project_id);
        }
    }

    Ok(reports)
}
