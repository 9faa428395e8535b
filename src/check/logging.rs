//! Cloud Logging checks
//!
//! Logging is a project-scoped category: one report per project
//! covering its export sinks and the log-based metric filters the
//! benchmark expects to be monitored.

use super::EvalContext;
use crate::collect::logging::LoggingResources;
use crate::collect::Collected;
use crate::gcp::projects::Project;
use crate::report::{Control, Report};
use crate::view::logging::LogMetricView;
use anyhow::Result;
use serde_json::json;

/// The monitored filters the benchmark requires, by recommendation id
pub const METRIC_FILTERS: &[(&str, &str, &str)] = &[
    (
        "2.4",
        "should monitor ownership changes",
        r#"(protoPayload.serviceName="cloudresourcemanager.googleapis.com") AND (ProjectOwnership OR projectOwnerInvitee) OR (protoPayload.serviceData.policyDelta.bindingDeltas.action="REMOVE" AND protoPayload.serviceData.policyDelta.bindingDeltas.role="roles/owner") OR (protoPayload.serviceData.policyDelta.bindingDeltas.action="ADD" AND protoPayload.serviceData.policyDelta.bindingDeltas.role="roles/owner")"#,
    ),
    (
        "2.5",
        "should monitor audit log configuration changes",
        r#"protoPayload.methodName="SetIamPolicy" AND protoPayload.serviceData.policyDelta.auditConfigDeltas:*"#,
    ),
    (
        "2.6",
        "should monitor custom IAM role changes",
        r#"resource.type="iam_role" AND protoPayload.methodName = "google.iam.admin.v1.CreateRole" OR protoPayload.methodName="google.iam.admin.v1.DeleteRole" OR protoPayload.methodName="google.iam.admin.v1.UpdateRole""#,
    ),
    (
        "2.7",
        "should monitor VPC firewall changes",
        r#"resource.type="gce_firewall_rule" AND jsonPayload.event_subtype="compute.firewalls.patch" OR jsonPayload.event_subtype="compute.firewalls.insert""#,
    ),
    (
        "2.8",
        "should monitor VPC route changes",
        r#"resource.type="gce_route" AND jsonPayload.event_subtype="compute.routes.delete" OR jsonPayload.event_subtype="compute.routes.insert""#,
    ),
    (
        "2.9",
        "should monitor VPC network changes",
        r#"resource.type=gce_network AND jsonPayload.event_subtype="compute.networks.insert" OR jsonPayload.event_subtype="compute.networks.patch" OR jsonPayload.event_subtype="compute.networks.delete" OR jsonPayload.event_subtype="compute.networks.removePeering" OR jsonPayload.event_subtype="compute.networks.addPeering""#,
    ),
    (
        "2.10",
        "should monitor GCS IAM changes",
        r#"resource.type=gcs_bucket AND protoPayload.methodName="storage.setIamPermissions""#,
    ),
    (
        "2.11",
        "should monitor SQL config changes",
        r#"protoPayload.methodName="cloudsql.instances.update""#,
    ),
];

/// Whether any sink in the project exports all log entries
pub fn check_all_logs_exported(
    project_id: &str,
    resources: &LoggingResources,
) -> Result<(), String> {
    if resources.sinks.iter().any(|s| s.ships_all_logs()) {
        Ok(())
    } else {
        Err(format!(
            "There is no logging sink that exports all logs for project {project_id}"
        ))
    }
}

/// Whether a log-based metric with exactly the given filter exists
pub fn check_metric_filter_exists(
    project_id: &str,
    metrics: &[LogMetricView],
    filter: &str,
) -> Result<(), String> {
    if metrics.iter().any(|m| m.filter_matches(filter)) {
        Ok(())
    } else {
        Err(format!(
            "Project {project_id} does not have the following filter monitored: {filter}"
        ))
    }
}

/// Build one logging-configuration report per project
pub fn evaluate_logging(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<LoggingResources>,
) -> Result<Vec<Report>> {
    let typ = "logging_configuration";
    let mut reports = Vec::new();

    for project in projects {
        let outcome = collected.get(&project.project_id);
        if ctx.note_failed(&mut reports, typ, &project.project_id, outcome) {
            continue;
        }
        let Some(Ok(resources)) = outcome else { continue };
        let project_id = project.project_id.as_str();

        let mut report = Report::new(typ, &format!("Project {project_id} Logging Configuration"));
        report.set_data(json!({
            "sinks": resources.sinks.iter().map(|s| s.raw().clone()).collect::<Vec<_>>(),
            "metrics": resources.metrics.iter().map(|m| m.raw().clone()).collect::<Vec<_>>(),
        }));

        let mut controls = Vec::new();

        // At least one sink should ship all logs somewhere
        controls.push(
            Control::cis(
                "2.2",
                &format!(
                    "Project {project_id} should have at least one export configured with no filters"
                ),
            )?
            .resolve(check_all_logs_exported(project_id, resources)),
        );

        for (id, what, filter) in METRIC_FILTERS {
            controls.push(
                Control::cis(id, &format!("Project {project_id} {what}"))?.resolve(
                    check_metric_filter_exists(project_id, &resources.metrics, filter),
                ),
            );
        }

        report.add_controls(ctx.config.only_failures, controls);
        ctx.finish(&mut reports, report, project_id, project_id);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::logging::LogSinkView;
    use serde_json::json;

    fn resources(sinks: Vec<serde_json::Value>, metrics: Vec<serde_json::Value>) -> LoggingResources {
        LoggingResources {
            sinks: sinks.into_iter().map(LogSinkView::new).collect(),
            metrics: metrics.into_iter().map(LogMetricView::new).collect(),
        }
    }

    #[test]
    fn test_unfiltered_sink_satisfies_export_check() {
        let res = resources(
            vec![
                json!({"name": "errors-only", "filter": "severity>=ERROR"}),
                json!({"name": "export-all", "filter": ""}),
            ],
            vec![],
        );
        assert!(check_all_logs_exported("p", &res).is_ok());
    }

    #[test]
    fn test_filtered_sinks_fail_export_check() {
        let res = resources(
            vec![json!({"name": "errors-only", "filter": "severity>=ERROR"})],
            vec![],
        );
        let err = check_all_logs_exported("p", &res).unwrap_err();
        assert!(err.contains("project p"));
    }

    #[test]
    fn test_metric_filter_table_is_matched_exactly() {
        let (_, _, sql_filter) = METRIC_FILTERS
            .iter()
            .find(|(id, _, _)| *id == "2.11")
            .unwrap();

        let metrics = vec![LogMetricView::new(json!({
            "name": "sql-changes",
            "filter": sql_filter
        }))];

        assert!(check_metric_filter_exists("p", &metrics, sql_filter).is_ok());
        assert!(check_metric_filter_exists("p", &metrics, "something else").is_err());
    }

    #[test]
    fn test_every_metric_filter_has_a_registry_entry() {
        for (id, _, _) in METRIC_FILTERS {
            assert!(crate::cis::lookup(id).is_ok(), "missing registry id {id}");
        }
    }
}
