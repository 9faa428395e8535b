//! IAM checks
//!
//! IAM is a project-scoped category: one report per project covering
//! its policy and every service account in it.

use super::EvalContext;
use crate::collect::iam::IamResources;
use crate::collect::Collected;
use crate::gcp::projects::Project;
use crate::report::{Control, Report};
use anyhow::Result;

/// Build one IAM policy report per project
pub fn evaluate_policies(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<IamResources>,
) -> Result<Vec<Report>> {
    let typ = "iam_policy";
    let mut reports = Vec::new();

    for project in projects {
        let outcome = collected.get(&project.project_id);
        if ctx.note_failed(&mut reports, typ, &project.project_id, outcome) {
            continue;
        }
        let Some(Ok(resources)) = outcome else { continue };

        let project_id = project.project_id.as_str();
        let policy = &resources.policy;

        let mut report = Report::new(typ, &format!("Project {project_id} IAM Policy"));
        report.set_data(policy.raw().clone());

        let mut controls = Vec::new();

        // Corporate login credentials should be used
        controls.push(
            Control::cis(
                "1.1",
                &format!("Project {project_id} should only allow corporate login credentials"),
            )?
            .resolve(policy.violates_user_domain_whitelist(&ctx.config.iam_user_domains)),
        );

        for sa in &resources.service_accounts {
            // Service account keys should be GCP-managed
            controls.push(
                Control::cis(
                    "1.3",
                    &format!("{} should not have user-managed keys", sa.email()),
                )?
                .resolve(if sa.has_user_managed_keys() {
                    Err("Service account has user-managed keys".to_string())
                } else {
                    Ok(())
                }),
            );

            // Service accounts should not have admin privileges
            controls.push(
                Control::cis("1.4", &format!("{} should not have admin roles", sa.email()))?
                    .resolve(
                        policy.member_has_admin_role(&format!("serviceAccount:{}", sa.email())),
                    ),
            );
        }

        // IAM users should not impersonate service accounts at the project level
        controls.push(
            Control::cis(
                "1.5",
                &format!(
                    "Project {project_id} should not allow project-wide use of Service Account User role"
                ),
            )?
            .resolve(policy.allows_user_service_account_user_role()),
        );

        // Service account keys should be rotated on a regular interval
        for sa in &resources.service_accounts {
            controls.push(
                Control::cis("1.6", &format!("{} should not have expired keys", sa.email()))?
                    .resolve(sa.has_keys_needing_rotation(ctx.config.iam_sa_key_rotation_days)),
            );
        }

        // Users should not both administrate and impersonate service accounts
        controls.push(
            Control::cis(
                "1.7",
                &format!(
                    "Project {project_id} should have separation of duties with respect to service account usage"
                ),
            )?
            .resolve(policy.violates_service_account_separation_of_duties()),
        );

        // Users should not both administrate and utilize KMS functionality
        controls.push(
            Control::cis(
                "1.9",
                &format!(
                    "Project {project_id} should have separation of duties with respect to KMS usage"
                ),
            )?
            .resolve(policy.violates_kms_separation_of_duties()),
        );

        // Project IAM policies should define audit configurations
        controls.push(
            Control::cis(
                "2.1",
                &format!("Project {project_id} should have proper audit logging configurations"),
            )?
            .resolve(
                policy
                    .configures_audit_logging()
                    .and_then(|()| policy.has_no_audit_log_exceptions()),
            ),
        );

        report.add_controls(ctx.config.only_failures, controls);
        ctx.finish(&mut reports, report, project_id, project_id);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::testutil::{test_config, test_metrics};
    use crate::collect::for_each_project;
    use crate::report::Status;
    use crate::view::iam::{IamPolicyView, ServiceAccountView};
    use serde_json::json;

    fn compliant_policy() -> serde_json::Value {
        json!({
            "bindings": [
                {"role": "roles/viewer", "members": ["user:a@corp.example.com"]}
            ],
            "auditConfigs": [{
                "service": "allServices",
                "auditLogConfigs": [
                    {"logType": "ADMIN_READ"},
                    {"logType": "DATA_READ"},
                    {"logType": "DATA_WRITE"}
                ]
            }]
        })
    }

    #[tokio::test]
    async fn test_compliant_project_passes_all_policy_controls() {
        let mut config = test_config();
        config.iam_user_domains = vec!["corp.example.com".to_string()];
        let metrics = test_metrics();
        let ctx = EvalContext {
            config: &config,
            metrics: &metrics,
        };

        let projects = vec![Project::from(&json!({"projectId": "p1"}))];
        let collected = for_each_project(&projects, 1, |_| async {
            Ok(IamResources {
                policy: IamPolicyView::new(compliant_policy()),
                service_accounts: vec![ServiceAccountView::new(
                    json!({"email": "svc@p1.iam.gserviceaccount.com", "uniqueId": "1"}),
                    vec![],
                )],
            })
        })
        .await;

        let reports = evaluate_policies(&ctx, &projects, &collected).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status(), Status::Passed);
        // 1.1, 1.3, 1.4, 1.5, 1.6, 1.7, 1.9, 2.1
        assert_eq!(reports[0].controls.len(), 8);
    }

    #[tokio::test]
    async fn test_gmail_member_fails_the_whitelist_control() {
        let mut config = test_config();
        config.iam_user_domains = vec!["corp.example.com".to_string()];
        let metrics = test_metrics();
        let ctx = EvalContext {
            config: &config,
            metrics: &metrics,
        };

        let mut policy = compliant_policy();
        policy["bindings"]
            .as_array_mut()
            .unwrap()
            .push(json!({"role": "roles/viewer", "members": ["user:a@gmail.com"]}));

        let projects = vec![Project::from(&json!({"projectId": "p1"}))];
        let collected = for_each_project(&projects, 1, |_| {
            let policy = policy.clone();
            async move {
                Ok(IamResources {
                    policy: IamPolicyView::new(policy),
                    service_accounts: vec![],
                })
            }
        })
        .await;

        let reports = evaluate_policies(&ctx, &projects, &collected).unwrap();
        let whitelist = &reports[0].controls[0];
        assert_eq!(whitelist.status, Status::Failed);
        assert!(whitelist.error.as_deref().unwrap().contains("user:a@gmail.com"));
    }
}
