//! Cloud Storage checks

use super::EvalContext;
use crate::collect::Collected;
use crate::gcp::projects::Project;
use crate::report::{Control, Report};
use crate::view::storage::BucketView;
use anyhow::Result;

/// Whether the bucket ACL grants access to `allUsers`
pub fn check_no_all_users(bucket: &BucketView) -> Result<(), String> {
    if bucket.allows_all_users() {
        Err("Bucket ACL includes entity 'allUsers'".to_string())
    } else {
        Ok(())
    }
}

/// Whether the bucket ACL grants access to `allAuthenticatedUsers`
pub fn check_no_all_authenticated_users(bucket: &BucketView) -> Result<(), String> {
    if bucket.allows_all_authenticated_users() {
        Err("Bucket ACL includes entity 'allAuthenticatedUsers'".to_string())
    } else {
        Ok(())
    }
}

/// Build one report per storage bucket
pub fn evaluate_buckets(
    ctx: &EvalContext,
    projects: &[Project],
    collected: &Collected<Vec<BucketView>>,
) -> Result<Vec<Report>> {
    let typ = "storage_bucket";
    let mut reports = Vec::new();

    for project in projects {
        let outcome = collected.get(&project.project_id);
        if ctx.note_failed(&mut reports, typ, &project.project_id, outcome) {
            continue;
        }
        let Some(Ok(buckets)) = outcome else { continue };
        let project_id = project.project_id.as_str();

        for bucket in buckets {
            let mut report = Report::new(
                typ,
                &format!("Project {project_id} Storage Bucket {}", bucket.name()),
            );
            report.set_data(bucket.raw().clone());

            let all_users = Control::cis("5.1", "Bucket ACL should not include entity 'allUsers'")?
                .resolve(check_no_all_users(bucket));

            let all_authenticated_users = Control::cis(
                "5.1",
                "Bucket ACL should not include entity 'allAuthenticatedUsers'",
            )?
            .resolve(check_no_all_authenticated_users(bucket));

            report.add_controls(
                ctx.config.only_failures,
                vec![all_users, all_authenticated_users],
            );
            ctx.finish(&mut reports, report, bucket.name(), project_id);
        }
    }

    Ok(reports)
}
