//! Compliance checks
//!
//! One evaluator per resource category. Each evaluator walks the
//! category's collected views in project-discovery order, runs its
//! fixed list of checks, and folds the resulting controls into one
//! report per resource (or per project, for project-scoped categories).
//!
//! Every predicate is a named function - either on the resource view or
//! in the category module - so each recommendation can be exercised in
//! isolation by table-driven tests.

pub mod compute;
pub mod container;
pub mod iam;
pub mod logging;
pub mod network;
pub mod storage;

use crate::collect::ProjectOutcome;
use crate::metrics::AuditMetrics;
use crate::report::{Control, Report};

/// Context shared by every evaluator
pub struct EvalContext<'a> {
    pub config: &'a crate::config::AuditConfig,
    pub metrics: &'a AuditMetrics,
}

impl EvalContext<'_> {
    /// Record a finalized report and append it to the output list
    fn finish(&self, reports: &mut Vec<Report>, report: Report, name: &str, project_id: &str) {
        self.metrics
            .record(&report.report_type, name, report.status(), project_id);
        reports.push(report);
    }

    /// Handle a project whose collection failed. Under
    /// `continue_on_error` the project is reported as explicitly
    /// unknown - a failed report carrying the collection error - so it
    /// can never read as silently compliant. Returns whether the
    /// project's evaluation should be skipped.
    fn note_failed<T>(
        &self,
        reports: &mut Vec<Report>,
        report_type: &str,
        project_id: &str,
        outcome: Option<&ProjectOutcome<T>>,
    ) -> bool {
        match outcome {
            Some(Ok(_)) => false,
            Some(Err(e)) => {
                let mut report = Report::new(
                    report_type,
                    &format!("Project {project_id} {report_type} collection"),
                );
                let control = Control::new(
                    "resourceCollection",
                    &format!("Resources should be collectable for project {project_id}"),
                )
                .resolve(Err(format!("Collection failed: {e:#}")));
                report.add_controls(false, vec![control]);
                self.finish(reports, report, project_id, project_id);
                true
            }
            // No outcome recorded for this project at all; nothing to report
            None => true,
        }
    }
}
