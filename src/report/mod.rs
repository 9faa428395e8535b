//! Audit reports
//!
//! A [`Control`] is the pass/fail outcome of one recommendation against
//! one resource; a [`Report`] folds the controls for one resource into
//! an overall verdict, alongside the raw resource snapshot. Finalized
//! reports are handed to one or more [`Reporter`] sinks.

pub mod pubsub;
pub mod stdout;

use crate::cis;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Outcome of a single control evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The resource met the expected spec
    Passed,
    /// The resource did not match the expected spec
    Failed,
}

/// A measurable unit of an audit
#[derive(Debug, Clone, Serialize)]
pub struct Control {
    pub title: String,
    pub desc: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Control {
    /// A new control with the given title. Controls start failed; only
    /// an explicit [`passed`](Self::passed) transition flips them.
    pub fn new(title: &str, desc: &str) -> Self {
        Self {
            title: title.to_string(),
            desc: desc.to_string(),
            status: Status::Failed,
            error: None,
        }
    }

    /// A new control titled after a CIS recommendation. An unknown id
    /// is a programming error and fatal to the run.
    pub fn cis(recommendation_id: &str, desc: &str) -> Result<Self> {
        let rec = cis::lookup(recommendation_id)?;
        Ok(Self::new(&rec.format(), desc))
    }

    /// Transition the control from failed to passed. One-way: there is
    /// no transition back.
    pub fn passed(&mut self) {
        self.status = Status::Passed;
    }

    /// Resolve the control from a check outcome: pass on `Ok`, record
    /// the failure or evaluation error detail on `Err`.
    pub fn resolve(mut self, outcome: std::result::Result<(), String>) -> Self {
        match outcome {
            Ok(()) => self.passed(),
            Err(detail) => self.error = Some(detail),
        }
        self
    }
}

/// Top-level structure capturing what an audit observed on one resource
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    #[serde(rename = "type")]
    pub report_type: String,
    pub title: String,
    pub controls: Vec<Control>,
    pub data: Value,
}

impl Report {
    /// A new report for one resource, with no controls attached yet
    pub fn new(report_type: &str, title: &str) -> Self {
        Self {
            report_type: report_type.to_string(),
            title: title.to_string(),
            controls: Vec::new(),
            data: Value::Null,
        }
    }

    /// Attach the raw snapshot of the source resource
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    /// Whether the resource passed all the controls it was assigned.
    /// A report with no controls passes vacuously.
    pub fn status(&self) -> Status {
        if self.controls.iter().any(|c| c.status == Status::Failed) {
            Status::Failed
        } else {
            Status::Passed
        }
    }

    /// Append controls to the report. When `only_failures` is set,
    /// passed controls are not stored; the relative order of the
    /// remaining controls is preserved.
    pub fn add_controls(&mut self, only_failures: bool, controls: Vec<Control>) {
        for control in controls {
            if only_failures && control.status == Status::Passed {
                continue;
            }
            self.controls.push(control);
        }
    }
}

/// An output destination for finalized reports
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Short sink name for diagnostics
    fn name(&self) -> &'static str;

    /// Publish the full report collection to this sink
    async fn publish(&self, reports: &[Report]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_starts_failed() {
        let control = Control::new("t", "d");
        assert_eq!(control.status, Status::Failed);
        assert!(control.error.is_none());
    }

    #[test]
    fn test_passed_transition_is_one_way() {
        let mut control = Control::new("t", "d");
        control.passed();
        assert_eq!(control.status, Status::Passed);

        // Inspecting the control does not change its state
        let serialized = serde_json::to_value(&control).unwrap();
        assert_eq!(serialized["status"], "passed");
        assert_eq!(control.status, Status::Passed);
    }

    #[test]
    fn test_cis_control_uses_formatted_title() {
        let control = Control::cis("5.1", "Bucket should be private").unwrap();
        assert!(control.title.starts_with("CIS 5.1 - "));
        assert_eq!(control.status, Status::Failed);
    }

    #[test]
    fn test_cis_control_unknown_id_is_fatal() {
        assert!(Control::cis("42.42", "nope").is_err());
    }

    #[test]
    fn test_resolve_maps_outcomes() {
        let passed = Control::new("t", "d").resolve(Ok(()));
        assert_eq!(passed.status, Status::Passed);

        let failed = Control::new("t", "d").resolve(Err("went wrong".to_string()));
        assert_eq!(failed.status, Status::Failed);
        assert_eq!(failed.error.as_deref(), Some("went wrong"));
    }

    #[test]
    fn test_report_status_fails_if_any_control_failed() {
        let mut report = Report::new("storage_bucket", "b");
        assert_eq!(report.status(), Status::Passed);

        let mut passing = Control::new("a", "d");
        passing.passed();
        report.add_controls(false, vec![passing, Control::new("b", "d")]);
        assert_eq!(report.status(), Status::Failed);
    }

    #[test]
    fn test_only_failures_keeps_failed_controls_in_order() {
        let mut report = Report::new("t", "r");
        let mut pass_a = Control::new("pass-a", "d");
        pass_a.passed();
        let mut pass_b = Control::new("pass-b", "d");
        pass_b.passed();

        report.add_controls(
            true,
            vec![
                pass_a,
                Control::new("fail-1", "d"),
                pass_b,
                Control::new("fail-2", "d"),
            ],
        );

        let titles: Vec<&str> = report.controls.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["fail-1", "fail-2"]);
    }

    #[test]
    fn test_control_error_omitted_from_json_when_absent() {
        let mut control = Control::new("t", "d");
        control.passed();
        let json = serde_json::to_string(&control).unwrap();
        assert!(!json.contains("error"));

        let failed = Control::new("t", "d").resolve(Err("boom".to_string()));
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"error\":\"boom\""));
    }
}
