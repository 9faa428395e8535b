//! Stdout report sink

use super::{Report, Reporter};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// A reporter that prints the full report collection to stdout as one
/// JSON array
pub struct StdOutReporter;

impl StdOutReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdOutReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reporter for StdOutReporter {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn publish(&self, reports: &[Report]) -> Result<()> {
        let rendered = serde_json::to_string(reports).context("Failed to render report")?;
        println!("{rendered}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Control;

    #[tokio::test]
    async fn test_publish_serializes_reports() {
        let mut report = Report::new("storage_bucket", "Project p Storage Bucket b");
        report.add_controls(false, vec![Control::new("c", "d")]);

        let reporter = StdOutReporter::new();
        assert!(reporter.publish(&[report]).await.is_ok());
    }
}
