//! Audit metrics
//!
//! A push-model metrics aggregator: counters and gauges are recorded as
//! reports are produced, then flushed to a Prometheus push gateway
//! exactly once at the end of the run.

use crate::gcp::http::GcpHttpClient;
use crate::report::Status;
use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};

const NAMESPACE: &str = "gcpaudit";

/// Metrics recorded over one audit run
pub struct AuditMetrics {
    registry: Registry,
    total_resources: IntCounter,
    report_summary: IntGaugeVec,
    gateway: Option<String>,
    pushed: AtomicBool,
}

impl AuditMetrics {
    /// Create the metrics registry. `gateway` is `None` when metrics
    /// are disabled: everything is still recorded, nothing is pushed.
    pub fn new(gateway: Option<String>) -> Result<Self> {
        // An explicit registry rather than the process-wide default,
        // so concurrent audits in one process (tests) stay isolated
        let registry = Registry::new();

        let total_resources = IntCounter::with_opts(
            Opts::new("total_resources_scanned", "Total number of resources scanned")
                .namespace(NAMESPACE),
        )
        .context("Failed to create resource counter")?;

        let report_summary = IntGaugeVec::new(
            Opts::new("report_summary", "Report summaries by type, status, and project")
                .namespace(NAMESPACE),
            &["type", "name", "status", "project"],
        )
        .context("Failed to create report summary gauge")?;

        registry
            .register(Box::new(total_resources.clone()))
            .context("Failed to register resource counter")?;
        registry
            .register(Box::new(report_summary.clone()))
            .context("Failed to register report summary gauge")?;

        Ok(Self {
            registry,
            total_resources,
            report_summary,
            gateway,
            pushed: AtomicBool::new(false),
        })
    }

    /// Record one finalized report
    pub fn record(&self, report_type: &str, name: &str, status: Status, project_id: &str) {
        let status = match status {
            Status::Passed => "passed",
            Status::Failed => "failed",
        };

        self.total_resources.inc();
        self.report_summary
            .with_label_values(&[report_type, name, status, project_id])
            .inc();
    }

    /// Number of resources recorded so far
    pub fn total(&self) -> u64 {
        self.total_resources.get()
    }

    /// Push the collected metrics to the gateway. Must be called at
    /// most once per run; the guard is a compare-and-swap so a retried
    /// publish phase cannot double-push.
    pub async fn push(&self, http: &GcpHttpClient) -> Result<()> {
        let Some(gateway) = &self.gateway else {
            return Ok(());
        };

        if self
            .pushed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(anyhow::anyhow!(
                "Metrics were already pushed, make sure AuditMetrics::push is only called once"
            ));
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        let body = String::from_utf8(buffer).context("Failed to encode metrics as UTF-8")?;

        let url = format!("http://{gateway}/metrics/job/gcpaudit");
        http.post_text(&url, body)
            .await
            .context("Failed to push metrics to gateway")?;

        tracing::info!("Pushed {} resource metrics to {}", self.total(), gateway);
        Ok(())
    }
}
