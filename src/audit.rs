//! Audit orchestration
//!
//! Sequences one audit run: project discovery, concurrent per-category
//! collection, category-by-category evaluation, then publication to the
//! configured sinks. Any fatal condition raised by a child component
//! aborts the run; the provider is never mutated, so there is nothing
//! to roll back.

use crate::check::{self, EvalContext};
use crate::collect;
use crate::config::AuditConfig;
use crate::gcp::client::GcpClient;
use crate::gcp::projects;
use crate::metrics::AuditMetrics;
use crate::report::pubsub::PubSubReporter;
use crate::report::stdout::StdOutReporter;
use crate::report::{Report, Reporter};
use anyhow::{Context, Result};
use std::time::Instant;

/// One audit run against the configured project fleet
pub struct Audit {
    config: AuditConfig,
    client: GcpClient,
    reporters: Vec<Box<dyn Reporter>>,
    metrics: AuditMetrics,
    reports: Vec<Report>,
}

impl Audit {
    /// Set up an audit using Application Default Credentials
    pub async fn setup(config: AuditConfig) -> Result<Self> {
        config.validate()?;
        let client = GcpClient::new().await?;
        Self::with_client(config, client)
    }

    /// Set up an audit against an existing client (tests point this at
    /// a mock server)
    pub fn with_client(config: AuditConfig, client: GcpClient) -> Result<Self> {
        config.validate()?;

        let mut reporters: Vec<Box<dyn Reporter>> = Vec::new();
        if config.reports_pubsub {
            let project = config.pubsub_project.as_deref().unwrap_or_default();
            reporters.push(Box::new(PubSubReporter::new(
                client.clone(),
                project,
                &config.pubsub_topic,
            )));
        }
        if config.reports_stdout {
            reporters.push(Box::new(StdOutReporter::new()));
        }

        let gateway = config
            .metrics_enabled
            .then(|| config.metrics_gateway.clone());
        let metrics = AuditMetrics::new(gateway)?;

        Ok(Self {
            config,
            client,
            reporters,
            metrics,
            reports: Vec::new(),
        })
    }

    /// Discover, collect, and evaluate everything in scope
    pub async fn execute(&mut self) -> Result<()> {
        let started = Instant::now();
        let concurrency = self.config.collector_concurrency;

        let projects = projects::discover(
            &self.client,
            self.config.project_filter(),
            concurrency,
        )
        .await
        .context("Failed to retrieve project resources")?;

        // Zone and region lists are shared by every project's compute
        // and network collection
        let zones = collect::zone_names(&self.client, &projects).await?;
        let regions = collect::region_names(&self.client, &projects).await?;
        tracing::debug!("Using {} zones and {} regions", zones.len(), regions.len());

        // All categories collect concurrently; evaluation only starts
        // once every category has fully drained
        let (compute, network, storage, iam, logging, container) = tokio::join!(
            collect::compute::collect(&self.client, &projects, &zones, concurrency),
            collect::network::collect(&self.client, &projects, &regions, concurrency),
            collect::storage::collect(&self.client, &projects, concurrency),
            collect::iam::collect(&self.client, &projects, concurrency),
            collect::logging::collect(&self.client, &projects, concurrency),
            collect::container::collect(&self.client, &projects, concurrency),
        );
        tracing::info!("Collection finished in {:?}", started.elapsed());

        if !self.config.continue_on_error {
            compute
                .ensure_complete()
                .context("Failed to retrieve compute resources")?;
            network
                .ensure_complete()
                .context("Failed to retrieve network resources")?;
            storage
                .ensure_complete()
                .context("Failed to retrieve storage resources")?;
            iam.ensure_complete()
                .context("Failed to retrieve iam resources")?;
            logging
                .ensure_complete()
                .context("Failed to retrieve logging resources")?;
            container
                .ensure_complete()
                .context("Failed to retrieve container resources")?;
        }

        let ctx = EvalContext {
            config: &self.config,
            metrics: &self.metrics,
        };

        let generators: Vec<Vec<Report>> = vec![
            check::compute::evaluate_metadata(&ctx, &projects, &compute)?,
            check::compute::evaluate_instances(&ctx, &projects, &compute)?,
            check::logging::evaluate_logging(&ctx, &projects, &logging)?,
            check::network::evaluate_networks(&ctx, &projects, &network)?,
            check::network::evaluate_subnetworks(&ctx, &projects, &network)?,
            check::network::evaluate_firewalls(&ctx, &projects, &network)?,
            check::network::evaluate_addresses(&ctx, &projects, &network)?,
            check::iam::evaluate_policies(&ctx, &projects, &iam)?,
            check::storage::evaluate_buckets(&ctx, &projects, &storage)?,
            check::container::evaluate_clusters(&ctx, &projects, &container)?,
            check::container::evaluate_node_pools(&ctx, &projects, &container)?,
        ];

        for generated in generators {
            self.reports.extend(generated);
        }

        tracing::info!(
            "Evaluated {} reports across {} projects in {:?}",
            self.reports.len(),
            projects.len(),
            started.elapsed()
        );

        Ok(())
    }

    /// Push metrics and publish the reports to every configured sink.
    /// Sinks run sequentially; the first failure aborts the run.
    pub async fn report(&self) -> Result<()> {
        self.metrics
            .push(&self.client.http)
            .await
            .context("Failed to push metrics")?;

        for reporter in &self.reporters {
            reporter
                .publish(&self.reports)
                .await
                .with_context(|| format!("Failed to publish reports via {}", reporter.name()))?;
        }

        Ok(())
    }

    /// The reports accumulated by [`execute`](Self::execute)
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }
}
