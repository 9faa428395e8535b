//! Pub/Sub report sink

use super::{Report, Reporter};
use crate::gcp::client::GcpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::stream::{self, StreamExt};
use serde_json::json;

/// How many publishes may be in flight at once
const PUBLISH_CONCURRENCY: usize = 16;

/// A reporter that publishes each report as one message to a Pub/Sub
/// topic
pub struct PubSubReporter {
    client: GcpClient,
    project: String,
    topic: String,
}

impl PubSubReporter {
    pub fn new(client: GcpClient, project: &str, topic: &str) -> Self {
        Self {
            client,
            project: project.to_string(),
            topic: topic.to_string(),
        }
    }
}

#[async_trait]
impl Reporter for PubSubReporter {
    fn name(&self) -> &'static str {
        "pubsub"
    }

    async fn publish(&self, reports: &[Report]) -> Result<()> {
        let url = self.client.pubsub_publish_url(&self.project, &self.topic);

        // Serialization failures are programming errors, surfaced before
        // anything is put on the wire
        let mut payloads = Vec::with_capacity(reports.len());
        for report in reports {
            let data = serde_json::to_vec(report).context("Failed to marshal report for pubsub")?;
            payloads.push(base64::engine::general_purpose::STANDARD.encode(data));
        }

        let results: Vec<Result<()>> = stream::iter(payloads)
            .map(|data| {
                let url = url.clone();
                async move {
                    let body = json!({"messages": [{"data": data}]});
                    self.client.post(&url, Some(&body)).await?;
                    Ok(())
                }
            })
            .buffer_unordered(PUBLISH_CONCURRENCY)
            .collect()
            .await;

        let errs = results
            .iter()
            .filter(|r| {
                if let Err(e) = r {
                    tracing::error!("Failed to publish: {e:#}");
                    true
                } else {
                    false
                }
            })
            .count();

        if errs > 0 {
            return Err(anyhow::anyhow!(
                "{errs} of {} reports did not publish",
                reports.len()
            ));
        }

        Ok(())
    }
}
