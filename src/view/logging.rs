//! Cloud Logging resource views

use serde_json::Value;

/// A logging sink (log export destination)
#[derive(Debug, Clone)]
pub struct LogSinkView {
    raw: Value,
}

impl LogSinkView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether the sink ships all logs. An empty (or absent) filter
    /// means every generated log entry is exported to the destination.
    pub fn ships_all_logs(&self) -> bool {
        self.raw
            .get("filter")
            .and_then(|v| v.as_str())
            .map(|f| f.is_empty())
            .unwrap_or(true)
    }
}

/// A log-based metric
#[derive(Debug, Clone)]
pub struct LogMetricView {
    raw: Value,
}

impl LogMetricView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(|v| v.as_str()).unwrap_or("-")
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The filter of the metric
    pub fn filter(&self) -> &str {
        self.raw.get("filter").and_then(|v| v.as_str()).unwrap_or("")
    }

    /// Whether the configured filter matches a given string
    pub fn filter_matches(&self, filter: &str) -> bool {
        self.filter() == filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sink_ships_all_logs_when_filter_empty_or_absent() {
        let unfiltered = LogSinkView::new(json!({"name": "export-all", "filter": ""}));
        assert!(unfiltered.ships_all_logs());

        let no_filter_field = LogSinkView::new(json!({"name": "export-all"}));
        assert!(no_filter_field.ships_all_logs());

        let filtered = LogSinkView::new(json!({"name": "errors", "filter": "severity>=ERROR"}));
        assert!(!filtered.ships_all_logs());
    }

    #[test]
    fn test_metric_filter_matching_is_exact() {
        let metric = LogMetricView::new(json!({
            "name": "owner-changes",
            "filter": "resource.type=gcs_bucket"
        }));

        assert!(metric.filter_matches("resource.type=gcs_bucket"));
        assert!(!metric.filter_matches("resource.type=gcs_bucket "));
    }
}
