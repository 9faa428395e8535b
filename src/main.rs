use anyhow::Result;
use clap::{Parser, ValueEnum};
use gcpaudit::audit::Audit;
use gcpaudit::config::{env_bool, env_or, split_csv, AuditConfig};
use tracing::Level;

/// CIS benchmark auditor for GCP
#[derive(Parser, Debug)]
#[command(name = "gcpaudit", version, about, long_about = None)]
struct Args {
    /// Project name filter selecting the projects to audit (e.g. "my-projects-*")
    #[arg(long)]
    project_filter: Option<String>,

    /// Maximum collection workers in flight per category
    #[arg(long)]
    collector_concurrency: Option<usize>,

    /// Keep auditing unaffected projects when one project fails to collect
    #[arg(long)]
    continue_on_error: bool,

    /// Expected number of network interfaces (NIC) per instance
    #[arg(long)]
    compute_num_interfaces: Option<usize>,

    /// Allow instances to have external (NAT) IP addresses
    #[arg(long)]
    compute_allow_nat: bool,

    /// Allow instances to perform IP forwarding
    #[arg(long)]
    compute_allow_ip_forwarding: bool,

    /// Comma-separated list of domains to allow users from
    #[arg(long)]
    iam_user_domains: Option<String>,

    /// Days a user-managed service account key may live before rotation
    #[arg(long)]
    iam_sa_key_rotation_days: Option<i64>,

    /// Comma-separated list of OAuth scopes to allow for GKE clusters
    #[arg(long)]
    container_oauth_scopes: Option<String>,

    /// Output the report via stdout
    #[arg(long)]
    reports_stdout: bool,

    /// Output each report via Google Pub/Sub
    #[arg(long)]
    reports_pubsub: bool,

    /// GCP project to output Pub/Sub reports to
    #[arg(long)]
    pubsub_project: Option<String>,

    /// Topic to output Pub/Sub reports to
    #[arg(long)]
    pubsub_topic: Option<String>,

    /// Limit stored controls to failed controls only
    #[arg(long)]
    only_failures: bool,

    /// Enable Prometheus metrics
    #[arg(long)]
    metrics_enabled: bool,

    /// Prometheus push gateway address (host:port)
    #[arg(long)]
    metrics_gateway: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Logs go to stderr; stdout is reserved for the report stream
fn setup_logging(level: LogLevel) {
    let Some(tracing_level) = level.to_tracing_level() else {
        return;
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

impl Args {
    /// Merge flags with their GCPAUDIT_* environment fallbacks into one
    /// configuration object
    fn into_config(self) -> AuditConfig {
        let defaults = AuditConfig::default();

        let project_filter = self.project_filter.or_else(|| {
            let v = env_or("GCPAUDIT_PROJECT_FILTER", "");
            (!v.is_empty()).then_some(v)
        });

        let iam_user_domains = self
            .iam_user_domains
            .map(|v| split_csv(&v))
            .unwrap_or_else(|| split_csv(&env_or("GCPAUDIT_IAM_USERDOMAINS", "")));

        let container_oauth_scopes = self
            .container_oauth_scopes
            .map(|v| split_csv(&v))
            .or_else(|| {
                let v = env_or("GCPAUDIT_CONTAINER_OAUTHSCOPES", "");
                (!v.is_empty()).then(|| split_csv(&v))
            })
            .unwrap_or(defaults.container_oauth_scopes);

        AuditConfig {
            project_filter,
            collector_concurrency: self
                .collector_concurrency
                .or_else(|| env_or("GCPAUDIT_COLLECTOR_CONCURRENCY", "").parse().ok())
                .unwrap_or(defaults.collector_concurrency),
            continue_on_error: self.continue_on_error || env_bool("GCPAUDIT_CONTINUE_ON_ERROR"),
            compute_num_interfaces: self
                .compute_num_interfaces
                .or_else(|| env_or("GCPAUDIT_COMPUTE_NUM_NICS", "").parse().ok())
                .unwrap_or(defaults.compute_num_interfaces),
            compute_allow_nat: self.compute_allow_nat || env_bool("GCPAUDIT_COMPUTE_ALLOW_NAT"),
            compute_allow_ip_forwarding: self.compute_allow_ip_forwarding
                || env_bool("GCPAUDIT_COMPUTE_ALLOW_IP_FORWARDING"),
            iam_user_domains,
            iam_sa_key_rotation_days: self
                .iam_sa_key_rotation_days
                .or_else(|| env_or("GCPAUDIT_IAM_SA_KEY_ROTATION_DAYS", "").parse().ok())
                .unwrap_or(defaults.iam_sa_key_rotation_days),
            container_oauth_scopes,
            reports_stdout: self.reports_stdout || env_bool("GCPAUDIT_ENABLE_STDOUT"),
            reports_pubsub: self.reports_pubsub || env_bool("GCPAUDIT_ENABLE_PUBSUB"),
            pubsub_project: self.pubsub_project.or_else(|| {
                let v = env_or("GCPAUDIT_PUBSUB_PROJECT", "");
                (!v.is_empty()).then_some(v)
            }),
            pubsub_topic: self
                .pubsub_topic
                .unwrap_or_else(|| env_or("GCPAUDIT_PUBSUB_TOPIC", &defaults.pubsub_topic)),
            only_failures: self.only_failures || env_bool("GCPAUDIT_ONLY_FAILURES"),
            metrics_enabled: self.metrics_enabled || env_bool("GCPAUDIT_METRICS_ENABLED"),
            metrics_gateway: self
                .metrics_gateway
                .unwrap_or_else(|| env_or("GCPAUDIT_METRICS_GATEWAY", &defaults.metrics_gateway)),
        }
    }
}

async fn run(config: AuditConfig) -> Result<()> {
    let mut audit = Audit::setup(config).await?;
    audit.execute().await?;
    audit.report().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logging(args.log_level);

    let config = args.into_config();

    if let Err(err) = run(config).await {
        eprintln!("gcpaudit: {err:#}");
        std::process::exit(1);
    }
}
