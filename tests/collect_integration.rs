//! Integration tests for the collection pipeline using wiremock
//!
//! These tests drive the real client and collectors against mocked GCP
//! endpoints, covering pagination, per-project API-enablement gating,
//! and the full collect-evaluate-publish path.

use gcpaudit::audit::Audit;
use gcpaudit::collect;
use gcpaudit::config::AuditConfig;
use gcpaudit::gcp::auth::GcpCredentials;
use gcpaudit::gcp::client::{ApiEndpoints, GcpClient};
use gcpaudit::gcp::projects::{self, Project};
use gcpaudit::report::Status;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> GcpClient {
    GcpClient::with_endpoints(
        GcpCredentials::with_static_token("test-token"),
        ApiEndpoints::with_base(&server.uri()),
    )
    .expect("client should build")
}

fn project_with_services(id: &str, services: &[&str]) -> Project {
    let mut project = Project::from(&json!({"projectId": id, "name": id}));
    project.services = services
        .iter()
        .map(|s| format!("projects/1234/services/{s}"))
        .collect();
    project
}

mod project_discovery {
    use super::*;

    /// Discovery follows nextPageToken and fetches services per project
    #[tokio::test]
    async fn test_discovery_paginates_and_loads_services() {
        let server = MockServer::start().await;

        // First page carries a continuation token
        Mock::given(method("GET"))
            .and(path("/resourcemanager/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [
                    {"projectId": "proj-a", "name": "proj-a", "lifecycleState": "ACTIVE"}
                ],
                "nextPageToken": "token-page-2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        // Second page is final
        Mock::given(method("GET"))
            .and(path("/resourcemanager/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [
                    {"projectId": "proj-b", "name": "proj-b", "lifecycleState": "ACTIVE"}
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/serviceusage/v1/projects/proj-a/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [
                    {"name": "projects/1234/services/compute.googleapis.com", "state": "ENABLED"}
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/serviceusage/v1/projects/proj-b/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [
                    {"name": "projects/5678/services/storage.googleapis.com", "state": "ENABLED"}
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let projects = projects::discover(&client, "proj-*", 4).await.unwrap();

        assert_eq!(projects.len(), 2);
        let proj_a = projects.iter().find(|p| p.project_id == "proj-a").unwrap();
        assert!(proj_a.has_service("compute.googleapis.com"));
        let proj_b = projects.iter().find(|p| p.project_id == "proj-b").unwrap();
        assert!(!proj_b.has_service("compute.googleapis.com"));
    }

    /// Zero matching projects aborts rather than auditing nothing
    #[tokio::test]
    async fn test_no_matching_projects_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/resourcemanager/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = projects::discover(&client, "nothing-*", 4).await.unwrap_err();
        assert!(err.to_string().contains("No projects found"));
    }
}

mod compute_gating {
    use super::*;

    /// A project without the compute API yields an empty view set, not
    /// an error; the enabled project yields the fixture instances
    #[tokio::test]
    async fn test_disabled_api_yields_empty_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "proj-a",
                "commonInstanceMetadata": {"items": []}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/zones/us-central1-a/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "vm-1", "status": "RUNNING"},
                    {"name": "vm-2", "status": "RUNNING"}
                ]
            })))
            .mount(&server)
            .await;

        // Note: no compute mocks exist for proj-b; a stray call would 404

        let client = test_client(&server);
        let projects = vec![
            project_with_services("proj-a", &["compute.googleapis.com"]),
            project_with_services("proj-b", &["storage.googleapis.com"]),
        ];
        let zones = vec!["us-central1-a".to_string()];

        let collected = collect::compute::collect(&client, &projects, &zones, 4).await;
        assert!(collected.ensure_complete().is_ok());

        let proj_a = collected.get("proj-a").unwrap().as_ref().unwrap();
        assert_eq!(proj_a.instances.len(), 2);
        assert!(proj_a.project.is_some());

        let proj_b = collected.get("proj-b").unwrap().as_ref().unwrap();
        assert!(proj_b.instances.is_empty());
        assert!(proj_b.project.is_none());
    }

    /// Instance listing follows nextPageToken until exhausted
    #[tokio::test]
    async fn test_instance_pagination() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "proj-a"})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/zones/us-central1-a/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "vm-1"}, {"name": "vm-2"}],
                "nextPageToken": "token-page-2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/zones/us-central1-a/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "vm-3"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let projects = vec![project_with_services("proj-a", &["compute.googleapis.com"])];
        let zones = vec!["us-central1-a".to_string()];

        let collected = collect::compute::collect(&client, &projects, &zones, 4).await;
        let proj_a = collected.get("proj-a").unwrap().as_ref().unwrap();
        assert_eq!(proj_a.instances.len(), 3);
    }

    /// An API failure becomes that project's error outcome; the other
    /// project still collects
    #[tokio::test]
    async fn test_api_failure_is_contained_per_project() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Permission denied"}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "proj-b"})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let projects = vec![
            project_with_services("proj-a", &["compute.googleapis.com"]),
            project_with_services("proj-b", &["compute.googleapis.com"]),
        ];

        let collected = collect::compute::collect(&client, &projects, &[], 4).await;
        assert!(collected.get("proj-a").unwrap().is_err());
        assert!(collected.get("proj-b").unwrap().is_ok());
        assert!(collected.ensure_complete().is_err());
    }
}

mod full_pipeline {
    use super::*;

    async fn mount_fleet(server: &MockServer) {
        // Two projects: proj-a has compute + container, proj-b does not
        Mock::given(method("GET"))
            .and(path("/resourcemanager/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [
                    {"projectId": "proj-a", "name": "proj-a", "lifecycleState": "ACTIVE"},
                    {"projectId": "proj-b", "name": "proj-b", "lifecycleState": "ACTIVE"}
                ]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/serviceusage/v1/projects/proj-a/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [
                    {"name": "projects/1/services/compute.googleapis.com"},
                    {"name": "projects/1/services/container.googleapis.com"}
                ]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/serviceusage/v1/projects/proj-b/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [{"name": "projects/2/services/storage.googleapis.com"}]
            })))
            .mount(server)
            .await;

        // Shared zone and region lists come from proj-a
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "us-central1-a"}]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "us-central1"}]
            })))
            .mount(server)
            .await;

        // Compute: one hardened project with one instance
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "proj-a",
                "commonInstanceMetadata": {"items": [
                    {"key": "block-project-ssh-keys", "value": "true"},
                    {"key": "enable-oslogin", "value": "true"},
                    {"key": "disable-legacy-endpoints", "value": "true"}
                ]}
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/zones/us-central1-a/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "name": "vm-1",
                    "networkInterfaces": [{"network": "prod-vpc"}],
                    "serviceAccounts": [{"email": "svc@proj-a.iam.gserviceaccount.com"}],
                    "metadata": {"items": []},
                    "disks": [{"source": "disk-1", "diskEncryptionKey": {"sha256": "x"}}],
                    "canIpForward": false
                }]
            })))
            .mount(server)
            .await;

        // Networking
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/global/networks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "prod-vpc"}]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/regions/us-central1/subnetworks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "name": "prod-subnet",
                    "region": "regions/us-central1",
                    "privateIpGoogleAccess": true,
                    "enableFlowLogs": true
                }]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/global/firewalls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "name": "allow-internal",
                    "network": "prod-vpc",
                    "sourceRanges": ["10.0.0.0/8"],
                    "allowed": [{"IPProtocol": "tcp", "ports": ["22"]}]
                }]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/aggregated/addresses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {
                    "regions/us-central1": {"addresses": [{"name": "lb-ip"}]}
                }
            })))
            .mount(server)
            .await;

        // Storage: one private bucket per project
        for (project, bucket) in [("proj-a", "bucket-a"), ("proj-b", "bucket-b")] {
            Mock::given(method("GET"))
                .and(path("/storage/v1/b"))
                .and(wiremock::matchers::query_param("project", project))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "items": [{"name": bucket}]
                })))
                .mount(server)
                .await;

            Mock::given(method("GET"))
                .and(path(format!("/storage/v1/b/{bucket}/acl")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "items": [{"entity": "project-owners-1", "role": "OWNER"}]
                })))
                .mount(server)
                .await;
        }

        // IAM
        for project in ["proj-a", "proj-b"] {
            Mock::given(method("POST"))
                .and(path(format!("/resourcemanager/v1/projects/{project}:getIamPolicy")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
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
                })))
                .mount(server)
                .await;

            Mock::given(method("GET"))
                .and(path(format!("/iam/v1/projects/{project}/serviceAccounts")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .mount(server)
                .await;

            Mock::given(method("GET"))
                .and(path(format!("/logging/v2/projects/{project}/sinks")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "sinks": [{"name": "export-all", "filter": ""}]
                })))
                .mount(server)
                .await;

            // Every filter the benchmark expects to be monitored exists
            let monitored: Vec<_> = gcpaudit::check::logging::METRIC_FILTERS
                .iter()
                .enumerate()
                .map(|(i, (_, _, filter))| json!({"name": format!("metric-{i}"), "filter": filter}))
                .collect();
            Mock::given(method("GET"))
                .and(path(format!("/logging/v2/projects/{project}/metrics")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "metrics": monitored
                })))
                .mount(server)
                .await;
        }

        // Container: only proj-a has the API enabled
        Mock::given(method("GET"))
            .and(path("/container/v1/projects/proj-a/locations/-/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clusters": [{
                    "name": "prod-cluster",
                    "loggingService": "logging.googleapis.com",
                    "monitoringService": "monitoring.googleapis.com",
                    "masterAuthorizedNetworksConfig": {"enabled": true},
                    "addonsConfig": {
                        "kubernetesDashboard": {"disabled": true},
                        "networkPolicyConfig": {"disabled": false}
                    },
                    "masterAuth": {},
                    "ipAllocationPolicy": {"useIpAliases": true},
                    "privateClusterConfig": {
                        "enablePrivateEndpoint": true,
                        "enablePrivateNodes": true
                    },
                    "nodeConfig": {
                        "serviceAccount": "gke@proj-a.iam.gserviceaccount.com",
                        "oauthScopes": ["https://www.googleapis.com/auth/monitoring"]
                    },
                    "nodePools": [{
                        "name": "default-pool",
                        "config": {
                            "imageType": "COS",
                            "metadata": {"disable-legacy-endpoints": "true"}
                        },
                        "management": {"autoRepair": true, "autoUpgrade": true}
                    }]
                }]
            })))
            .mount(server)
            .await;
    }

    /// The whole run: discovery, gated collection, evaluation
    #[tokio::test]
    async fn test_execute_produces_reports_per_category() {
        let server = MockServer::start().await;
        mount_fleet(&server).await;

        let config = AuditConfig {
            project_filter: Some("proj-*".to_string()),
            iam_user_domains: vec!["corp.example.com".to_string()],
            ..Default::default()
        };

        let mut audit = Audit::with_client(config, test_client(&server)).unwrap();
        audit.execute().await.unwrap();

        let count = |typ: &str| {
            audit
                .reports()
                .iter()
                .filter(|r| r.report_type == typ)
                .count()
        };

        // Compute categories only cover proj-a (proj-b is gated)
        assert_eq!(count("compute_metadata"), 1);
        assert_eq!(count("compute_instance"), 1);
        assert_eq!(count("compute_network"), 1);
        assert_eq!(count("compute_subnetwork"), 1);
        assert_eq!(count("compute_firewall_rule"), 1);
        assert_eq!(count("compute_address"), 1);

        // Project-scoped categories cover both projects
        assert_eq!(count("logging_configuration"), 2);
        assert_eq!(count("iam_policy"), 2);
        assert_eq!(count("storage_bucket"), 2);

        // Container categories only cover proj-a
        assert_eq!(count("container_cluster"), 1);
        assert_eq!(count("container_nodepool"), 1);

        // The hardened fleet passes everything
        for report in audit.reports() {
            assert_eq!(
                report.status(),
                Status::Passed,
                "unexpected failure in {}: {:?}",
                report.title,
                report
                    .controls
                    .iter()
                    .filter(|c| c.status == Status::Failed)
                    .collect::<Vec<_>>()
            );
        }
    }
}

mod pubsub_publishing {
    use super::*;
    use gcpaudit::report::{Control, Report, Reporter};
    use gcpaudit::report::pubsub::PubSubReporter;

    fn fixture_reports(n: usize) -> Vec<Report> {
        (0..n)
            .map(|i| {
                let mut report = Report::new("storage_bucket", &format!("bucket-{i}"));
                report.add_controls(false, vec![Control::new("c", "d")]);
                report
            })
            .collect()
    }

    /// Every report goes out as one message
    #[tokio::test]
    async fn test_publish_sends_one_message_per_report() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/pubsub/v1/projects/audit-hub/topics/gcpaudit:publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messageIds": ["1"]
            })))
            .expect(3)
            .mount(&server)
            .await;

        let reporter = PubSubReporter::new(test_client(&server), "audit-hub", "gcpaudit");
        reporter.publish(&fixture_reports(3)).await.unwrap();
    }

    /// Unacknowledged publishes are counted and fail the sink
    #[tokio::test]
    async fn test_publish_failures_are_counted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/pubsub/v1/projects/audit-hub/topics/gcpaudit:publish"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"code": 500, "message": "backend error"}
            })))
            .mount(&server)
            .await;

        let reporter = PubSubReporter::new(test_client(&server), "audit-hub", "gcpaudit");
        let err = reporter.publish(&fixture_reports(2)).await.unwrap_err();
        assert_eq!(err.to_string(), "2 of 2 reports did not publish");
    }
}
