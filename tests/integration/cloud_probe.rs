//! Cloud metadata probe against mock metadata servers
//!
//! Every provider gets its own mock server so unmounted paths answer 404 and
//! that provider is simply not detected.

use std::time::{Duration, Instant};

use infra_topology::{
    config::CloudConfig,
    live::CloudProvider,
    probes::{Probe, cloud::CloudMetadataProbe},
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const PROVIDER_TIMEOUT: Duration = Duration::from_millis(300);

struct Servers {
    gcp: MockServer,
    aws: MockServer,
    azure: MockServer,
}

impl Servers {
    async fn start() -> Self {
        Self {
            gcp: MockServer::start().await,
            aws: MockServer::start().await,
            azure: MockServer::start().await,
        }
    }

    fn probe(&self, provider_timeout: Duration) -> CloudMetadataProbe {
        let config = CloudConfig {
            enabled: true,
            gcp_url: self.gcp.uri(),
            aws_url: self.aws.uri(),
            azure_url: self.azure.uri(),
        };
        CloudMetadataProbe::new(&config, provider_timeout)
    }
}

async fn mount_gcp(server: &MockServer) {
    for (route, body) in [
        ("/computeMetadata/v1/project/project-id", "shop-prod"),
        (
            "/computeMetadata/v1/instance/zone",
            "projects/123456/zones/europe-west1-b",
        ),
        ("/computeMetadata/v1/instance/hostname", "vm-1.c.shop-prod.internal"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }
}

async fn mount_aws_metadata(server: &MockServer) {
    for (route, body) in [
        ("/latest/meta-data/instance-id", "i-0abc123"),
        ("/latest/meta-data/placement/region", "eu-central-1"),
        ("/latest/meta-data/instance-type", "t3.micro"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_gcp_detected() {
    let servers = Servers::start().await;
    mount_gcp(&servers.gcp).await;

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;

    assert!(placement.detected);
    assert_eq!(placement.provider, CloudProvider::Gcp);
    assert_eq!(placement.project_id.as_deref(), Some("shop-prod"));
    assert_eq!(placement.zone.as_deref(), Some("europe-west1-b"));
    assert_eq!(
        placement.hostname.as_deref(),
        Some("vm-1.c.shop-prod.internal")
    );
}

#[tokio::test]
async fn test_gcp_without_project_id_is_not_detected() {
    let servers = Servers::start().await;

    // zone alone is not enough
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/zone"))
        .respond_with(ResponseTemplate::new(200).set_body_string("projects/1/zones/a"))
        .mount(&servers.gcp)
        .await;

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;
    assert!(!placement.detected);
    assert_eq!(placement.provider, CloudProvider::None);
}

#[tokio::test]
async fn test_aws_with_token() {
    let servers = Servers::start().await;

    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .and(header("X-aws-ec2-metadata-token-ttl-seconds", "21600"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret-token"))
        .mount(&servers.aws)
        .await;

    for (route, body) in [
        ("/latest/meta-data/instance-id", "i-0abc123"),
        ("/latest/meta-data/placement/region", "eu-central-1"),
        ("/latest/meta-data/instance-type", "t3.micro"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("X-aws-ec2-metadata-token", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&servers.aws)
            .await;
    }

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;

    assert_eq!(placement.provider, CloudProvider::Aws);
    assert_eq!(placement.instance_id.as_deref(), Some("i-0abc123"));
    assert_eq!(placement.region.as_deref(), Some("eu-central-1"));
    assert_eq!(placement.instance_type.as_deref(), Some("t3.micro"));
}

#[tokio::test]
async fn test_aws_without_token_sends_plain_requests() {
    let servers = Servers::start().await;

    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&servers.aws)
        .await;

    Mock::given(method("GET"))
        .and(path("/latest/meta-data/instance-id"))
        .and(|request: &Request| !request.headers.contains_key("x-aws-ec2-metadata-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("i-0legacy"))
        .expect(1)
        .mount(&servers.aws)
        .await;

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;

    assert_eq!(placement.provider, CloudProvider::Aws);
    assert_eq!(placement.instance_id.as_deref(), Some("i-0legacy"));
    // region and type were not served
    assert_eq!(placement.region, None);
    assert_eq!(placement.instance_type, None);
}

#[tokio::test]
async fn test_aws_requires_instance_id() {
    let servers = Servers::start().await;

    Mock::given(method("GET"))
        .and(path("/latest/meta-data/placement/region"))
        .respond_with(ResponseTemplate::new(200).set_body_string("eu-central-1"))
        .mount(&servers.aws)
        .await;

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;
    assert!(!placement.detected);
}

#[tokio::test]
async fn test_azure_detected() {
    let servers = Servers::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/instance"))
        .and(query_param("api-version", "2021-02-01"))
        .and(header("Metadata", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "compute": { "location": "westeurope", "name": "shop-vm", "vmId": "abc" },
            "network": {}
        })))
        .mount(&servers.azure)
        .await;

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;

    assert_eq!(placement.provider, CloudProvider::Azure);
    assert_eq!(placement.region.as_deref(), Some("westeurope"));
    assert_eq!(placement.vm_name.as_deref(), Some("shop-vm"));
}

#[tokio::test]
async fn test_gcp_wins_over_aws() {
    let servers = Servers::start().await;
    mount_gcp(&servers.gcp).await;
    mount_aws_metadata(&servers.aws).await;

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;
    assert_eq!(placement.provider, CloudProvider::Gcp);
    assert_eq!(placement.instance_id, None);
}

#[tokio::test]
async fn test_aws_wins_over_azure() {
    let servers = Servers::start().await;
    mount_aws_metadata(&servers.aws).await;

    Mock::given(method("GET"))
        .and(path("/metadata/instance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "compute": { "location": "westeurope", "name": "shop-vm" }
        })))
        .mount(&servers.azure)
        .await;

    let placement = servers.probe(PROVIDER_TIMEOUT).detect().await;
    assert_eq!(placement.provider, CloudProvider::Aws);
    assert_eq!(placement.vm_name, None);
}

#[tokio::test]
async fn test_slow_provider_counts_as_absent() {
    let servers = Servers::start().await;

    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/project/project-id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("shop-prod")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&servers.gcp)
        .await;
    mount_aws_metadata(&servers.aws).await;

    let started = Instant::now();
    let placement = servers.probe(Duration::from_millis(100)).detect().await;

    assert_eq!(placement.provider, CloudProvider::Aws);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_no_provider_is_a_successful_collection() {
    let servers = Servers::start().await;

    let placement = servers
        .probe(PROVIDER_TIMEOUT)
        .collect(Duration::from_secs(2))
        .await
        .unwrap();

    assert!(!placement.detected);
    assert_eq!(placement.provider, CloudProvider::None);
}
