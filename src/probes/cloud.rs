//! Cloud-metadata probe
//!
//! Detects whether the host runs on GCP, AWS or Azure by querying each
//! provider's metadata service. The three checks run concurrently, each with
//! its own short timeout, so running outside any cloud costs at most one
//! provider timeout. Provider failures never surface as errors; a provider
//! that does not answer is simply not detected.
//!
//! ## Provider protocols
//!
//! - **GCP**: `project/project-id`, then (only if that succeeded) `instance/zone`
//!   and `instance/hostname`, all with `Metadata-Flavor: Google`
//! - **AWS**: IMDSv2 token via `PUT /latest/api/token`, then instance-id,
//!   region and instance-type in parallel. Without a token the queries go out
//!   without the token header (IMDSv1)
//! - **Azure**: a single `GET /metadata/instance` with `Metadata: true`
//!
//! When several providers answer, GCP wins over AWS, AWS over Azure.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, trace};

use crate::config::CloudConfig;
use crate::live::{CloudPlacement, CloudProvider};
use crate::util::join_url;

use super::{Probe, ProbeResult, bounded};

const AWS_TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const AWS_TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const AWS_TOKEN_TTL_SECONDS: &str = "21600";
const AZURE_API_VERSION: &str = "2021-02-01";

#[derive(Debug, Deserialize)]
struct AzureInstance {
    compute: AzureCompute,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureCompute {
    location: Option<String>,
    name: Option<String>,
}

/// Probe for the cloud placement of the current host
pub struct CloudMetadataProbe {
    client: reqwest::Client,
    gcp_url: String,
    aws_url: String,
    azure_url: String,

    /// Bound for each provider check
    provider_timeout: Duration,
}

impl CloudMetadataProbe {
    pub fn new(config: &CloudConfig, provider_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            gcp_url: config.gcp_url.clone(),
            aws_url: config.aws_url.clone(),
            azure_url: config.azure_url.clone(),
            provider_timeout,
        }
    }

    /// Query all providers concurrently and keep the highest-priority hit
    pub async fn detect(&self) -> CloudPlacement {
        let (gcp, aws, azure) = tokio::join!(
            self.within(CloudProvider::Gcp, self.gcp()),
            self.within(CloudProvider::Aws, self.aws()),
            self.within(CloudProvider::Azure, self.azure()),
        );

        let placement = gcp.or(aws).or(azure).unwrap_or_else(CloudPlacement::undetected);
        debug!("cloud provider: {}", placement.provider);
        placement
    }

    async fn within<F>(&self, provider: CloudProvider, check: F) -> Option<CloudPlacement>
    where
        F: Future<Output = Option<CloudPlacement>>,
    {
        match tokio::time::timeout(self.provider_timeout, check).await {
            Ok(placement) => placement,
            Err(_) => {
                trace!("{provider} metadata did not answer in time");
                None
            }
        }
    }

    async fn gcp(&self) -> Option<CloudPlacement> {
        let project_id = self.gcp_get("project/project-id").await?;

        // zone comes back as projects/<number>/zones/<zone>
        let zone = self
            .gcp_get("instance/zone")
            .await
            .and_then(|zone| zone.rsplit('/').next().map(str::to_string));
        let hostname = self.gcp_get("instance/hostname").await;

        Some(CloudPlacement {
            project_id: Some(project_id),
            zone,
            hostname,
            ..CloudPlacement::detected(CloudProvider::Gcp)
        })
    }

    async fn gcp_get(&self, path: &str) -> Option<String> {
        let url = join_url(&self.gcp_url, &format!("computeMetadata/v1/{path}"));
        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .ok()?;
        success_text(response).await
    }

    async fn aws(&self) -> Option<CloudPlacement> {
        let token = self.aws_token().await;
        let token = token.as_deref();

        let (instance_id, region, instance_type) = tokio::join!(
            self.aws_get("meta-data/instance-id", token),
            self.aws_get("meta-data/placement/region", token),
            self.aws_get("meta-data/instance-type", token),
        );

        Some(CloudPlacement {
            instance_id: Some(instance_id?),
            region,
            instance_type,
            ..CloudPlacement::detected(CloudProvider::Aws)
        })
    }

    async fn aws_token(&self) -> Option<String> {
        let url = join_url(&self.aws_url, "latest/api/token");
        let response = self
            .client
            .put(url)
            .header(AWS_TOKEN_TTL_HEADER, AWS_TOKEN_TTL_SECONDS)
            .send()
            .await
            .ok()?;
        let token = success_text(response).await;
        if token.is_none() {
            trace!("no IMDSv2 token granted, falling back to plain requests");
        }
        token
    }

    async fn aws_get(&self, path: &str, token: Option<&str>) -> Option<String> {
        let url = join_url(&self.aws_url, &format!("latest/{path}"));

        if let Some(token) = token {
            let with_token = match self
                .client
                .get(&url)
                .header(AWS_TOKEN_HEADER, token)
                .send()
                .await
            {
                Ok(response) => success_text(response).await,
                Err(_) => None,
            };
            if with_token.is_some() {
                return with_token;
            }
        }

        let response = self.client.get(&url).send().await.ok()?;
        success_text(response).await
    }

    async fn azure(&self) -> Option<CloudPlacement> {
        let url = join_url(
            &self.azure_url,
            &format!("metadata/instance?api-version={AZURE_API_VERSION}"),
        );
        let response = self
            .client
            .get(url)
            .header("Metadata", "true")
            .send()
            .await
            .ok()?;
        let body = success_text(response).await?;
        let instance: AzureInstance = serde_json::from_str(&body).ok()?;

        Some(CloudPlacement {
            region: instance.compute.location,
            vm_name: instance.compute.name,
            ..CloudPlacement::detected(CloudProvider::Azure)
        })
    }
}

async fn success_text(response: reqwest::Response) -> Option<String> {
    if !response.status().is_success() {
        return None;
    }
    let text = response.text().await.ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl Probe for CloudMetadataProbe {
    type Output = CloudPlacement;

    fn name(&self) -> &str {
        "cloud"
    }

    #[instrument(skip(self))]
    async fn collect(&self, timeout: Duration) -> ProbeResult<CloudPlacement> {
        bounded(timeout, async { Ok(self.detect().await) }).await
    }
}
