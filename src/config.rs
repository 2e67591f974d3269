use std::net::SocketAddr;
use std::time::Duration;

use tracing::trace;

use crate::layout::LayoutConfig;

/// Default endpoint of the local port-scan service
pub const DEFAULT_PORT_SCAN_URL: &str = "http://127.0.0.1:3001/api/ports";

/// Hub configuration
///
/// Every field is optional in the JSON file. Layout options live at the top
/// level (`layoutDirection`, `nodeSpacing`, `rankSpacing`, ...).
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Container probe cadence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Port scan probe cadence
    #[serde(default = "default_port_scan_interval_ms")]
    pub port_scan_interval_ms: u64,

    /// Upper bound for a single probe invocation
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Cloud metadata probe cadence
    #[serde(default = "default_cloud_interval_ms")]
    pub cloud_interval_ms: u64,

    /// Per-provider bound for cloud metadata requests
    #[serde(default = "default_cloud_timeout_ms")]
    pub cloud_timeout_ms: u64,

    /// Port-scan endpoint (`null` disables port based detection)
    #[serde(default = "default_port_scan_url")]
    pub port_scan_url: Option<String>,

    /// Docker socket path (platform default if absent)
    #[serde(default)]
    pub docker_socket: Option<String>,

    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(flatten)]
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            port_scan_interval_ms: default_port_scan_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            cloud_interval_ms: default_cloud_interval_ms(),
            cloud_timeout_ms: default_cloud_timeout_ms(),
            port_scan_url: default_port_scan_url(),
            docker_socket: None,
            cloud: CloudConfig::default(),
            api: ApiSettings::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn port_scan_interval(&self) -> Duration {
        Duration::from_millis(self.port_scan_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn cloud_interval(&self) -> Duration {
        Duration::from_millis(self.cloud_interval_ms)
    }

    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_millis(self.cloud_timeout_ms)
    }
}

/// Cloud metadata endpoints
///
/// The defaults are the providers' link-local addresses. They are only
/// configurable so the probe can be pointed at something else (tests,
/// metadata proxies).
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gcp_url")]
    pub gcp_url: String,

    #[serde(default = "default_aws_url")]
    pub aws_url: String,

    #[serde(default = "default_azure_url")]
    pub azure_url: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gcp_url: default_gcp_url(),
            aws_url: default_aws_url(),
            azure_url: default_azure_url(),
        }
    }
}

/// HTTP API settings
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            enable_cors: true,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_port_scan_interval_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_cloud_interval_ms() -> u64 {
    300_000
}

fn default_cloud_timeout_ms() -> u64 {
    100
}

fn default_port_scan_url() -> Option<String> {
    Some(DEFAULT_PORT_SCAN_URL.to_string())
}

fn default_gcp_url() -> String {
    String::from("http://metadata.google.internal")
}

fn default_aws_url() -> String {
    String::from("http://169.254.169.254")
}

fn default_azure_url() -> String {
    String::from("http://169.254.169.254")
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_true() -> bool {
    true
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;

    anyhow::ensure!(config.poll_interval_ms > 0, "pollIntervalMs must be positive");
    anyhow::ensure!(
        config.port_scan_interval_ms > 0,
        "portScanIntervalMs must be positive"
    );
    anyhow::ensure!(config.cloud_interval_ms > 0, "cloudIntervalMs must be positive");
    anyhow::ensure!(config.probe_timeout_ms > 0, "probeTimeoutMs must be positive");
    config.layout.validate().map_err(anyhow::Error::msg)?;

    trace!("loaded config: {config:?}");
    Ok(config)
}
