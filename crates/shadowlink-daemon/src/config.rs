//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shadowlink_discovery::ScannerConfig;
use shadowlink_proxy::EngineConfig;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the HTTP front-end
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Name this proxy announces itself with
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Discovery scan interval in seconds (0 scans once at startup)
    #[serde(default = "default_interval")]
    pub discovery_interval_secs: u64,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            device_name: default_device_name(),
            discovery_interval_secs: default_interval(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_device_name() -> String {
    "shadowlink".to_string()
}

fn default_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Port remote devices answer discovery on
    #[serde(default = "default_discovery_port")]
    pub port: u16,
    /// Response collection window in milliseconds
    #[serde(default = "default_window")]
    pub window_ms: u64,
    /// Send to ff05::158
    #[serde(default = "default_true")]
    pub site_local: bool,
    /// Send to ff03::158
    #[serde(default = "default_true")]
    pub realm_local: bool,
    /// Unicast addresses probed on every scan
    #[serde(default)]
    pub seeds: Vec<SocketAddr>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_discovery_port(),
            window_ms: default_window(),
            site_local: true,
            realm_local: true,
            seeds: Vec::new(),
        }
    }
}

fn default_discovery_port() -> u16 {
    5683
}

fn default_window() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Outbound request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    shadowlink_transport::DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Largest relayed payload in bytes
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_payload: default_max_payload(),
        }
    }
}

fn default_max_payload() -> usize {
    shadowlink_proxy::DEFAULT_MAX_PAYLOAD
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Slots in the D2D server list
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    shadowlink_core::bridge::DEFAULT_CAPACITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Base URL of the upstream broker; announcements are skipped when unset
    #[serde(default)]
    pub url: Option<String>,
    /// Announcement request timeout in seconds
    #[serde(default = "default_broker_timeout")]
    pub timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_broker_timeout(),
        }
    }
}

fn default_broker_timeout() -> u64 {
    10
}

impl Config {
    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            port: self.discovery.port,
            window_ms: self.discovery.window_ms,
            interval_secs: self.daemon.discovery_interval_secs,
            site_local: self.discovery.site_local,
            realm_local: self.discovery.realm_local,
            seeds: self.discovery.seeds.clone(),
        }
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_payload: self.relay.max_payload,
            bridge_capacity: self.bridge.capacity,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("Invalid configuration in {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
