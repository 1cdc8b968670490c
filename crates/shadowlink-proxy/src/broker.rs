//! Announcement of published shadow resources to an upstream broker

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::resource::ResourceDescriptor;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Broker request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Broker rejected announcement with HTTP {0}")]
    Rejected(u16),
}

/// Upstream registry that learns about each published shadow resource
#[async_trait]
pub trait Broker: Send + Sync {
    async fn announce(&self, descriptor: &ResourceDescriptor) -> Result<(), BrokerError>;
}

/// Used when no broker is configured
pub struct NoopBroker;

#[async_trait]
impl Broker for NoopBroker {
    async fn announce(&self, descriptor: &ResourceDescriptor) -> Result<(), BrokerError> {
        debug!(href = %descriptor.href, "No broker configured, skipping announcement");
        Ok(())
    }
}

#[derive(Serialize)]
struct Announcement<'a> {
    device: &'a str,
    resource: &'a ResourceDescriptor,
}

/// Broker reached over HTTP
pub struct HttpBroker {
    client: reqwest::Client,
    endpoint: String,
    device_name: String,
}

impl HttpBroker {
    /// Announce to `<url>/api/resources` on behalf of `device_name`
    pub fn new(url: &str, device_name: &str, timeout_secs: u64) -> Result<Self, BrokerError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/resources", url.trim_end_matches('/')),
            device_name: device_name.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Broker for HttpBroker {
    async fn announce(&self, descriptor: &ResourceDescriptor) -> Result<(), BrokerError> {
        let body = Announcement {
            device: &self.device_name,
            resource: descriptor,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(BrokerError::Rejected(response.status().as_u16()));
        }
        info!(href = %descriptor.href, broker = %self.endpoint, "Announced resource");
        Ok(())
    }
}
