//! Application state management

use anyhow::{Context, Result};
use shadowlink_core::{BridgeEntry, DiscoveredEndpoint};
use shadowlink_discovery::{DiscoveryEvent, DiscoveryHandler, DiscoveryScanner};
use shadowlink_proxy::{Broker, HttpBroker, NoopBroker, ProxyEngine, ResourceDescriptor};
use shadowlink_transport::{TransportClient, UdpTransport};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::Config;

/// Events forwarded to WebSocket clients
#[derive(Debug, Clone)]
pub enum ProxyEvent {
    Discovery(DiscoveryEvent),
    ShadowPublished(ResourceDescriptor),
}

/// Shared application state
pub struct AppState {
    /// Discovery scanner
    pub scanner: Arc<DiscoveryScanner>,
    /// Registries, resource tree, and relay
    pub engine: ProxyEngine,
    /// Configuration
    pub config: Config,
    /// Event broadcast for WebSocket clients
    pub events: broadcast::Sender<ProxyEvent>,
}

impl AppState {
    /// Create new application state
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let transport: Arc<dyn TransportClient> = Arc::new(UdpTransport::new(config.transport.timeout_ms));
        let broker = build_broker(&config)?;

        let engine = ProxyEngine::new(config.to_engine_config(), transport, broker)
            .await
            .context("Failed to start proxy engine")?;
        let scanner = Arc::new(DiscoveryScanner::new(config.to_scanner_config()));

        let (events, _) = broadcast::channel(100);

        let state = Arc::new(Self {
            scanner,
            engine,
            config,
            events,
        });

        // Forward scanner events
        let events = state.events.clone();
        let mut rx = state.scanner.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                let _ = events.send(ProxyEvent::Discovery(event));
            }
            debug!("Scanner event channel closed");
        });

        // Forward newly published shadows
        let events = state.events.clone();
        let mut rx = state.engine.registrar.subscribe();
        tokio::spawn(async move {
            while let Ok(descriptor) = rx.recv().await {
                let _ = events.send(ProxyEvent::ShadowPublished(descriptor));
            }
            debug!("Registrar event channel closed");
        });

        Ok(state)
    }

    /// Handler that turns discovered resources into shadows
    pub fn discovery_handler(&self) -> Arc<dyn DiscoveryHandler> {
        self.engine.registrar.clone()
    }

    /// Run one discovery pass
    pub async fn scan(&self) -> Result<usize> {
        let found = self.scanner.scan_once(self.engine.registrar.as_ref()).await?;
        Ok(found)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ProxyEvent> {
        self.events.subscribe()
    }

    /// Devices recorded by discovery
    pub async fn devices(&self) -> Vec<DiscoveredEndpoint> {
        self.engine.endpoints.read().await.iter().cloned().collect()
    }

    /// Published resources, shadows and local alike
    pub async fn resources(&self) -> Vec<ResourceDescriptor> {
        self.engine.tree.descriptors().await
    }

    /// Devices admitted to the D2D server list
    pub async fn servers(&self) -> Vec<BridgeEntry> {
        self.engine.bridge.read().await.list().into_iter().cloned().collect()
    }
}

fn build_broker(config: &Config) -> Result<Arc<dyn Broker>> {
    match &config.broker.url {
        Some(url) => {
            let broker = HttpBroker::new(url, &config.daemon.device_name, config.broker.timeout_secs)
                .context("Failed to create broker client")?;
            info!(broker = %broker.endpoint(), "Announcing shadows to broker");
            Ok(Arc::new(broker))
        }
        None => Ok(Arc::new(NoopBroker)),
    }
}
