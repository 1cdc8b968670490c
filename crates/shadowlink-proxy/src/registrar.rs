//! Creation of shadow resources for discovered remote resources

use async_trait::async_trait;
use shadowlink_core::{
    is_bridgeable, naming, DiscoveredResource, EndpointRegistry, Interface, InterfaceMask, NamingError,
    Status,
};
use shadowlink_discovery::{DiscoveryFlow, DiscoveryHandler};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace, warn};

use crate::broker::Broker;
use crate::relay::{Acknowledge, RelayEngine, RelayRetrieve};
use crate::resource::{Operation, Resource, ResourceDescriptor, ResourceError, ResourceTree};

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error(transparent)]
    Naming(#[from] NamingError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Result of handling one discovered resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new shadow resource was published at this path
    Published(String),
    /// A shadow already exists at this path
    AlreadyShadowed(String),
}

/// Interfaces that become the default when advertised, lowest precedence first
const DEFAULT_CANDIDATES: [Interface; 4] = [
    Interface::ReadOnly,
    Interface::ReadWrite,
    Interface::Actuator,
    Interface::Sensor,
];

/// Bind the advertised interfaces; the last advertised candidate becomes the default
pub fn bind_interfaces(resource: &mut Resource, mask: InterfaceMask) {
    if mask.contains(Interface::Baseline) {
        resource.bind_interface(Interface::Baseline);
    }
    for iface in DEFAULT_CANDIDATES {
        if mask.contains(iface) {
            resource.set_default_interface(iface);
        }
    }
}

pub struct ShadowRegistrar {
    endpoints: Arc<RwLock<EndpointRegistry>>,
    tree: Arc<ResourceTree>,
    relay: Arc<RelayEngine>,
    broker: Arc<dyn Broker>,
    published_tx: broadcast::Sender<ResourceDescriptor>,
}

impl ShadowRegistrar {
    pub fn new(
        endpoints: Arc<RwLock<EndpointRegistry>>,
        tree: Arc<ResourceTree>,
        relay: Arc<RelayEngine>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        let (published_tx, _) = broadcast::channel(100);
        Self {
            endpoints,
            tree,
            relay,
            broker,
            published_tx,
        }
    }

    /// Subscribe to newly published shadow resources
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceDescriptor> {
        self.published_tx.subscribe()
    }

    /// Shadow one discovered resource
    pub async fn register(&self, discovered: &DiscoveredResource) -> Result<Registration, RegistrarError> {
        let udn = naming::udn_from_anchor(&discovered.anchor)?;

        if self.endpoints.read().await.lookup(&udn).is_none() {
            self.endpoints
                .write()
                .await
                .record(udn.clone(), discovered.endpoints.clone());
        }

        let path = naming::encode(&udn, &discovered.href);
        if self.tree.contains(&path).await {
            debug!(path = %path, "Shadow already published");
            return Ok(Registration::AlreadyShadowed(path));
        }

        let mut resource = Resource::new(path.clone());
        for rt in &discovered.resource_types {
            resource.bind_type(rt);
        }
        bind_interfaces(&mut resource, discovered.interfaces);
        resource.set_handler(Operation::Retrieve, Arc::new(RelayRetrieve::new(self.relay.clone())));
        resource.set_handler(Operation::Update, Arc::new(Acknowledge::new(Status::CHANGED)));
        resource.set_handler(Operation::Delete, Arc::new(Acknowledge::new(Status::DELETED)));

        let resource = match self.tree.publish(resource).await {
            Ok(resource) => resource,
            Err(ResourceError::AlreadyPublished(path)) => {
                debug!(path = %path, "Shadow published concurrently");
                return Ok(Registration::AlreadyShadowed(path));
            }
        };

        let descriptor = resource.descriptor();
        if let Err(e) = self.broker.announce(&descriptor).await {
            warn!(path = %path, error = %e, "Announce failed");
        }
        let _ = self.published_tx.send(descriptor);

        Ok(Registration::Published(path))
    }
}

#[async_trait]
impl DiscoveryHandler for ShadowRegistrar {
    async fn on_resource(&self, discovered: &DiscoveredResource) -> DiscoveryFlow {
        for rt in &discovered.resource_types {
            if !is_bridgeable(rt) {
                trace!(rt = %rt, href = %discovered.href, "Resource type not bridgeable");
                continue;
            }
            if let Err(e) = self.register(discovered).await {
                warn!(anchor = %discovered.anchor, href = %discovered.href, error = %e, "Cannot shadow resource");
            }
        }
        DiscoveryFlow::Continue
    }
}
