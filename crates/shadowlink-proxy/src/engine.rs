//! The proxy engine: registries, resource tree, relay, and registrar wired together

use shadowlink_core::{BridgeRegistry, EndpointRegistry};
use shadowlink_transport::TransportClient;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::broker::Broker;
use crate::d2d::d2d_resource;
use crate::registrar::ShadowRegistrar;
use crate::relay::RelayEngine;
use crate::resource::{Request, ResourceError, ResourceTree, Response};

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Largest relayed payload returned to a caller
    pub max_payload: usize,
    /// Slots in the D2D server list
    pub bridge_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_payload: crate::relay::DEFAULT_MAX_PAYLOAD,
            bridge_capacity: shadowlink_core::bridge::DEFAULT_CAPACITY,
        }
    }
}

/// Process-wide proxy state
pub struct ProxyEngine {
    pub endpoints: Arc<RwLock<EndpointRegistry>>,
    pub bridge: Arc<RwLock<BridgeRegistry>>,
    pub tree: Arc<ResourceTree>,
    pub relay: Arc<RelayEngine>,
    pub registrar: Arc<ShadowRegistrar>,
}

impl ProxyEngine {
    /// Build the engine and publish the server list resource
    pub async fn new(
        config: EngineConfig,
        transport: Arc<dyn TransportClient>,
        broker: Arc<dyn Broker>,
    ) -> Result<Self, ResourceError> {
        let endpoints = Arc::new(RwLock::new(EndpointRegistry::new()));
        let bridge = Arc::new(RwLock::new(BridgeRegistry::new(config.bridge_capacity)));
        let tree = Arc::new(ResourceTree::new());
        let relay = Arc::new(RelayEngine::new(endpoints.clone(), transport, config.max_payload));
        let registrar = Arc::new(ShadowRegistrar::new(
            endpoints.clone(),
            tree.clone(),
            relay.clone(),
            broker,
        ));

        tree.publish(d2d_resource(bridge.clone(), endpoints.clone())).await?;

        Ok(Self {
            endpoints,
            bridge,
            tree,
            relay,
            registrar,
        })
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        self.tree.dispatch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::NoopBroker;
    use crate::d2d::D2D_PATH;
    use crate::resource::Operation;
    use async_trait::async_trait;
    use serde_json::json;
    use shadowlink_core::{DiscoveredResource, Endpoint, InterfaceMask, Status};
    use shadowlink_discovery::DiscoveryHandler;
    use shadowlink_transport::{OutboundRequest, TransportError, TransportResponse};
    use std::sync::Mutex;

    const DEVICE: &str = "11111111-1111-1111-1111-111111111111";

    #[derive(Default)]
    struct Thermometer {
        seen: Mutex<Vec<OutboundRequest>>,
    }

    #[async_trait]
    impl TransportClient for Thermometer {
        async fn retrieve(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(TransportResponse {
                status: Status::CONTENT,
                payload: b"{\"temperature\":21.5}".to_vec(),
            })
        }
    }

    async fn engine(transport: Arc<Thermometer>) -> ProxyEngine {
        ProxyEngine::new(EngineConfig::default(), transport, Arc::new(NoopBroker))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_discover_then_relay() {
        let transport = Arc::new(Thermometer::default());
        let engine = engine(transport.clone()).await;

        let temp = DiscoveredResource {
            anchor: format!("ocf://{DEVICE}"),
            href: "/temp".into(),
            resource_types: vec!["oic.r.temperature".into()],
            interfaces: InterfaceMask::from_names(["oic.if.baseline", "oic.if.s"]),
            endpoints: vec![Endpoint::new("10.0.0.7:5683".parse().unwrap())],
        };
        engine.registrar.on_resource(&temp).await;

        let reply = engine
            .dispatch(Request::new(format!("/{DEVICE}/temp"), Operation::Retrieve))
            .await
            .resolve()
            .await;
        assert_eq!(reply.status, Status::CONTENT);
        assert_eq!(reply.payload, b"{\"temperature\":21.5}");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/temp");
        assert_eq!(seen[0].endpoint.addr, "10.0.0.7:5683".parse().unwrap());
    }

    #[tokio::test]
    async fn test_shadow_update_and_delete_not_relayed() {
        let transport = Arc::new(Thermometer::default());
        let engine = engine(transport.clone()).await;
        let temp = DiscoveredResource {
            anchor: format!("ocf://{DEVICE}"),
            href: "/temp".into(),
            resource_types: vec!["oic.r.temperature".into()],
            interfaces: InterfaceMask::EMPTY,
            endpoints: vec![Endpoint::new("10.0.0.7:5683".parse().unwrap())],
        };
        engine.registrar.on_resource(&temp).await;

        let path = format!("/{DEVICE}/temp");
        let update = Request::new(path.clone(), Operation::Update).with_payload(json!({ "x": 1 }));
        let reply = engine.dispatch(update).await.resolve().await;
        assert_eq!(reply.status, Status::CHANGED);
        assert!(reply.payload.is_empty());

        let reply = engine.dispatch(Request::new(path, Operation::Delete)).await.resolve().await;
        assert_eq!(reply.status, Status::DELETED);
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_list_published() {
        let engine = engine(Arc::new(Thermometer::default())).await;
        assert!(engine.tree.contains(D2D_PATH).await);

        let add = Request::new(D2D_PATH, Operation::Update).with_payload(json!({ "di": "abc" }));
        let reply = engine.dispatch(add).await.resolve().await;
        assert_eq!(reply.status, Status::CHANGED);
        assert!(engine.bridge.read().await.contains("abc"));
    }

    #[tokio::test]
    async fn test_unknown_shadow() {
        let engine = engine(Arc::new(Thermometer::default())).await;
        let reply = engine
            .dispatch(Request::new(format!("/{DEVICE}/temp"), Operation::Retrieve))
            .await
            .resolve()
            .await;
        assert_eq!(reply.status, Status::NOT_FOUND);
    }
}
