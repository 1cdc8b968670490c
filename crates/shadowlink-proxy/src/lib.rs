//! Shadowlink Proxy - Shadow resources and request relay
//!
//! This crate turns discovered remote resources into local shadow resources
//! and relays inbound retrieves on them to the remote device:
//! - Resource tree with per-operation handlers and deferred responses
//! - Shadow registrar driven by discovery
//! - Relay engine with correlated pending requests
//! - `/d2dserverlist` resource over the bridge registry
//! - Upstream broker announcements

pub mod broker;
pub mod d2d;
pub mod engine;
pub mod registrar;
pub mod relay;
pub mod resource;

pub use broker::{Broker, BrokerError, HttpBroker, NoopBroker};
pub use d2d::{D2D_PATH, D2D_RESOURCE_TYPE};
pub use engine::{EngineConfig, ProxyEngine};
pub use registrar::{Registration, RegistrarError, ShadowRegistrar};
pub use relay::{RelayEngine, RelayError, DEFAULT_MAX_PAYLOAD};
pub use resource::{
    DeferredResponse, Operation, Reply, Request, RequestHandler, Resource, ResourceDescriptor, ResourceError,
    ResourceTree, Response,
};
