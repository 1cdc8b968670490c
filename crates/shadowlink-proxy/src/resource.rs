//! Local resource tree
//!
//! Resources are published once and live until shutdown. Each resource binds
//! resource types, a set of interfaces with one default, and a handler per
//! operation. Handlers either answer immediately or hand back a
//! [`DeferredResponse`] that resolves once an outbound request completes.

use async_trait::async_trait;
use serde::Serialize;
use shadowlink_core::{Interface, InterfaceMask, Status};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Resource already published at {0}")]
    AlreadyPublished(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Retrieve,
    Update,
    Delete,
}

/// An inbound request on the resource tree
#[derive(Debug, Clone)]
pub struct Request {
    pub path: String,
    pub operation: Operation,
    pub query: HashMap<String, String>,
    pub payload: Option<serde_json::Value>,
    /// Interface the request is served through, resolved at dispatch
    pub interface: Interface,
}

impl Request {
    pub fn new(path: impl Into<String>, operation: Operation) -> Self {
        Self {
            path: path.into(),
            operation,
            query: HashMap::new(),
            payload: None,
            interface: Interface::Baseline,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

/// A completed response: status plus raw representation bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn new(status: Status, payload: Vec<u8>) -> Self {
        Self { status, payload }
    }

    pub fn empty(status: Status) -> Self {
        Self::new(status, Vec::new())
    }

    pub fn json(status: Status, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string().into_bytes())
    }
}

/// Handle to a response that completes after an outbound request
#[derive(Debug)]
pub struct DeferredResponse {
    id: u64,
    rx: oneshot::Receiver<Reply>,
}

impl DeferredResponse {
    pub fn new(id: u64, rx: oneshot::Receiver<Reply>) -> Self {
        Self { id, rx }
    }

    /// Correlation id of the pending relay behind this response
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the relay to complete
    pub async fn wait(self) -> Reply {
        match self.rx.await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(id = self.id, "Relay dropped without completing");
                Reply::empty(Status::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[derive(Debug)]
pub enum Response {
    Immediate(Reply),
    Deferred(DeferredResponse),
}

impl Response {
    pub fn status(status: Status) -> Self {
        Response::Immediate(Reply::empty(status))
    }

    /// Resolve to a completed reply, waiting on a deferred response
    pub async fn resolve(self) -> Reply {
        match self {
            Response::Immediate(reply) => reply,
            Response::Deferred(deferred) => deferred.wait().await,
        }
    }
}

/// Serves one operation on a resource
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, resource: &Resource, request: &Request) -> Response;
}

pub struct Resource {
    path: String,
    types: Vec<String>,
    interfaces: InterfaceMask,
    default_interface: Interface,
    handlers: HashMap<Operation, Arc<dyn RequestHandler>>,
}

impl Resource {
    /// New resource; every resource binds the baseline interface
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            types: Vec::new(),
            interfaces: InterfaceMask::EMPTY.with(Interface::Baseline),
            default_interface: Interface::Baseline,
            handlers: HashMap::new(),
        }
    }

    pub fn bind_type(&mut self, resource_type: &str) {
        if !self.types.iter().any(|t| t == resource_type) {
            self.types.push(resource_type.to_string());
        }
    }

    pub fn bind_interface(&mut self, iface: Interface) {
        self.interfaces = self.interfaces.with(iface);
    }

    /// Set the default interface, binding it if needed
    pub fn set_default_interface(&mut self, iface: Interface) {
        self.bind_interface(iface);
        self.default_interface = iface;
    }

    pub fn set_handler(&mut self, operation: Operation, handler: Arc<dyn RequestHandler>) {
        self.handlers.insert(operation, handler);
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn interfaces(&self) -> InterfaceMask {
        self.interfaces
    }

    pub fn default_interface(&self) -> Interface {
        self.default_interface
    }

    /// Wire names of the bound interfaces
    pub fn interface_names(&self) -> Vec<&'static str> {
        self.interfaces.iter().map(Interface::name).collect()
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            href: self.path.clone(),
            rt: self.types.clone(),
            interfaces: self.interface_names().into_iter().map(String::from).collect(),
            default_interface: self.default_interface.name().to_string(),
        }
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("types", &self.types)
            .field("interfaces", &self.interfaces)
            .field("default_interface", &self.default_interface)
            .finish_non_exhaustive()
    }
}

/// Listing entry for a published resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub href: String,
    pub rt: Vec<String>,
    #[serde(rename = "if")]
    pub interfaces: Vec<String>,
    pub default_interface: String,
}

/// Published resources, keyed by path
#[derive(Default)]
pub struct ResourceTree {
    resources: RwLock<BTreeMap<String, Arc<Resource>>>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, resource: Resource) -> Result<Arc<Resource>, ResourceError> {
        let mut resources = self.resources.write().await;
        if resources.contains_key(&resource.path) {
            return Err(ResourceError::AlreadyPublished(resource.path));
        }
        info!(path = %resource.path, types = ?resource.types, "Published resource");
        let resource = Arc::new(resource);
        resources.insert(resource.path.clone(), resource.clone());
        Ok(resource)
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.resources.read().await.contains_key(path)
    }

    pub async fn get(&self, path: &str) -> Option<Arc<Resource>> {
        self.resources.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }

    pub async fn descriptors(&self) -> Vec<ResourceDescriptor> {
        self.resources
            .read()
            .await
            .values()
            .map(|r| r.descriptor())
            .collect()
    }

    /// Route a request to the handler of its resource
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let Some(resource) = self.get(&request.path).await else {
            debug!(path = %request.path, "No resource at path");
            return Response::status(Status::NOT_FOUND);
        };

        request.interface = match request.query("if") {
            None => resource.default_interface,
            Some(name) => match Interface::from_name(name) {
                Some(iface) if resource.interfaces.contains(iface) => iface,
                _ => {
                    debug!(path = %request.path, interface = %name, "Interface not bound");
                    return Response::status(Status::BAD_REQUEST);
                }
            },
        };

        let Some(handler) = resource.handlers.get(&request.operation) else {
            debug!(path = %request.path, operation = ?request.operation, "No handler for operation");
            return Response::status(Status::METHOD_NOT_ALLOWED);
        };

        handler.handle(&resource, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, resource: &Resource, request: &Request) -> Response {
            let body = json!({ "path": resource.path(), "if": request.interface.name() });
            Response::Immediate(Reply::json(Status::CONTENT, &body))
        }
    }

    fn echo_resource(path: &str) -> Resource {
        let mut resource = Resource::new(path);
        resource.bind_type("x.test");
        resource.set_default_interface(Interface::ReadOnly);
        resource.set_handler(Operation::Retrieve, Arc::new(Echo));
        resource
    }

    #[test]
    fn test_new_resource_binds_baseline() {
        let resource = Resource::new("/a");
        assert!(resource.interfaces().contains(Interface::Baseline));
        assert_eq!(resource.default_interface(), Interface::Baseline);
    }

    #[test]
    fn test_descriptor() {
        let resource = echo_resource("/a");
        let descriptor = resource.descriptor();
        assert_eq!(descriptor.href, "/a");
        assert_eq!(descriptor.rt, vec!["x.test"]);
        assert_eq!(descriptor.interfaces, vec!["oic.if.baseline", "oic.if.r"]);
        assert_eq!(descriptor.default_interface, "oic.if.r");
    }

    #[tokio::test]
    async fn test_publish_twice() {
        let tree = ResourceTree::new();
        tree.publish(echo_resource("/a")).await.unwrap();
        let err = tree.publish(echo_resource("/a")).await.unwrap_err();
        assert_eq!(err, ResourceError::AlreadyPublished("/a".into()));
        assert_eq!(tree.len().await, 1);
    }

    #[tokio::test]
    async fn test_dispatch() {
        let tree = ResourceTree::new();
        tree.publish(echo_resource("/a")).await.unwrap();

        let reply = tree.dispatch(Request::new("/a", Operation::Retrieve)).await.resolve().await;
        assert_eq!(reply.status, Status::CONTENT);
        let body: serde_json::Value = serde_json::from_slice(&reply.payload).unwrap();
        assert_eq!(body["if"], "oic.if.r");

        let request = Request::new("/a", Operation::Retrieve).with_query("if", "oic.if.baseline");
        let reply = tree.dispatch(request).await.resolve().await;
        let body: serde_json::Value = serde_json::from_slice(&reply.payload).unwrap();
        assert_eq!(body["if"], "oic.if.baseline");
    }

    #[tokio::test]
    async fn test_dispatch_errors() {
        let tree = ResourceTree::new();
        tree.publish(echo_resource("/a")).await.unwrap();

        let reply = tree.dispatch(Request::new("/missing", Operation::Retrieve)).await.resolve().await;
        assert_eq!(reply.status, Status::NOT_FOUND);

        let reply = tree.dispatch(Request::new("/a", Operation::Delete)).await.resolve().await;
        assert_eq!(reply.status, Status::METHOD_NOT_ALLOWED);

        let request = Request::new("/a", Operation::Retrieve).with_query("if", "oic.if.rw");
        let reply = tree.dispatch(request).await.resolve().await;
        assert_eq!(reply.status, Status::BAD_REQUEST);

        let request = Request::new("/a", Operation::Retrieve).with_query("if", "bogus");
        let reply = tree.dispatch(request).await.resolve().await;
        assert_eq!(reply.status, Status::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deferred_dropped() {
        let (tx, rx) = oneshot::channel();
        drop(tx);
        let reply = DeferredResponse::new(7, rx).wait().await;
        assert_eq!(reply.status, Status::INTERNAL_SERVER_ERROR);
    }
}
