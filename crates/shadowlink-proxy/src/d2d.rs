//! `/d2dserverlist`: the resource through which devices are admitted for bridging

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use shadowlink_core::{BridgeError, BridgeRegistry, EndpointRegistry, Interface, Status, Udn};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::resource::{Operation, Reply, Request, RequestHandler, Resource, Response};

pub const D2D_PATH: &str = "/d2dserverlist";
pub const D2D_RESOURCE_TYPE: &str = "oic.r.d2dserverlist";

/// Common properties a client may never write
const READ_ONLY_PROPERTIES: [&str; 4] = ["n", "if", "rt", "id"];

/// Build the server list resource over `registry`.
///
/// Admitted devices take their `eps` from `endpoints` when discovery has
/// already recorded them.
pub fn d2d_resource(registry: Arc<RwLock<BridgeRegistry>>, endpoints: Arc<RwLock<EndpointRegistry>>) -> Resource {
    let mut resource = Resource::new(D2D_PATH);
    resource.bind_type(D2D_RESOURCE_TYPE);
    resource.set_default_interface(Interface::ReadWrite);
    resource.set_handler(Operation::Retrieve, Arc::new(ListServers { registry: registry.clone() }));
    resource.set_handler(
        Operation::Update,
        Arc::new(AddServer {
            registry: registry.clone(),
            endpoints,
        }),
    );
    resource.set_handler(Operation::Delete, Arc::new(RemoveServer { registry }));
    resource
}

struct ListServers {
    registry: Arc<RwLock<BridgeRegistry>>,
}

#[async_trait]
impl RequestHandler for ListServers {
    async fn handle(&self, resource: &Resource, request: &Request) -> Response {
        let registry = self.registry.read().await;
        let servers: Vec<Value> = registry
            .slots()
            .iter()
            .map(|s| json!({ "di": s.di, "href": s.href }))
            .collect();

        let mut body = Map::new();
        if request.interface == Interface::Baseline {
            body.insert("rt".into(), json!(resource.types()));
            body.insert("if".into(), json!(resource.interface_names()));
        }
        body.insert("d2dserverlist".into(), Value::Array(servers));
        Response::Immediate(Reply::json(Status::CONTENT, &Value::Object(body)))
    }
}

struct AddServer {
    registry: Arc<RwLock<BridgeRegistry>>,
    endpoints: Arc<RwLock<EndpointRegistry>>,
}

impl AddServer {
    async fn describe(&self, di: &str) -> String {
        let Ok(udn) = Udn::parse(di) else {
            return String::new();
        };
        let endpoints = self.endpoints.read().await;
        endpoints
            .lookup(&udn)
            .map(|d| d.endpoints.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    }
}

/// Extract `(di, href)` from an update payload
fn parse_entry(payload: Option<&Value>) -> Result<(String, String), BridgeError> {
    let Some(object) = payload.and_then(Value::as_object) else {
        return Err(BridgeError::InvalidField {
            field: "payload",
            reason: "expected an object".into(),
        });
    };

    if let Some(key) = READ_ONLY_PROPERTIES.iter().find(|k| object.contains_key(**k)) {
        return Err(BridgeError::ReadOnlyProperty(key.to_string()));
    }

    let di = match object.get("di") {
        None => return Err(BridgeError::MissingId),
        Some(Value::String(di)) => di.clone(),
        Some(_) => {
            return Err(BridgeError::InvalidField {
                field: "di",
                reason: "expected a string".into(),
            })
        }
    };
    let href = match object.get("href") {
        None => String::new(),
        Some(Value::String(href)) => href.clone(),
        Some(_) => {
            return Err(BridgeError::InvalidField {
                field: "href",
                reason: "expected a string".into(),
            })
        }
    };
    Ok((di, href))
}

#[async_trait]
impl RequestHandler for AddServer {
    async fn handle(&self, _resource: &Resource, request: &Request) -> Response {
        let result = match parse_entry(request.payload.as_ref()) {
            Ok((di, href)) => {
                let eps = self.describe(&di).await;
                self.registry.write().await.add(&di, &eps, &href).map(|_| di)
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(di) => Response::Immediate(Reply::json(Status::CHANGED, &json!({ "di": di }))),
            Err(e) => {
                warn!(error = %e, "Rejected server list update");
                Response::status(Status::BAD_REQUEST)
            }
        }
    }
}

struct RemoveServer {
    registry: Arc<RwLock<BridgeRegistry>>,
}

#[async_trait]
impl RequestHandler for RemoveServer {
    async fn handle(&self, _resource: &Resource, request: &Request) -> Response {
        let Some(di) = request.query("di") else {
            warn!("Server list delete without 'di' query");
            return Response::status(Status::BAD_OPTION);
        };
        match self.registry.write().await.remove(di) {
            Ok(()) => {
                info!(di = %di, "Removed device from server list");
                Response::status(Status::DELETED)
            }
            Err(e) => {
                warn!(error = %e, "Rejected server list delete");
                Response::status(Status::BAD_OPTION)
            }
        }
    }
}
