//! Relay of inbound retrieves to the remote devices behind shadow resources
//!
//! An inbound retrieve is answered with a [`DeferredResponse`]. The relay
//! records a pending entry keyed by a correlation id, issues the outbound
//! retrieve on a spawned task, and completes the entry when the transport
//! answers. No state outlives the completion.

use async_trait::async_trait;
use shadowlink_core::{naming, EndpointRegistry, Status, Udn};
use shadowlink_transport::{OutboundRequest, Priority, TransportClient, TransportError, TransportResponse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::resource::{DeferredResponse, Reply, Request, RequestHandler, Resource, Response};

/// Default largest payload handed back to an inbound caller
pub const DEFAULT_MAX_PAYLOAD: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Not a shadow resource path: {0}")]
    MalformedShadowPath(String),
    #[error("No endpoint known for device {0}")]
    TargetUnreachable(Udn),
    #[error("Payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

impl RelayError {
    pub fn status(&self) -> Status {
        match self {
            RelayError::MalformedShadowPath(_) => Status::BAD_REQUEST,
            RelayError::TargetUnreachable(_) => Status::SERVICE_UNAVAILABLE,
            RelayError::PayloadTooLarge { .. } => Status::REQUEST_ENTITY_TOO_LARGE,
        }
    }
}

struct PendingRelay {
    target: OutboundRequest,
    resume: oneshot::Sender<Reply>,
    max_payload: usize,
    started: Instant,
}

#[derive(Default)]
struct PendingTable {
    next_id: u64,
    relays: HashMap<u64, PendingRelay>,
}

impl PendingTable {
    fn insert(&mut self, relay: PendingRelay) -> u64 {
        self.next_id += 1;
        self.relays.insert(self.next_id, relay);
        self.next_id
    }
}

pub struct RelayEngine {
    endpoints: Arc<RwLock<EndpointRegistry>>,
    transport: Arc<dyn TransportClient>,
    pending: Arc<Mutex<PendingTable>>,
    max_payload: usize,
}

impl RelayEngine {
    pub fn new(
        endpoints: Arc<RwLock<EndpointRegistry>>,
        transport: Arc<dyn TransportClient>,
        max_payload: usize,
    ) -> Self {
        Self {
            endpoints,
            transport,
            pending: Arc::new(Mutex::new(PendingTable::default())),
            max_payload,
        }
    }

    /// Number of relays waiting on the transport
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).relays.len()
    }

    /// Start relaying a retrieve on `shadow_path` to its remote device
    pub async fn retrieve(&self, shadow_path: &str) -> Result<DeferredResponse, RelayError> {
        let (udn, remote_path) = naming::decode(shadow_path)
            .map_err(|_| RelayError::MalformedShadowPath(shadow_path.to_string()))?;

        let endpoint = {
            let endpoints = self.endpoints.read().await;
            endpoints.lookup(&udn).and_then(|d| d.primary().copied())
        }
        .ok_or_else(|| RelayError::TargetUnreachable(udn.clone()))?;

        let target = OutboundRequest {
            endpoint,
            path: remote_path.to_string(),
            priority: Priority::Low,
        };

        let (resume, rx) = oneshot::channel();
        let id = lock(&self.pending).insert(PendingRelay {
            target: target.clone(),
            resume,
            max_payload: self.max_payload,
            started: Instant::now(),
        });

        debug!(id = id, target = %target.endpoint, path = %target.path, "Relaying retrieve");

        let transport = self.transport.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            let result = transport.retrieve(target).await;
            complete(&pending, id, result);
        });

        Ok(DeferredResponse::new(id, rx))
    }
}

fn lock(pending: &Mutex<PendingTable>) -> std::sync::MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resume the caller of relay `id` with the outcome of its outbound request
fn complete(pending: &Mutex<PendingTable>, id: u64, result: Result<TransportResponse, TransportError>) {
    let Some(relay) = lock(pending).relays.remove(&id) else {
        warn!(id = id, "Completion for unknown relay");
        return;
    };

    let elapsed_ms = relay.started.elapsed().as_millis() as u64;
    let reply = match result {
        Ok(response) => {
            log_payload(id, &response);
            if response.payload.len() > relay.max_payload {
                let err = RelayError::PayloadTooLarge {
                    len: response.payload.len(),
                    max: relay.max_payload,
                };
                warn!(id = id, path = %relay.target.path, error = %err, "Relay rejected");
                Reply::empty(err.status())
            } else {
                info!(
                    id = id,
                    path = %relay.target.path,
                    status = %response.status,
                    elapsed_ms = elapsed_ms,
                    "Relay completed"
                );
                Reply::new(response.status, response.payload)
            }
        }
        Err(e) => {
            warn!(id = id, target = %relay.target.endpoint, error = %e, "Relay failed");
            Reply::empty(e.status())
        }
    };

    if relay.resume.send(reply).is_err() {
        debug!(id = id, "Caller went away before relay completed");
    }
}

fn log_payload(id: u64, response: &TransportResponse) {
    match serde_json::from_slice::<serde_json::Value>(&response.payload) {
        Ok(value) => debug!(id = id, status = %response.status, payload = %value, "Relay response"),
        Err(_) => {
            let head = &response.payload[..response.payload.len().min(32)];
            debug!(
                id = id,
                status = %response.status,
                len = response.payload.len(),
                head = %hex::encode(head),
                "Relay response (not JSON)"
            );
        }
    }
}

/// Retrieve handler of a shadow resource
pub struct RelayRetrieve {
    relay: Arc<RelayEngine>,
}

impl RelayRetrieve {
    pub fn new(relay: Arc<RelayEngine>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl RequestHandler for RelayRetrieve {
    async fn handle(&self, resource: &Resource, _request: &Request) -> Response {
        match self.relay.retrieve(resource.path()).await {
            Ok(deferred) => {
                debug!(path = %resource.path(), id = deferred.id(), "Retrieve deferred until relay completes");
                Response::Deferred(deferred)
            }
            Err(e) => {
                warn!(path = %resource.path(), error = %e, "Cannot relay retrieve");
                Response::status(e.status())
            }
        }
    }
}

/// Handler that acknowledges an operation without relaying it
pub struct Acknowledge {
    status: Status,
}

impl Acknowledge {
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

#[async_trait]
impl RequestHandler for Acknowledge {
    async fn handle(&self, resource: &Resource, request: &Request) -> Response {
        debug!(path = %resource.path(), operation = ?request.operation, "Acknowledged without relaying");
        Response::status(self.status)
    }
}
