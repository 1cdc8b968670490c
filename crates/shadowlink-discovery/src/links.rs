//! Discovery response decoding
//!
//! A device answers a discovery request with a JSON array of links, one per
//! resource it hosts:
//!
//! ```json
//! [{"anchor": "ocf://<udn>", "href": "/temp", "rt": ["oic.r.temperature"],
//!   "if": ["oic.if.baseline", "oic.if.s"], "eps": [{"ep": "coap://10.0.0.7:5683"}]}]
//! ```

use serde::{Deserialize, Serialize};
use shadowlink_core::{DiscoveredResource, Endpoint, InterfaceMask};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Discovery I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode discovery response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub ep: String,
}

/// One entry of a discovery response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub anchor: String,
    pub href: String,
    #[serde(default)]
    pub rt: Vec<String>,
    #[serde(default, rename = "if")]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub eps: Vec<LinkEndpoint>,
}

impl Link {
    /// Convert to a discovered resource; `source` is used when no endpoint parses
    pub fn into_resource(self, source: SocketAddr) -> DiscoveredResource {
        let mut endpoints: Vec<Endpoint> = self
            .eps
            .iter()
            .filter_map(|e| parse_endpoint(&e.ep))
            .collect();
        if endpoints.is_empty() {
            endpoints.push(Endpoint::new(source));
        }
        DiscoveredResource {
            interfaces: InterfaceMask::from_names(self.interfaces.iter().map(String::as_str)),
            anchor: self.anchor,
            href: self.href,
            resource_types: self.rt,
            endpoints,
        }
    }
}

/// Parse `scheme://addr:port` into an endpoint
fn parse_endpoint(ep: &str) -> Option<Endpoint> {
    let (_, addr) = ep.split_once("://")?;
    match addr.parse::<SocketAddr>() {
        Ok(addr) => Some(Endpoint::new(addr)),
        Err(_) => {
            debug!(ep = %ep, "Ignoring unparseable endpoint");
            None
        }
    }
}

/// Decode a discovery response body received from `source`
pub fn decode_links(body: &[u8], source: SocketAddr) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
    let links: Vec<Link> = serde_json::from_slice(body)?;
    Ok(links.into_iter().map(|l| l.into_resource(source)).collect())
}
