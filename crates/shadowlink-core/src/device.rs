//! Device types for tracking discovered remote hardware

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use uuid::Uuid;

use crate::interface::InterfaceMask;

/// Width of a textual device identifier (`8-4-4-4-12` hex groups)
pub const UDN_LEN: usize = 36;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UdnError {
    #[error("Device identifier must be 36 characters, got {0}")]
    BadLength(usize),
    #[error("Device identifier is not a hyphenated UUID: {0}")]
    NotUuid(String),
}

/// Unique device name: the textual UUID a remote device announces itself with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Udn(String);

impl Udn {
    /// Parse a device identifier, requiring the fixed hyphenated width
    pub fn parse(s: &str) -> Result<Self, UdnError> {
        if s.len() != UDN_LEN {
            return Err(UdnError::BadLength(s.len()));
        }
        Uuid::try_parse(s).map_err(|_| UdnError::NotUuid(s.to_string()))?;
        Ok(Self(s.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Udn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Udn {
    type Error = UdnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Udn> for String {
    fn from(udn: Udn) -> Self {
        udn.0
    }
}

/// A single reachable transport address of a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub addr: SocketAddr,
}

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "coap://{}", self.addr)
    }
}

/// The endpoints a device was reachable at when it was first discovered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredEndpoint {
    /// Device identifier
    pub udn: Udn,
    /// Reachable endpoints, in the order discovery reported them
    pub endpoints: Vec<Endpoint>,
    /// When the device was first discovered
    pub first_seen: DateTime<Utc>,
}

impl DiscoveredEndpoint {
    pub fn new(udn: Udn, endpoints: Vec<Endpoint>) -> Self {
        Self {
            udn,
            endpoints,
            first_seen: Utc::now(),
        }
    }

    /// Endpoint used for outbound requests
    pub fn primary(&self) -> Option<&Endpoint> {
        self.endpoints.first()
    }
}

/// One remote resource reported by a discovery pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    /// Anchor of the hosting device (`ocf://<udn>`)
    pub anchor: String,
    /// Path of the resource on the remote device
    pub href: String,
    /// Resource types, in the order they were reported
    pub resource_types: Vec<String>,
    /// Interfaces the remote resource supports
    pub interfaces: InterfaceMask,
    /// Endpoints of the hosting device
    pub endpoints: Vec<Endpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udn_parse() {
        let udn = Udn::parse("11111111-1111-1111-1111-111111111111").unwrap();
        assert_eq!(udn.as_str().len(), UDN_LEN);
    }

    #[test]
    fn test_udn_rejects_wrong_width() {
        assert_eq!(Udn::parse("1234"), Err(UdnError::BadLength(4)));
        // simple (non-hyphenated) form has the wrong width
        assert!(Udn::parse("11111111111111111111111111111111").is_err());
    }

    #[test]
    fn test_udn_rejects_non_hex() {
        let err = Udn::parse("zzzzzzzz-1111-1111-1111-111111111111").unwrap_err();
        assert!(matches!(err, UdnError::NotUuid(_)));
    }

    #[test]
    fn test_udn_serde() {
        let udn: Udn = serde_json::from_str("\"11111111-1111-1111-1111-111111111111\"").unwrap();
        assert_eq!(serde_json::to_string(&udn).unwrap(), "\"11111111-1111-1111-1111-111111111111\"");
        assert!(serde_json::from_str::<Udn>("\"nope\"").is_err());
    }

    #[test]
    fn test_random_udn_is_valid() {
        let udn = Udn::random();
        assert!(Udn::parse(udn.as_str()).is_ok());
    }

    #[test]
    fn test_primary_endpoint() {
        let ep = Endpoint::new("[fe80::1]:5683".parse().unwrap());
        let discovered = DiscoveredEndpoint::new(Udn::random(), vec![ep]);
        assert_eq!(discovered.primary(), Some(&ep));
        assert_eq!(ep.to_string(), "coap://[fe80::1]:5683");
    }
}
