//! Shadowlink Discovery - resource discovery on the local network
//!
//! This crate provides:
//! - Multicast discovery over the site-local and realm-local IPv6 scopes
//! - Unicast probing of configured seed addresses
//! - Decoding of discovery responses into discovered resources

pub mod links;
pub mod scanner;

pub use links::{decode_links, DiscoveryError, Link, LinkEndpoint};
pub use scanner::{
    DiscoveryEvent, DiscoveryFlow, DiscoveryHandler, DiscoveryScanner, ScannerConfig,
    DISCOVERY_PATH, REALM_LOCAL_GROUP, SITE_LOCAL_GROUP,
};
