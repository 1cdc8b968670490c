//! Shadowlink Core - Core types, name codec, and device registries
//!
//! This crate provides the foundational pieces of the Shadowlink proxy:
//! - Device identifiers, endpoints, and discovered resource descriptions
//! - Endpoint registry of discovered devices
//! - Eligibility filter for bridgeable resource types
//! - Name codec between remote resources and local shadow paths
//! - D2D server list of devices admitted for bridging

pub mod bridge;
pub mod device;
pub mod eligibility;
pub mod endpoints;
pub mod interface;
pub mod naming;
pub mod status;

pub use bridge::{BridgeEntry, BridgeError, BridgeRegistry};
pub use device::{DiscoveredEndpoint, DiscoveredResource, Endpoint, Udn, UdnError, UDN_LEN};
pub use eligibility::is_bridgeable;
pub use endpoints::EndpointRegistry;
pub use interface::{Interface, InterfaceMask};
pub use naming::NamingError;
pub use status::Status;
