//! Shadowlink Transport - outbound requests to remote devices
//!
//! This crate provides the transport client seam used by the relay engine
//! and an async UDP implementation of it.

pub mod frame;
pub mod transport;

pub use frame::{FrameHeader, Op, Priority, HEADER_LEN};
pub use transport::{
    OutboundRequest, TransportClient, TransportError, TransportResponse, UdpTransport,
    DEFAULT_TIMEOUT_MS,
};
