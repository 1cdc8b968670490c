//! Async UDP transport for outbound requests

use async_trait::async_trait;
use shadowlink_core::{Endpoint, Status};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::frame::{encode_frame, FrameHeader, Op, Priority, HEADER_LEN};

/// Default time to wait for a response
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Largest datagram accepted from a device
const MAX_DATAGRAM: usize = 65_535;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No response from {0} within {1:?}")]
    Timeout(SocketAddr, Duration),
    #[error("Token mismatch: expected {expected}, got {got}")]
    TokenMismatch { expected: u32, got: u32 },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Status reported to the caller whose request failed in transit
    pub fn status(&self) -> Status {
        match self {
            TransportError::Timeout(..) => Status::GATEWAY_TIMEOUT,
            _ => Status::SERVICE_UNAVAILABLE,
        }
    }
}

/// One outbound retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub endpoint: Endpoint,
    pub path: String,
    pub priority: Priority,
}

/// A device's answer: its status code and the raw representation bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: Status,
    pub payload: Vec<u8>,
}

/// Client side of the device transport
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Retrieve `request.path` from the device at `request.endpoint`
    async fn retrieve(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// UDP transport: one ephemeral socket per request
pub struct UdpTransport {
    timeout: Duration,
    next_token: AtomicU32,
}

impl UdpTransport {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            next_token: AtomicU32::new(1),
        }
    }

    fn next_token(&self) -> u32 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    async fn bind_for(target: &SocketAddr) -> std::io::Result<UdpSocket> {
        match target {
            SocketAddr::V4(_) => UdpSocket::bind("0.0.0.0:0").await,
            SocketAddr::V6(_) => UdpSocket::bind("[::]:0").await,
        }
    }

    /// Send a request and receive the matching response
    async fn transceive(
        &self,
        target: SocketAddr,
        op: Op,
        priority: Priority,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        let body_len = u16::try_from(body.len())
            .map_err(|_| TransportError::Malformed(format!("request body of {} bytes", body.len())))?;
        let token = self.next_token();
        let header = FrameHeader::request(op, priority, body_len, token);
        let packet = encode_frame(&header, body);

        trace!(target = %target, op = ?op, token = token, body_len = body.len(), "Sending request");

        let socket = Self::bind_for(&target).await?;
        socket.send_to(&packet, target).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, _addr) = timeout(self.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| TransportError::Timeout(target, self.timeout))??;

        let resp = FrameHeader::decode(&buf[..len])
            .ok_or_else(|| TransportError::Malformed(format!("{len} byte datagram without header")))?;

        debug!(
            target = %target,
            status = %resp.status(),
            token = resp.token,
            body_len = resp.body_len,
            "Received response"
        );

        if resp.op != Op::Response {
            return Err(TransportError::Malformed(format!("expected response, got {:?}", resp.op)));
        }
        if resp.token != token {
            return Err(TransportError::TokenMismatch { expected: token, got: resp.token });
        }

        let body_end = HEADER_LEN + resp.body_len as usize;
        if body_end > len {
            return Err(TransportError::Malformed(format!(
                "body truncated: expected {} bytes, got {}",
                resp.body_len,
                len - HEADER_LEN
            )));
        }

        Ok(TransportResponse {
            status: resp.status(),
            payload: buf[HEADER_LEN..body_end].to_vec(),
        })
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

#[async_trait]
impl TransportClient for UdpTransport {
    async fn retrieve(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.transceive(request.endpoint.addr, Op::Retrieve, request.priority, request.path.as_bytes())
            .await
    }
}
