//! Discovery scanner that multicasts discovery requests and collects answers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shadowlink_core::DiscoveredResource;
use shadowlink_transport::frame::{encode_frame, FrameHeader, Op, Priority, HEADER_LEN};
use std::collections::HashSet;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, sleep_until, Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::links::{decode_links, DiscoveryError};

/// Path requested from every device during discovery
pub const DISCOVERY_PATH: &str = "/oic/res";

/// All-nodes discovery group, site-local scope
pub const SITE_LOCAL_GROUP: Ipv6Addr = Ipv6Addr::new(0xff05, 0, 0, 0, 0, 0, 0, 0x158);

/// All-nodes discovery group, realm-local scope
pub const REALM_LOCAL_GROUP: Ipv6Addr = Ipv6Addr::new(0xff03, 0, 0, 0, 0, 0, 0, 0x158);

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Discovery port devices listen on
    pub port: u16,
    /// How long to collect responses after sending requests, in milliseconds
    pub window_ms: u64,
    /// Periodic scan interval in seconds (0 runs only the initial scan)
    pub interval_secs: u64,
    /// Send to the site-local group
    pub site_local: bool,
    /// Send to the realm-local group
    pub realm_local: bool,
    /// Unicast addresses probed in addition to multicast
    pub seeds: Vec<SocketAddr>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            port: 5683,
            window_ms: 3000,
            interval_secs: 60,
            site_local: true,
            realm_local: true,
            seeds: Vec::new(),
        }
    }
}

/// Whether a discovery pass should keep delivering resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFlow {
    Continue,
    Stop,
}

/// Receives each resource found during a discovery pass
#[async_trait]
pub trait DiscoveryHandler: Send + Sync {
    async fn on_resource(&self, resource: &DiscoveredResource) -> DiscoveryFlow;
}

/// Discovery event for real-time updates
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Scan started
    ScanStarted,
    /// A resource was reported by a device
    ResourceDiscovered(DiscoveredResource),
    /// Scan completed
    ScanCompleted { found: usize },
}

/// Discovery scanner service
pub struct DiscoveryScanner {
    config: Arc<RwLock<ScannerConfig>>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
    next_token: AtomicU32,
}

impl DiscoveryScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScannerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config: Arc::new(RwLock::new(config)),
            event_tx,
            next_token: AtomicU32::new(1),
        }
    }

    /// Get current config
    pub async fn get_config(&self) -> ScannerConfig {
        self.config.read().await.clone()
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Run a single discovery pass, handing each resource to `handler`.
    ///
    /// Returns the number of distinct resources delivered.
    pub async fn scan_once(&self, handler: &dyn DiscoveryHandler) -> Result<usize, DiscoveryError> {
        let _ = self.event_tx.send(DiscoveryEvent::ScanStarted);

        // Get a snapshot of config for this scan
        let config = self.config.read().await.clone();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let path = DISCOVERY_PATH.as_bytes();
        let header = FrameHeader::request(Op::Retrieve, Priority::Low, path.len() as u16, token);
        let packet = encode_frame(&header, path);

        // IPv6 may be unavailable; multicast is then skipped
        let v6 = match UdpSocket::bind("[::]:0").await {
            Ok(socket) => Some(socket),
            Err(e) => {
                warn!(error = %e, "IPv6 unavailable, multicast discovery disabled");
                None
            }
        };
        let v4 = UdpSocket::bind("0.0.0.0:0").await?;

        let mut sent = 0usize;
        if let Some(socket) = &v6 {
            for target in multicast_targets(&config) {
                match socket.send_to(&packet, target).await {
                    Ok(_) => sent += 1,
                    Err(e) => debug!(target = %target, error = %e, "Multicast send failed"),
                }
            }
        }
        for seed in &config.seeds {
            let socket = match seed {
                SocketAddr::V4(_) => Some(&v4),
                SocketAddr::V6(_) => v6.as_ref(),
            };
            if let Some(socket) = socket {
                match socket.send_to(&packet, seed).await {
                    Ok(_) => sent += 1,
                    Err(e) => debug!(seed = %seed, error = %e, "Seed probe failed"),
                }
            }
        }

        info!(requests = sent, window_ms = config.window_ms, "Starting discovery scan");

        let deadline = Instant::now() + Duration::from_millis(config.window_ms);
        let mut buf6 = vec![0u8; 65_535];
        let mut buf4 = vec![0u8; 65_535];
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut found = 0usize;

        'collect: loop {
            let received = tokio::select! {
                r = recv_on(v6.as_ref(), &mut buf6) => r.map(|(len, src)| (len, src, true)),
                r = v4.recv_from(&mut buf4) => r.map(|(len, src)| (len, src, false)),
                _ = sleep_until(deadline) => break,
            };

            let (len, source, over_v6) = match received {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "Discovery receive failed");
                    continue;
                }
            };
            let datagram = if over_v6 { &buf6[..len] } else { &buf4[..len] };

            let Some(resp) = FrameHeader::decode(datagram) else {
                trace!(source = %source, "Ignoring datagram without header");
                continue;
            };
            if resp.op != Op::Response || resp.token != token {
                trace!(source = %source, token = resp.token, "Ignoring unrelated datagram");
                continue;
            }
            let body_end = (HEADER_LEN + resp.body_len as usize).min(datagram.len());

            let resources = match decode_links(&datagram[HEADER_LEN..body_end], source) {
                Ok(resources) => resources,
                Err(e) => {
                    warn!(source = %source, error = %e, "Bad discovery response");
                    continue;
                }
            };

            for resource in resources {
                if !seen.insert((resource.anchor.clone(), resource.href.clone())) {
                    continue;
                }
                found += 1;
                debug!(anchor = %resource.anchor, href = %resource.href, "Resource discovered");
                let _ = self.event_tx.send(DiscoveryEvent::ResourceDiscovered(resource.clone()));
                if handler.on_resource(&resource).await == DiscoveryFlow::Stop {
                    info!("Discovery stopped by handler");
                    break 'collect;
                }
            }
        }

        let _ = self.event_tx.send(DiscoveryEvent::ScanCompleted { found });
        info!("Scan complete: {} resources found", found);
        Ok(found)
    }

    /// Run periodic discovery in background
    pub async fn run(&self, handler: Arc<dyn DiscoveryHandler>) {
        // Initial scan
        if let Err(e) = self.scan_once(handler.as_ref()).await {
            warn!(error = %e, "Initial discovery scan failed");
        }

        let interval_secs = self.config.read().await.interval_secs;
        if interval_secs == 0 {
            info!("Periodic discovery disabled");
            return;
        }

        let mut ticker = interval(Duration::from_secs(interval_secs));
        // first tick completes immediately
        ticker.tick().await;
        info!(interval_secs = interval_secs, "Discovery scheduler started");

        loop {
            ticker.tick().await;
            if let Err(e) = self.scan_once(handler.as_ref()).await {
                warn!(error = %e, "Discovery scan failed");
            }
        }
    }
}

async fn recv_on(socket: Option<&UdpSocket>, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await,
        None => std::future::pending().await,
    }
}

/// Multicast destinations: each enabled group on each IPv6-capable interface
fn multicast_targets(config: &ScannerConfig) -> Vec<SocketAddr> {
    let mut groups = Vec::new();
    if config.site_local {
        groups.push(SITE_LOCAL_GROUP);
    }
    if config.realm_local {
        groups.push(REALM_LOCAL_GROUP);
    }
    if groups.is_empty() {
        return Vec::new();
    }

    let scopes = ipv6_interface_indexes();
    let mut targets = Vec::new();
    for group in groups {
        if scopes.is_empty() {
            targets.push(SocketAddr::V6(SocketAddrV6::new(group, config.port, 0, 0)));
        }
        for &index in &scopes {
            targets.push(SocketAddr::V6(SocketAddrV6::new(group, config.port, 0, index)));
        }
    }
    targets
}

/// Indexes of non-loopback interfaces carrying an IPv6 address
fn ipv6_interface_indexes() -> Vec<u32> {
    use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};

    let mut indexes: Vec<u32> = NetworkInterface::show()
        .unwrap_or_default()
        .into_iter()
        .filter(|iface| !iface.name.starts_with("lo"))
        .filter(|iface| iface.addr.iter().any(|a| matches!(a, Addr::V6(_))))
        .map(|iface| iface.index)
        .collect();
    indexes.sort_unstable();
    indexes.dedup();
    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{Link, LinkEndpoint};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<DiscoveredResource>>,
        stop_after: Option<usize>,
    }

    #[async_trait]
    impl DiscoveryHandler for Collect {
        async fn on_resource(&self, resource: &DiscoveredResource) -> DiscoveryFlow {
            let mut seen = self.seen.lock().unwrap();
            seen.push(resource.clone());
            match self.stop_after {
                Some(n) if seen.len() >= n => DiscoveryFlow::Stop,
                _ => DiscoveryFlow::Continue,
            }
        }
    }

    fn link(href: &str) -> Link {
        Link {
            anchor: "ocf://11111111-1111-1111-1111-111111111111".to_string(),
            href: href.to_string(),
            rt: vec!["oic.r.temperature".to_string()],
            interfaces: vec!["oic.if.baseline".to_string(), "oic.if.s".to_string()],
            eps: vec![LinkEndpoint { ep: "coap://127.0.0.1:5683".to_string() }],
        }
    }

    /// Answer one discovery request, twice, like a device reached over two scopes
    async fn device(socket: UdpSocket, links: Vec<Link>) {
        let mut buf = vec![0u8; 2048];
        let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
        let req = FrameHeader::decode(&buf[..len]).unwrap();
        assert_eq!(&buf[HEADER_LEN..len], DISCOVERY_PATH.as_bytes());

        let body = serde_json::to_vec(&links).unwrap();
        let header = FrameHeader::response(shadowlink_core::Status::CONTENT, body.len() as u16, req.token);
        let frame = encode_frame(&header, &body);
        socket.send_to(&frame, peer).await.unwrap();
        socket.send_to(&frame, peer).await.unwrap();
    }

    fn seeded_config(seed: SocketAddr) -> ScannerConfig {
        ScannerConfig {
            window_ms: 300,
            site_local: false,
            realm_local: false,
            seeds: vec![seed],
            ..ScannerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_scan_seed() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let seed = socket.local_addr().unwrap();
        let server = tokio::spawn(device(socket, vec![link("/temp"), link("/humidity")]));

        let scanner = DiscoveryScanner::new(seeded_config(seed));
        let mut events = scanner.subscribe();
        let handler = Collect::default();
        let found = scanner.scan_once(&handler).await.unwrap();
        server.await.unwrap();

        // the duplicate answer is delivered once
        assert_eq!(found, 2);
        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen[0].href, "/temp");
        assert_eq!(seen[1].href, "/humidity");

        assert!(matches!(events.recv().await.unwrap(), DiscoveryEvent::ScanStarted));
    }

    #[tokio::test]
    async fn test_handler_can_stop_scan() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let seed = socket.local_addr().unwrap();
        let server = tokio::spawn(device(socket, vec![link("/a"), link("/b"), link("/c")]));

        let scanner = DiscoveryScanner::new(seeded_config(seed));
        let handler = Collect {
            stop_after: Some(1),
            ..Collect::default()
        };
        let found = scanner.scan_once(&handler).await.unwrap();
        server.await.unwrap();

        assert_eq!(found, 1);
        assert_eq!(handler.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_scans_once_without_interval() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let seed = socket.local_addr().unwrap();
        let server = tokio::spawn(device(socket, vec![link("/temp")]));

        let scanner = DiscoveryScanner::new(ScannerConfig {
            interval_secs: 0,
            ..seeded_config(seed)
        });
        let handler = Arc::new(Collect::default());
        // returns once the startup scan is done
        tokio::time::timeout(Duration::from_secs(5), scanner.run(handler.clone()))
            .await
            .unwrap();
        server.await.unwrap();

        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].href, "/temp");
    }

    #[test]
    fn test_multicast_targets_disabled() {
        let config = ScannerConfig {
            site_local: false,
            realm_local: false,
            ..ScannerConfig::default()
        };
        assert!(multicast_targets(&config).is_empty());
    }

    #[test]
    fn test_multicast_targets_use_groups() {
        let config = ScannerConfig::default();
        let targets = multicast_targets(&config);
        assert!(!targets.is_empty());
        assert!(targets.iter().all(|t| match t {
            SocketAddr::V6(v6) => *v6.ip() == SITE_LOCAL_GROUP || *v6.ip() == REALM_LOCAL_GROUP,
            SocketAddr::V4(_) => false,
        }));
    }
}
