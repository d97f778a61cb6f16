//! Next-hop link-layer resolution
//!
//! Two tiers, tried in order:
//! 1. the kernel neighbor table snapshot taken at startup
//! 2. a single broadcast ARP request, answered within `DISCOVERY_TIMEOUT`

use super::interface::InterfaceInfo;
use crate::capture::Capture;
use crate::protocol::MacAddr;
use crate::protocol::arp::{ArpOp, ArpPacket};
use crate::protocol::ethernet;
use crate::telemetry::Metrics;
use crate::{Error, Result};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const PROC_NET_ARP: &str = "/proc/net/arp";

/// Completed entry (`ATF_COM`)
const ATF_COM: u32 = 0x02;

/// How long to wait for an ARP reply
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Neighbor table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub device: String,
}

/// Read-only snapshot of the kernel ARP cache
#[derive(Debug, Default)]
pub struct NeighborTable {
    entries: Vec<NeighborEntry>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string(PROC_NET_ARP)?;
        Ok(Self::parse_proc(&content))
    }

    /// Parse the contents of /proc/net/arp, keeping completed entries only.
    pub fn parse_proc(content: &str) -> Self {
        let mut table = Self::new();

        for line in content.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                continue;
            }

            let flags = u32::from_str_radix(fields[2].trim_start_matches("0x"), 16).unwrap_or(0);
            if flags & ATF_COM == 0 {
                continue;
            }

            let (Ok(ip), Ok(mac)) = (fields[0].parse(), fields[3].parse::<MacAddr>()) else {
                continue;
            };
            if mac.is_zero() {
                continue;
            }

            table.insert(NeighborEntry {
                ip,
                mac,
                device: fields[5].to_string(),
            });
        }

        table
    }

    pub fn insert(&mut self, entry: NeighborEntry) {
        self.entries.push(entry);
    }

    /// Lookup MAC address for an IP reachable through `device`
    pub fn lookup(&self, device: &str, ip: Ipv4Addr) -> Option<MacAddr> {
        self.entries
            .iter()
            .find(|e| e.device == device && e.ip == ip)
            .map(|e| e.mac)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which tier produced the link-layer address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Found in the neighbor table snapshot; nothing was sent
    Cached(MacAddr),
    /// Learned from an ARP reply
    Discovered(MacAddr),
}

impl Resolution {
    pub fn mac(&self) -> MacAddr {
        match *self {
            Resolution::Cached(mac) | Resolution::Discovered(mac) => mac,
        }
    }
}

/// Resolves a next hop to a MAC address
pub struct NeighborResolver {
    snapshot: NeighborTable,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl NeighborResolver {
    pub fn new(snapshot: NeighborTable, metrics: Arc<Metrics>) -> Self {
        Self {
            snapshot,
            timeout: DISCOVERY_TIMEOUT,
            metrics,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `next_hop` on `interface`.
    ///
    /// The device is handed back on success. On failure it has already been
    /// dropped, which closes it.
    pub async fn resolve<D>(
        &self,
        device: D,
        interface: &InterfaceInfo,
        next_hop: Ipv4Addr,
    ) -> Result<(D, Resolution)>
    where
        D: Capture + 'static,
    {
        if let Some(mac) = self.snapshot.lookup(&interface.name, next_hop) {
            debug!(%next_hop, %mac, "next hop found in neighbor table");
            return Ok((device, Resolution::Cached(mac)));
        }

        let (device, mac) = self.discover(device, interface, next_hop).await?;
        info!(%next_hop, %mac, "next hop resolved by ARP");
        Ok((device, Resolution::Discovered(mac)))
    }

    async fn discover<D>(
        &self,
        mut device: D,
        interface: &InterfaceInfo,
        target: Ipv4Addr,
    ) -> Result<(D, MacAddr)>
    where
        D: Capture + 'static,
    {
        let sender_ip = interface
            .source_for(target)
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        let request = ArpPacket::request(interface.mac, sender_ip, target).to_frame();

        device.send(&request).await?;
        self.metrics.discovery_requests.inc();
        debug!(%target, interface = %interface.name, "sent ARP request");

        let buf_len = interface.mtu + ethernet::HEADER_SIZE;
        let mut listener = tokio::spawn(async move {
            let mut buf = vec![0u8; buf_len];
            loop {
                let rx = device.recv(&mut buf).await?;
                if let Some(mac) = match_reply(&buf[..rx.len], target) {
                    return Ok::<_, Error>((device, mac));
                }
            }
        });

        match tokio::time::timeout(self.timeout, &mut listener).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Io(io::Error::other(join_err))),
            Err(_elapsed) => {
                // Dropping the task drops the device with it
                listener.abort();
                Err(Error::DiscoveryTimeout {
                    target,
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Sender MAC of an ARP reply coming from `target`
fn match_reply(frame: &[u8], target: Ipv4Addr) -> Option<MacAddr> {
    let arp = ArpPacket::from_frame(frame)?;
    (arp.operation == ArpOp::Reply && arp.sender_ip == target).then_some(arp.sender_mac)
}
