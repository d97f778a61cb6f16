//! A resolved, ready-to-send path to the destination

use super::frame::{self, Flow};
use super::interface;
use super::neighbor::{NeighborResolver, NeighborTable};
use super::routing::{self, ResolvedRoute, RoutingTable};
use crate::capture::{AfPacketSocket, Capture};
use crate::config::ReplayConfig;
use crate::telemetry::Metrics;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Egress device plus the fixed addressing for every datagram sent on it.
///
/// Dropping the connection closes the device.
pub struct Connection<D> {
    flow: Flow,
    device: D,
}

impl<D: Capture> Connection<D> {
    pub fn new(flow: Flow, device: D) -> Self {
        Self { flow, device }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    /// Wrap `payload` in a frame and write it to the device.
    pub async fn send(&mut self, payload: &[u8]) -> Result<usize> {
        let frame = frame::build_frame(&self.flow, payload)?;
        self.device.send(&frame).await
    }
}

/// Pick the source address and resolve the next hop for an already
/// routed destination.
pub async fn establish<D>(
    config: &ReplayConfig,
    route: &ResolvedRoute,
    neighbors: &NeighborResolver,
    device: D,
) -> Result<Connection<D>>
where
    D: Capture + 'static,
{
    let src_ip = config
        .src
        .or(route.preferred_src)
        .ok_or_else(|| Error::NoSourceAddress {
            name: route.interface.name.clone(),
        })?;

    let (device, resolution) = neighbors
        .resolve(device, &route.interface, route.next_hop)
        .await?;
    debug!(?resolution, next_hop = %route.next_hop, "link layer resolved");

    let flow = Flow {
        src_mac: route.interface.mac,
        dst_mac: resolution.mac(),
        src_ip,
        dst_ip: config.dst,
        src_port: config.src_port,
        dst_port: config.dst_port,
    };
    Ok(Connection::new(flow, device))
}

impl Connection<AfPacketSocket> {
    /// Resolve the path to `config.dst` from the host's tables and open
    /// the egress interface.
    pub async fn open(config: &ReplayConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let table = RoutingTable::load()?;
        let interfaces = interface::list()?;
        let route = routing::resolve(&table, &interfaces, config.dst)?;
        let neighbors = NeighborResolver::new(NeighborTable::load()?, metrics);

        let device = AfPacketSocket::bind(&route.interface.name)?;
        let conn = establish(config, &route, &neighbors, device).await?;
        info!(interface = %route.interface.name, flow = %conn.flow, "connection ready");
        Ok(conn)
    }
}
