//! Frame construction for outgoing datagrams

use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::ipv4::{self, Ipv4Builder, Protocol};
use crate::protocol::udp::{self, UdpBuilder};
use crate::protocol::{EtherType, MacAddr};
use crate::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;

/// Largest UDP payload whose IPv4 total length still fits in 16 bits
pub const MAX_PAYLOAD: usize = ipv4::MAX_PACKET_SIZE - ipv4::MIN_HEADER_SIZE - udp::HEADER_SIZE;

/// Everything needed to address a datagram on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} => {}:{}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port
        )
    }
}

/// Build an Ethernet/IPv4/UDP frame carrying `payload`.
///
/// Lengths and checksums are always derived here. The same inputs always
/// produce the same bytes.
pub fn build_frame(flow: &Flow, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let datagram = UdpBuilder::new()
        .src_port(flow.src_port)
        .dst_port(flow.dst_port)
        .build(flow.src_ip, flow.dst_ip, payload);

    let packet = Ipv4Builder::new(Protocol::Udp)
        .tos(0)
        .identification(0)
        .dont_fragment(true)
        .ttl(ipv4::DEFAULT_TTL)
        .src_addr(flow.src_ip)
        .dst_addr(flow.dst_ip)
        .build(&datagram);

    Ok(FrameBuilder::new(EtherType::Ipv4)
        .dst_mac(flow.dst_mac)
        .src_mac(flow.src_mac)
        .build(&packet))
}
