//! Ethernet II framing

use super::{EtherType, MacAddr};
use crate::{Error, Result};

/// Ethernet header size (dst + src + ethertype, no VLAN tag, no FCS)
pub const HEADER_SIZE: usize = 14;

/// Parsed Ethernet frame (zero-copy reference)
#[derive(Debug)]
pub struct Frame<'a> {
    buffer: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::Parse("frame too short".into()));
        }
        Ok(Self { buffer })
    }

    pub fn dst_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.buffer[0..6]).unwrap_or_default()
    }

    pub fn src_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.buffer[6..12]).unwrap_or_default()
    }

    pub fn ethertype(&self) -> u16 {
        u16::from_be_bytes([self.buffer[12], self.buffer[13]])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buffer[HEADER_SIZE..]
    }
}

/// Builder for constructing Ethernet frames
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    dst_mac: MacAddr,
    src_mac: MacAddr,
    ethertype: u16,
}

impl FrameBuilder {
    pub fn new(ethertype: EtherType) -> Self {
        Self {
            dst_mac: MacAddr::BROADCAST,
            src_mac: MacAddr::ZERO,
            ethertype: ethertype as u16,
        }
    }

    pub fn dst_mac(mut self, mac: MacAddr) -> Self {
        self.dst_mac = mac;
        self
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.src_mac = mac;
        self
    }

    /// Prepend the header to `payload` and return the finished frame.
    pub fn build(self, payload: &[u8]) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len());
        buffer.extend_from_slice(&self.dst_mac.0);
        buffer.extend_from_slice(&self.src_mac.0);
        buffer.extend_from_slice(&self.ethertype.to_be_bytes());
        buffer.extend_from_slice(payload);
        buffer
    }
}
