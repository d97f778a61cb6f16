//! UDP protocol - RFC 768

use super::ipv4::{self, Protocol};
use crate::{Error, Result};
use std::net::Ipv4Addr;

/// UDP header size (fixed)
pub const HEADER_SIZE: usize = 8;

/// Parsed UDP header (zero-copy reference)
#[derive(Debug)]
pub struct UdpHeader<'a> {
    buffer: &'a [u8],
}

impl<'a> UdpHeader<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::Parse("UDP header too short".into()));
        }
        Ok(Self { buffer })
    }

    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes([self.buffer[0], self.buffer[1]])
    }

    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    /// Length (header + data)
    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.buffer[4], self.buffer[5]])
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.buffer[6], self.buffer[7]])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buffer[HEADER_SIZE..]
    }

    /// Validate the checksum against the IPv4 pseudo-header.
    /// A zero checksum means "not computed" and is accepted.
    pub fn validate_checksum(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> bool {
        self.checksum() == 0 || udp_checksum(src_ip, dst_ip, self.buffer) == 0
    }
}

/// Builder for UDP datagrams
#[derive(Debug, Clone, Default)]
pub struct UdpBuilder {
    src_port: u16,
    dst_port: u16,
}

impl UdpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    /// Build the datagram and fill in the checksum for the given addresses.
    pub fn build(self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
        let length = (HEADER_SIZE + payload.len()) as u16;
        let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len());

        buffer.extend_from_slice(&self.src_port.to_be_bytes());
        buffer.extend_from_slice(&self.dst_port.to_be_bytes());
        buffer.extend_from_slice(&length.to_be_bytes());
        buffer.extend_from_slice(&[0, 0]);
        buffer.extend_from_slice(payload);

        // 0 is reserved for "no checksum"
        let sum = match udp_checksum(src_ip, dst_ip, &buffer) {
            0 => 0xFFFF,
            sum => sum,
        };
        buffer[6..8].copy_from_slice(&sum.to_be_bytes());

        buffer
    }
}

/// Calculate UDP checksum with pseudo-header (RFC 768)
///
/// Pseudo-header:
/// ```text
/// +--------+--------+--------+--------+
/// |          Source Address           |
/// +--------+--------+--------+--------+
/// |        Destination Address        |
/// +--------+--------+--------+--------+
/// |  Zero  |Protocol|   UDP Length    |
/// +--------+--------+--------+--------+
/// ```
pub fn udp_checksum(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, udp_datagram: &[u8]) -> u16 {
    let mut sum = ipv4::sum_words(0, &src_ip.octets());
    sum = ipv4::sum_words(sum, &dst_ip.octets());
    sum += Protocol::Udp as u32;
    sum += udp_datagram.len() as u32;
    ipv4::fold(ipv4::sum_words(sum, udp_datagram))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: Ipv4Addr = Ipv4Addr::new(10, 20, 30, 40);
    const DST: Ipv4Addr = Ipv4Addr::new(192, 168, 10, 5);

    #[test]
    fn test_build_header_fields() {
        let dgram = UdpBuilder::new()
            .src_port(40000)
            .dst_port(514)
            .build(SRC, DST, b"<34>Oct 11 22:14:15 mymachine su: fail\n");
        let hdr = UdpHeader::parse(&dgram).unwrap();

        assert_eq!(hdr.src_port(), 40000);
        assert_eq!(hdr.dst_port(), 514);
        assert_eq!(hdr.length() as usize, dgram.len());
        assert_eq!(hdr.payload(), b"<34>Oct 11 22:14:15 mymachine su: fail\n");
        assert_ne!(hdr.checksum(), 0);
        assert!(hdr.validate_checksum(SRC, DST));
    }

    #[test]
    fn test_checksum_binds_addresses() {
        let dgram = UdpBuilder::new().src_port(514).dst_port(514).build(SRC, DST, b"x");
        let hdr = UdpHeader::parse(&dgram).unwrap();
        assert!(!hdr.validate_checksum(Ipv4Addr::new(10, 20, 30, 41), DST));
    }

    #[test]
    fn test_odd_length_payload() {
        let dgram = UdpBuilder::new().src_port(1).dst_port(2).build(SRC, DST, b"hello");
        assert_eq!(dgram.len(), 13);
        assert!(UdpHeader::parse(&dgram).unwrap().validate_checksum(SRC, DST));
    }

    #[test]
    fn test_zero_checksum_accepted() {
        let mut dgram = UdpBuilder::new().build(SRC, DST, b"data");
        dgram[6] = 0;
        dgram[7] = 0;
        assert!(UdpHeader::parse(&dgram).unwrap().validate_checksum(SRC, DST));
    }

    #[test]
    fn test_parse_too_short() {
        assert!(UdpHeader::parse(&[0u8; 7]).is_err());
    }
}
