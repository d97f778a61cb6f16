//! Wire formats needed to put a UDP datagram on an Ethernet segment
//! and to resolve the next hop with ARP.

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod types;
pub mod udp;

pub use types::*;
