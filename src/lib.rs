//! syslog-replay
//!
//! Replays syslog lines as UDP datagrams written straight onto the wire as
//! Ethernet frames, so the IPv4 source address and UDP source port can be
//! chosen freely. Routing and ARP resolution are done in userspace.

pub mod capture;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod protocol;
pub mod replay;
pub mod telemetry;

pub use error::{Error, Result};
