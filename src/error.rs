use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("interface {name} not found")]
    InterfaceNotFound { name: String },

    #[error("no route to {0}")]
    NoRoute(Ipv4Addr),

    #[error("sending packets through the loopback interface ({name}) is not supported")]
    Loopback { name: String },

    #[error("no source address: interface {name} has no IPv4 address, specify one explicitly")]
    NoSourceAddress { name: String },

    #[error("failed to open {name}: {source}. Run with root privileges.")]
    DeviceOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve ARP for {target} within {timeout:?}")]
    DiscoveryTimeout { target: Ipv4Addr, timeout: Duration },

    #[error("failed to parse time format: {0}")]
    Timestamp(String),

    #[error("payload of {len} bytes exceeds the {max} byte UDP limit")]
    PayloadTooLarge { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
