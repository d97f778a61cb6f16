//! Egress devices
//!
//! A device reads and writes whole link-layer frames on one interface.

mod af_packet;
#[cfg(test)]
pub(crate) mod mock;

pub use af_packet::AfPacketSocket;

use crate::Result;
use std::future::Future;

/// Information about a received frame
#[derive(Debug, Clone)]
pub struct RxInfo {
    /// Number of bytes received
    pub len: usize,
}

/// Raw frame device trait
///
/// Implementors are moved into the ARP listener task during neighbor
/// discovery, so they must be `Send + 'static` in practice.
pub trait Capture: Send + Sync {
    /// Receive a frame into the provided buffer
    fn recv(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<RxInfo>> + Send;

    /// Send a frame
    fn send(&mut self, buf: &[u8]) -> impl Future<Output = Result<usize>> + Send;
}
