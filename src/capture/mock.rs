//! In-memory device for tests

use super::{Capture, RxInfo};
use crate::Result;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Records every sent frame and hands out queued inbound frames.
///
/// Once the inbound queue is empty, `recv` never completes, like a quiet
/// wire.
#[derive(Debug, Default)]
pub struct MockDevice {
    sent: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
    inbound: VecDeque<Vec<u8>>,
    dropped: Arc<AtomicBool>,
    fail_sends: bool,
}

/// Observer that stays valid after the device itself is dropped
#[derive(Debug, Clone)]
pub struct MockHandle {
    sent: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
    dropped: Arc<AtomicBool>,
}

impl MockDevice {
    pub fn new() -> (Self, MockHandle) {
        let device = Self::default();
        let handle = MockHandle {
            sent: device.sent.clone(),
            dropped: device.dropped.clone(),
        };
        (device, handle)
    }

    pub fn with_inbound(mut self, frame: Vec<u8>) -> Self {
        self.inbound.push_back(frame);
        self
    }

    /// Make every `send` fail like a downed link
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }
}

impl MockHandle {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().iter().map(|(_, frame)| frame.clone()).collect()
    }

    /// When each frame was sent, in tokio time
    pub fn send_times(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

impl Capture for MockDevice {
    async fn recv(&mut self, buf: &mut [u8]) -> Result<RxInfo> {
        match self.inbound.pop_front() {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(RxInfo { len })
            }
            None => std::future::pending().await,
        }
    }

    async fn send(&mut self, buf: &[u8]) -> Result<usize> {
        if self.fail_sends {
            return Err(io::Error::from_raw_os_error(libc::ENETDOWN).into());
        }
        self.sent.lock().unwrap().push((Instant::now(), buf.to_vec()));
        Ok(buf.len())
    }
}
