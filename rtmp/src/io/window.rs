use crate::messages::PeerBandwidthLimitType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Acknowledgement window bookkeeping for one connection.
///
/// Everything except the written byte counter is owned by the consumer loop.  The written
/// counter is shared with the writer loop, which adds to it after every socket write.
#[derive(Debug)]
pub struct WindowState {
    read_window_ack_size: Option<u32>,
    write_window_ack_size: Option<u32>,
    read_unacknowledged_bytes: u64,
    total_bytes_received: u64,
    previous_limit_type: Option<PeerBandwidthLimitType>,
    write_unacknowledged_bytes: Arc<AtomicU64>,
}

impl WindowState {
    pub fn new(write_unacknowledged_bytes: Arc<AtomicU64>) -> WindowState {
        WindowState {
            read_window_ack_size: None,
            write_window_ack_size: None,
            read_unacknowledged_bytes: 0,
            total_bytes_received: 0,
            previous_limit_type: None,
            write_unacknowledged_bytes,
        }
    }

    pub fn read_window_ack_size(&self) -> Option<u32> {
        self.read_window_ack_size
    }

    pub fn write_window_ack_size(&self) -> Option<u32> {
        self.write_window_ack_size
    }

    pub fn read_unacknowledged_bytes(&self) -> u64 {
        self.read_unacknowledged_bytes
    }

    pub fn previous_limit_type(&self) -> Option<PeerBandwidthLimitType> {
        self.previous_limit_type
    }

    /// A window of zero turns acknowledgements off
    pub fn set_read_window_ack_size(&mut self, size: u32) {
        self.read_window_ack_size = if size == 0 { None } else { Some(size) };
    }

    /// Counts bytes consumed by the framer.  Returns the sequence number to acknowledge when
    /// the unacknowledged count reaches the window; the count then keeps only the remainder
    /// past the window.
    pub fn record_received(&mut self, count: usize) -> Option<u32> {
        self.total_bytes_received += count as u64;
        self.read_unacknowledged_bytes += count as u64;

        let window = self.read_window_ack_size? as u64;
        if self.read_unacknowledged_bytes < window {
            return None;
        }

        self.read_unacknowledged_bytes %= window;
        Some(self.total_bytes_received as u32)
    }

    /// Applies SetPeerBandwidth.  Returns whether it was accepted, in which case the peer
    /// expects a WindowAcknowledgementSize echoing `size`.
    pub fn apply_peer_bandwidth(&mut self, size: u32, limit_type: PeerBandwidthLimitType) -> bool {
        match limit_type {
            PeerBandwidthLimitType::Soft => {
                if matches!(self.write_window_ack_size, Some(current) if size > current) {
                    return false;
                }
            }

            PeerBandwidthLimitType::Dynamic => {
                if matches!(self.previous_limit_type, Some(previous) if previous != PeerBandwidthLimitType::Hard)
                {
                    return false;
                }
            }

            PeerBandwidthLimitType::Hard => (),
        }

        self.previous_limit_type = Some(limit_type);
        self.write_window_ack_size = Some(size);
        true
    }

    /// Applies an Acknowledgement from the peer against the written byte counter
    pub fn acknowledge_written(&self, bytes: u32) {
        let bytes = bytes as u64;
        let _ = self.write_unacknowledged_bytes.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |current| Some(current.saturating_sub(bytes)),
        );
    }

    pub fn write_unacknowledged_bytes(&self) -> u64 {
        self.write_unacknowledged_bytes.load(Ordering::Acquire)
    }
}
