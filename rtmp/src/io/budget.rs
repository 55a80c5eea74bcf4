use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Largest read buffer the producer asks for, whatever chunk size the peer negotiates
const MAX_READ_SIZE: usize = 1024 * 1024;

/// Largest chunk message header plus the extended timestamp and a 3 byte basic header
const CHUNK_OVERHEAD: usize = 11;

/// How many bytes the producer asks the socket for on each read.  Written by the consumer,
/// read by the producer.
#[derive(Debug)]
pub struct ReadBudget {
    handshake_read_size: usize,
    handshake_complete: AtomicBool,
    read_chunk_size: AtomicUsize,
}

impl ReadBudget {
    pub fn new(handshake_read_size: usize, read_chunk_size: usize) -> ReadBudget {
        ReadBudget {
            handshake_read_size,
            handshake_complete: AtomicBool::new(false),
            read_chunk_size: AtomicUsize::new(read_chunk_size),
        }
    }

    pub fn next_read_size(&self) -> usize {
        if !self.handshake_complete.load(Ordering::Acquire) {
            return self.handshake_read_size;
        }

        let chunk_size = self.read_chunk_size.load(Ordering::Acquire);
        chunk_size
            .saturating_add(CHUNK_OVERHEAD)
            .saturating_mul(4)
            .min(MAX_READ_SIZE)
    }

    pub fn complete_handshake(&self) {
        self.handshake_complete.store(true, Ordering::Release);
    }

    pub fn set_read_chunk_size(&self, size: usize) {
        self.read_chunk_size.store(size, Ordering::Release);
    }
}
