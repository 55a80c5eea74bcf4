//! Server side of the plain RTMP handshake.
//!
//! The exchange is C0+C1 from the client, S0+S1 and S2 from the server, then C2 from the
//! client.  S1 carries 1528 random bytes that the client must echo back verbatim in C2.

mod errors;

pub use self::errors::HandshakeError;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use std::sync::atomic::{compiler_fence, Ordering};
use tracing::trace;

pub const RTMP_VERSION: u8 = 3;
const MAX_ACCEPTED_VERSION: u8 = 31;
const RANDOM_DATA_SIZE: usize = 1528;

/// Size of C1, C2, S1 and S2
pub const PACKET_SIZE: usize = 8 + RANDOM_DATA_SIZE;

/// Size of C0 and C1 read together
pub const C0_C1_SIZE: usize = 1 + PACKET_SIZE;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Stage {
    WaitingForC0C1,
    WaitingForC2,
    Complete,
}

/// The two writes the server performs after reading C0+C1
#[derive(Debug, Clone)]
pub struct HandshakeReply {
    pub s0_s1: Bytes,
    pub s2: Bytes,
}

pub struct Handshake {
    stage: Stage,
    s1_epoch: u32,
    s1_random: Box<[u8; RANDOM_DATA_SIZE]>,
}

impl Handshake {
    pub fn new() -> Handshake {
        Handshake {
            stage: Stage::WaitingForC0C1,
            s1_epoch: 0,
            s1_random: create_random_data(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// Validates C0+C1 and builds S0+S1 and S2.  Returns `Ok(None)` without consuming anything
    /// when fewer than 1537 bytes are available.
    pub fn process_c0_c1(
        &mut self,
        input: &[u8],
    ) -> Result<Option<(usize, HandshakeReply)>, HandshakeError> {
        if self.stage == Stage::Complete {
            return Err(HandshakeError::AlreadyCompleted);
        }

        if input.len() < C0_C1_SIZE {
            return Ok(None);
        }

        let version = input[0];
        if version < RTMP_VERSION || version > MAX_ACCEPTED_VERSION {
            return Err(HandshakeError::UnsupportedVersion { version });
        }

        let c1 = &input[1..C0_C1_SIZE];
        let peer_epoch = BigEndian::read_u32(&c1[0..4]);
        if BigEndian::read_u32(&c1[4..8]) != 0 {
            return Err(HandshakeError::NonZeroedTimeInC1);
        }

        let mut s0_s1 = BytesMut::with_capacity(C0_C1_SIZE);
        s0_s1.put_u8(RTMP_VERSION);
        s0_s1.put_u32(self.s1_epoch);
        s0_s1.put_u32(0);
        s0_s1.put_slice(&self.s1_random[..]);

        let mut s2 = BytesMut::with_capacity(PACKET_SIZE);
        s2.put_u32(peer_epoch);
        s2.put_u32(0);
        s2.put_slice(&c1[8..]);

        trace!(version, peer_epoch, "Accepted C0+C1");
        self.stage = Stage::WaitingForC2;
        Ok(Some((
            C0_C1_SIZE,
            HandshakeReply {
                s0_s1: s0_s1.freeze(),
                s2: s2.freeze(),
            },
        )))
    }

    /// Validates C2.  Returns the number of bytes consumed once the handshake is complete, or
    /// `Ok(None)` when fewer than 1536 bytes are available.
    pub fn process_c2(&mut self, input: &[u8]) -> Result<Option<usize>, HandshakeError> {
        if self.stage == Stage::Complete {
            return Err(HandshakeError::AlreadyCompleted);
        }

        if input.len() < PACKET_SIZE {
            return Ok(None);
        }

        let echoed_epoch = BigEndian::read_u32(&input[0..4]);
        if echoed_epoch != self.s1_epoch {
            return Err(HandshakeError::IncorrectPeerTime {
                expected: self.s1_epoch,
                received: echoed_epoch,
            });
        }

        if input[8..PACKET_SIZE] != self.s1_random[..] {
            return Err(HandshakeError::IncorrectRandomData);
        }

        self.stage = Stage::Complete;
        self.discard_random();
        Ok(Some(PACKET_SIZE))
    }

    fn discard_random(&mut self) {
        self.s1_random.fill(0);
        compiler_fence(Ordering::SeqCst);
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Handshake::new()
    }
}

impl Drop for Handshake {
    fn drop(&mut self) {
        self.discard_random();
    }
}

fn create_random_data() -> Box<[u8; RANDOM_DATA_SIZE]> {
    let mut data = Box::new([0_u8; RANDOM_DATA_SIZE]);
    rand::thread_rng().fill(&mut data[..]);
    data
}
