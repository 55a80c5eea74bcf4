//! Millisecond timestamps carried by RTMP message headers.
//!
//! Timestamps are 32 bit values that wrap around, so arithmetic wraps and ordering treats two
//! values as adjacent when they are within 2<sup>31</sup> - 1 milliseconds of each other.
//!
//! ```
//! use rtmp_mux::time::RtmpTimestamp;
//!
//! let early = RtmpTimestamp::new(u32::MAX - 10);
//! let late = early + 20;
//!
//! assert_eq!(late.value(), 9);
//! assert!(early < late);
//! assert_eq!(late.delta_since(early), 20);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Eq, PartialEq, Hash, Debug, Copy, Clone, Default)]
pub struct RtmpTimestamp {
    value: u32,
}

impl RtmpTimestamp {
    pub fn new(value: u32) -> Self {
        RtmpTimestamp { value }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Milliseconds elapsed from `earlier` to `self`, wrapping across the u32 boundary
    pub fn delta_since(&self, earlier: RtmpTimestamp) -> u32 {
        self.value.wrapping_sub(earlier.value)
    }
}

impl Add<u32> for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn add(self, milliseconds: u32) -> Self {
        RtmpTimestamp::new(self.value.wrapping_add(milliseconds))
    }
}

impl Sub<u32> for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn sub(self, milliseconds: u32) -> Self {
        RtmpTimestamp::new(self.value.wrapping_sub(milliseconds))
    }
}

impl Ord for RtmpTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.value == other.value {
            return Ordering::Equal;
        }

        // Serial number comparison: a forward distance below 2^31 means `other` is ahead
        if other.value.wrapping_sub(self.value) < 0x8000_0000 {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

impl PartialOrd for RtmpTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u32> for RtmpTimestamp {
    fn from(value: u32) -> Self {
        RtmpTimestamp::new(value)
    }
}

impl fmt::Display for RtmpTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.value)
    }
}
