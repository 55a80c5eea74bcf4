//! Server side RTMP core.
//!
//! Bytes flow from the socket through [`io`], which runs the [`handshake`] and then the
//! [`chunk_io`] framer, into [`sessions`], which routes each message to the message stream it
//! belongs to.  Outbound messages take the reverse path through a single writer per connection.

pub mod chunk_io;
pub mod handshake;
pub mod io;
pub mod messages;
pub mod sessions;
pub mod time;

#[cfg(test)]
mod test_support;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, carrying on with the inner value if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
