//! Non-blocking byte transport: a tty in raw mode, or a `wpa_supplicant`
//! UNIX datagram socket, behind one capability set.
//!
//! Both variants expose the same shape the spec names: `open` (in each
//! constructor), `read-chunk`/`write-all` as non-blocking syscalls, and
//! `fd-for-poll` as `readable`/`writable` futures backed by the tokio
//! reactor (the single epoll call the whole bridge is built around).

pub mod tty;
pub mod unix_dgram;

use crate::error::Result;

/// Outcome of a non-blocking write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The whole buffer was accepted by the kernel.
    Complete,
    /// The write would have blocked (`EAGAIN`); nothing was written.
    WouldBlock,
}

/// Shared capability set for the tty and datagram transports.
///
/// `try_read`/`try_write` are non-blocking syscalls; `readable`/`writable`
/// are the `fd-for-poll` half, letting the core event loop wait on this
/// transport alongside the MQTT socket and the signal source in one
/// `tokio::select!`.
pub trait Transport {
    /// Read one chunk of available bytes into `buf` without blocking.
    /// Returns `Ok(0)` if nothing is currently available.
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `data` without blocking. A short write (fewer bytes accepted
    /// than requested) is reported as [`crate::BridgeError::TransportLost`] —
    /// the spec treats short writes as fatal, not retriable.
    fn try_write(&mut self, data: &[u8]) -> Result<WriteOutcome>;

    /// Wait until the transport has data to read.
    fn readable(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Wait until the transport can accept a write.
    fn writable(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
