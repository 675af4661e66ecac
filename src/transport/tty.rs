//! Raw-mode tty transport for the AT-modem bridge.
//!
//! Opened `O_RDWR|O_NOCTTY|O_CLOEXEC|O_NONBLOCK`, put into raw mode (all
//! input/output processing disabled), buffers flushed before the first
//! write. Writes append a trailing `\r`; reads are byte-oriented and left
//! for [`crate::parser::LineParser`] to split into records.

use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::sys::termios::{self, SetArg};
use nix::unistd;
use tokio::io::unix::AsyncFd;

use super::{Transport, WriteOutcome};
use crate::error::{BridgeError, Result};

/// A tty opened in raw mode, wrapped for readiness-driven non-blocking I/O.
pub struct TtyTransport {
    fd: AsyncFd<OwnedFd>,
}

impl TtyTransport {
    /// Open `path`, configure it for raw-mode AT command traffic, and
    /// flush any stale bytes sitting in the kernel's tty buffers.
    pub fn open(path: &str) -> Result<Self> {
        let raw: RawFd = fcntl::open(
            path,
            OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_CLOEXEC | OFlag::O_NONBLOCK,
            Mode::empty(),
        )
        .map_err(nix_io_err)?;

        // SAFETY: `raw` was just returned by `open` and is not owned elsewhere.
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };

        configure_raw_mode(owned.as_raw_fd())?;
        termios::tcflush(&owned, termios::FlushArg::TCIOFLUSH).map_err(nix_io_err)?;

        let fd = AsyncFd::new(owned).map_err(BridgeError::Io)?;
        Ok(Self { fd })
    }
}

fn configure_raw_mode(raw: RawFd) -> Result<()> {
    // SAFETY: `raw` is open for the duration of this call, owned by the caller.
    let borrowed = unsafe { BorrowedFd::borrow_raw(raw) };
    let mut tio = termios::tcgetattr(borrowed).map_err(nix_io_err)?;
    termios::cfmakeraw(&mut tio);
    termios::tcsetattr(borrowed, SetArg::TCSANOW, &tio).map_err(nix_io_err)?;
    Ok(())
}

fn nix_io_err(e: Errno) -> BridgeError {
    BridgeError::Io(std::io::Error::from(e))
}

impl Transport for TtyTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match unistd::read(self.fd.get_ref().as_raw_fd(), buf) {
            Ok(n) => Ok(n),
            Err(Errno::EAGAIN) => Ok(0),
            Err(e) => Err(nix_io_err(e)),
        }
    }

    fn try_write(&mut self, data: &[u8]) -> Result<WriteOutcome> {
        let mut framed = Vec::with_capacity(data.len() + 1);
        framed.extend_from_slice(data);
        framed.push(b'\r');

        // SAFETY: the fd is owned by `self.fd` for the object's whole lifetime.
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd.get_ref().as_raw_fd()) };
        match unistd::write(borrowed, &framed) {
            Ok(n) if n == framed.len() => Ok(WriteOutcome::Complete),
            Ok(n) => Err(BridgeError::TransportLost(format!(
                "short write: {n}/{} bytes",
                framed.len()
            ))),
            Err(Errno::EAGAIN) => Ok(WriteOutcome::WouldBlock),
            Err(e) => Err(nix_io_err(e)),
        }
    }

    async fn readable(&self) -> Result<()> {
        let mut guard = self.fd.readable().await.map_err(BridgeError::Io)?;
        // `try_read` runs outside this guard via raw `nix` reads, so clear
        // the cached readiness here — level-triggered epoll re-reports it
        // next wait if bytes are still pending. Dropping the guard without
        // this leaves AsyncFd believing the fd is still ready, spinning
        // `select!` once the real buffer has been drained to EAGAIN.
        guard.clear_ready();
        Ok(())
    }

    async fn writable(&self) -> Result<()> {
        let mut guard = self.fd.writable().await.map_err(BridgeError::Io)?;
        guard.clear_ready();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // TtyTransport::open requires a real tty device, which isn't available
    // in CI sandboxes; the write-framing and short-write logic it shares
    // with the datagram transport is exercised via the in-memory fake
    // transport in `crate::core` tests instead.
}
