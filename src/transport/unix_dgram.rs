//! `wpa_supplicant` control-socket transport.
//!
//! `AF_UNIX`/`SOCK_DGRAM`, connected to `/var/run/wpa_supplicant/<iface>`,
//! bound to an abstract address `\0wpa-mqtt-<iface>-<pid>` so the daemon's
//! unsolicited events and command replies both land on the same socket.
//! Each datagram is one logical record; [`crate::parser::LineParser`]
//! still splits on embedded newlines for multi-line replies.

use std::os::fd::{FromRawFd, IntoRawFd};

use nix::sys::socket::{bind, connect, socket, AddressFamily, SockFlag, SockType, UnixAddr};
use tokio::net::UnixDatagram;

use super::{Transport, WriteOutcome};
use crate::error::{BridgeError, Result};

/// A connected, non-blocking datagram socket to a `wpa_supplicant` control interface.
pub struct SupplicantTransport {
    sock: UnixDatagram,
}

impl SupplicantTransport {
    /// Open and connect the control socket for `iface`.
    pub fn open(iface: &str) -> Result<Self> {
        let fd = socket(
            AddressFamily::Unix,
            SockType::Datagram,
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
            None,
        )
        .map_err(nix_io_err)?;

        let local_name = format!("wpa-mqtt-{iface}-{}", std::process::id());
        let local = UnixAddr::new_abstract(local_name.as_bytes()).map_err(nix_io_err)?;
        bind(fd.as_raw_fd_for_nix(), &local).map_err(nix_io_err)?;

        let peer_path = format!("/var/run/wpa_supplicant/{iface}");
        let peer = UnixAddr::new(peer_path.as_str()).map_err(nix_io_err)?;
        connect(fd.as_raw_fd_for_nix(), &peer).map_err(nix_io_err)?;

        // SAFETY: `fd` was just created above and is moved into the std
        // socket, which takes ownership of the descriptor from here on.
        let std_sock = unsafe { std::os::unix::net::UnixDatagram::from_raw_fd(fd.into_raw_fd()) };
        std_sock.set_nonblocking(true).map_err(BridgeError::Io)?;
        let sock = UnixDatagram::from_std(std_sock).map_err(BridgeError::Io)?;

        Ok(Self { sock })
    }
}

// `nix::sys::socket::socket` returns an `OwnedFd`; this trait-free helper
// keeps the raw-fd extraction local to this module.
trait AsRawFdForNix {
    fn as_raw_fd_for_nix(&self) -> std::os::fd::RawFd;
}
impl AsRawFdForNix for std::os::fd::OwnedFd {
    fn as_raw_fd_for_nix(&self) -> std::os::fd::RawFd {
        std::os::fd::AsRawFd::as_raw_fd(self)
    }
}

fn nix_io_err(e: nix::errno::Errno) -> BridgeError {
    BridgeError::Io(std::io::Error::from(e))
}

impl Transport for SupplicantTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.sock.try_recv(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    fn try_write(&mut self, data: &[u8]) -> Result<WriteOutcome> {
        match self.sock.try_send(data) {
            Ok(n) if n == data.len() => Ok(WriteOutcome::Complete),
            Ok(n) => Err(BridgeError::TransportLost(format!(
                "short write: {n}/{} bytes",
                data.len()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(WriteOutcome::WouldBlock),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn readable(&self) -> Result<()> {
        self.sock.readable().await.map_err(BridgeError::Io)
    }

    async fn writable(&self) -> Result<()> {
        self.sock.writable().await.map_err(BridgeError::Io)
    }
}
