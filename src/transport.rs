//! The datagram transport feeding the acquisition loop

use std::{
    io,
    net::{SocketAddr, UdpSocket},
    time::Duration,
};

use tracing::debug;

pub const DEFAULT_REMOTE: ([u8; 4], u16) = ([192, 168, 0, 174], 5555);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
/// Room for the largest UDP payload
pub const DEFAULT_MAX_DATAGRAM: usize = 65536;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Where the I/Q stream comes from
    pub remote: SocketAddr,
    /// Local address to bind before connecting
    pub bind: SocketAddr,
    pub recv_timeout: Duration,
    pub send_timeout: Duration,
    /// Size of the receive buffer, longer datagrams are truncated
    pub max_datagram_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            remote: SocketAddr::from(DEFAULT_REMOTE),
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            recv_timeout: DEFAULT_TIMEOUT,
            send_timeout: DEFAULT_TIMEOUT,
            max_datagram_size: DEFAULT_MAX_DATAGRAM,
        }
    }
}

/// Bind, connect to the remote and set both timeouts.
/// A zero timeout is rejected by the OS with `InvalidInput`.
pub fn open(config: &TransportConfig) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(config.bind)?;
    socket.connect(config.remote)?;
    socket.set_read_timeout(Some(config.recv_timeout))?;
    socket.set_write_timeout(Some(config.send_timeout))?;
    debug!(
        local = %socket.local_addr()?,
        remote = %config.remote,
        "Transport connected"
    );
    Ok(socket)
}

/// Whether a receive error is just the read timeout expiring
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
