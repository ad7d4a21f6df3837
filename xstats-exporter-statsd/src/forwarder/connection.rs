use std::{
    io::{self, Write},
    net::{Ipv4Addr, UdpSocket},
    time::Duration,
};

#[cfg(target_os = "linux")]
use std::os::unix::net::{UnixDatagram, UnixStream};

use tracing::debug;

use super::{ConnectionConfiguration, RemoteAddr};

enum Client {
    Udp(UdpSocket),

    #[cfg(target_os = "linux")]
    Unixgram(UnixDatagram),

    #[cfg(target_os = "linux")]
    Unix(UnixStream),
}

impl Client {
    fn from_config(config: &ConnectionConfiguration) -> io::Result<Self> {
        match &config.remote_addr {
            RemoteAddr::Udp(addrs) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).and_then(|socket| {
                socket.connect(&addrs[..])?;
                socket.set_write_timeout(Some(config.write_timeout))?;
                Ok(Client::Udp(socket))
            }),

            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(path) => UnixDatagram::unbound().and_then(|socket| {
                socket.connect(path)?;
                socket.set_write_timeout(Some(config.write_timeout))?;
                Ok(Client::Unixgram(socket))
            }),

            #[cfg(target_os = "linux")]
            RemoteAddr::Unix(path) => UnixStream::connect(path).and_then(|socket| {
                socket.set_write_timeout(Some(config.write_timeout))?;
                Ok(Client::Unix(socket))
            }),
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Client::Udp(socket) => socket.send(buf),

            #[cfg(target_os = "linux")]
            Client::Unixgram(socket) => socket.send(buf),

            #[cfg(target_os = "linux")]
            Client::Unix(socket) => {
                // Stream sockets carry no message boundaries, so each payload is length-prefixed.
                let len = u32::try_from(buf.len())
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large for length prefix"))?;
                socket.write_all(&len.to_le_bytes())?;
                socket.write_all(buf).map(|()| buf.len())
            }
        }
    }
}

enum ClientState {
    // Intermediate state during send attempts.
    Inconsistent,

    // Currently disconnected.
    Disconnected(ConnectionConfiguration),

    // Connected and ready to send packets.
    Ready(ConnectionConfiguration, Client),
}

impl ClientState {
    fn try_send(&mut self, payload: &[u8]) -> io::Result<usize> {
        loop {
            let old_state = std::mem::replace(self, ClientState::Inconsistent);
            match old_state {
                ClientState::Inconsistent => unreachable!("transitioned _from_ inconsistent state"),
                ClientState::Disconnected(config) => match Client::from_config(&config) {
                    Ok(client) => {
                        debug!(
                            transport = config.remote_addr.transport_id(),
                            remote_addr = %config.remote_addr,
                            "Connected to remote collector."
                        );
                        *self = ClientState::Ready(config, client);
                    }
                    Err(e) => {
                        *self = ClientState::Disconnected(config);
                        return Err(e);
                    }
                },
                ClientState::Ready(config, mut client) => {
                    let result = client.send(payload);
                    if result.is_ok() {
                        *self = ClientState::Ready(config, client);
                    } else {
                        *self = ClientState::Disconnected(config);
                    }

                    return result;
                }
            }
        }
    }
}

/// A connection to a remote collector, usable as the output of a
/// [`BufferedTransport`](crate::BufferedTransport).
///
/// The connection is established lazily on the first write. When a write fails, the connection is dropped and
/// re-established on the next write, so a collector that restarts does not permanently break the output.
pub struct Connection {
    state: ClientState,
}

impl Connection {
    /// Creates a new `Connection` to the given address.
    ///
    /// Each write is bounded by `write_timeout`.
    pub fn new(remote_addr: RemoteAddr, write_timeout: Duration) -> Self {
        Connection {
            state: ClientState::Disconnected(ConnectionConfiguration { remote_addr, write_timeout }),
        }
    }

    /// Returns `true` if the connection is currently established.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ClientState::Ready(..))
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.try_send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
