use std::{
    fmt,
    net::{SocketAddr, ToSocketAddrs as _},
    time::Duration,
};

#[cfg(target_os = "linux")]
use std::path::PathBuf;

mod connection;
pub use self::connection::Connection;

/// Address of the remote collector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteAddr {
    /// UDP, to any of the resolved addresses.
    Udp(Vec<SocketAddr>),

    /// Unix domain socket, in `SOCK_DGRAM` mode.
    #[cfg(target_os = "linux")]
    Unixgram(PathBuf),

    /// Unix domain socket, in `SOCK_STREAM` mode.
    #[cfg(target_os = "linux")]
    Unix(PathBuf),
}

impl RemoteAddr {
    /// Returns the transport ID for the remote address.
    ///
    /// This is a simple acronym related to the transport that will be used for the remote address, such as `udp` for
    /// UDP, and so on.
    pub const fn transport_id(&self) -> &'static str {
        match self {
            RemoteAddr::Udp(_) => "udp",
            #[cfg(target_os = "linux")]
            RemoteAddr::Unix(_) => "uds-stream",
            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(_) => "uds",
        }
    }
}

impl Default for RemoteAddr {
    fn default() -> Self {
        RemoteAddr::Udp(vec![SocketAddr::from(([127, 0, 0, 1], 8125))])
    }
}

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteAddr::Udp(addrs) => match addrs.first() {
                Some(addr) => write!(f, "udp://{addr}"),
                None => f.write_str("udp://<unresolved>"),
            },
            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(path) => write!(f, "unixgram://{}", path.display()),
            #[cfg(target_os = "linux")]
            RemoteAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl<'a> TryFrom<&'a str> for RemoteAddr {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        #[cfg(target_os = "linux")]
        if let Some((scheme, path)) = addr.split_once("://") {
            return match scheme {
                "unix" => Ok(RemoteAddr::Unix(PathBuf::from(path))),
                "unixgram" => Ok(RemoteAddr::Unixgram(PathBuf::from(path))),
                _ => Err(format!("invalid scheme '{scheme}' (expected 'unix' or 'unixgram')")),
            };
        }

        match addr.to_socket_addrs() {
            Ok(addrs) => {
                let addrs = addrs.collect::<Vec<_>>();
                if addrs.is_empty() {
                    Err(format!("'{addr}' did not resolve to any address"))
                } else {
                    Ok(RemoteAddr::Udp(addrs))
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Connection configuration.
#[derive(Clone, Debug)]
pub(crate) struct ConnectionConfiguration {
    pub remote_addr: RemoteAddr,
    pub write_timeout: Duration,
}
