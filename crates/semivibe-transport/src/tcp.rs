use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// Default TCP port the device listens on.
pub const DEFAULT_PORT: u16 = 8989;

/// TCP listening endpoint.
///
/// The listener is non-blocking: [`TcpEndpoint::try_accept`] returns
/// `Ok(None)` when nobody is waiting, so the caller can poll for a stop
/// request between attempts instead of blocking forever in `accept`.
pub struct TcpEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on the first address `addr` resolves to.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let label = addr.to_string();
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: label.clone(),
            source: e,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| TransportError::Bind {
                addr: label.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: label,
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept a pending connection without blocking.
    ///
    /// Returns `Ok(None)` if no connection is pending.
    pub fn try_accept(&self) -> Result<Option<DeviceStream>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "accepted connection");
                Ok(Some(DeviceStream::from_tcp(stream)?))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Connect to a listening endpoint, trying each resolved address in turn.
    ///
    /// `timeout` bounds each individual connection attempt.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<DeviceStream> {
        let label = format!("{host}:{port}");
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                addr: label.clone(),
                source: e,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::Unresolved(label));
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, "connected to tcp endpoint");
                    return DeviceStream::from_tcp(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: label,
            source: last_err
                .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no address")),
        })
    }

    /// The address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
