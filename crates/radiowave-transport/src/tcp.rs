use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::NetStream;

/// TCP transport.
///
/// Provides bind/accept/connect over TCP sockets. Accepted and connected
/// streams have `TCP_NODELAY` set, since frames are usually small and
/// latency-bound.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    shut_down: AtomicBool,
}

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

impl TcpTransport {
    /// Bind and listen on a TCP address.
    ///
    /// Binding to port 0 picks an ephemeral port; use [`Self::local_addr`]
    /// to learn which one.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: format!("{addr:?}"),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: format!("{addr:?}"),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Accept an incoming connection (blocking).
    ///
    /// Returns `Err(TransportError::Shutdown)` once [`Self::shutdown`] has
    /// been called, including for an `accept` that was already blocked.
    pub fn accept(&self) -> Result<NetStream> {
        if self.is_shut_down() {
            return Err(TransportError::Shutdown);
        }
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        if self.is_shut_down() {
            debug!(%peer, "dropping connection accepted during shutdown");
            return Err(TransportError::Shutdown);
        }
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok(NetStream::from_tcp(stream))
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<NetStream> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: format!("{addr:?}"),
            source: e,
        })?;
        stream.set_nodelay(true)?;
        debug!(?addr, "connected to tcp socket");
        Ok(NetStream::from_tcp(stream))
    }

    /// Stop accepting connections.
    ///
    /// A blocked [`Self::accept`] is woken by a loopback connection to the
    /// bound port. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut wake = self.local_addr;
        if wake.ip().is_unspecified() {
            wake.set_ip(match wake.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        if let Err(err) = TcpStream::connect_timeout(&wake, WAKE_TIMEOUT) {
            debug!(%wake, error = %err, "listener wake-up connect failed");
        }
        info!(local_addr = %self.local_addr, "tcp listener shut down");
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// The address this transport is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
