use std::fmt::Debug;
use std::marker::PhantomData;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use radiowave_frame::{FrameReader, FrameWriter};
use radiowave_transport::{NetStream, TcpTransport};
use tracing::debug;

use crate::config::ResourceConfig;
use crate::error::Result;
use crate::gate::{CloseReason, LifecycleState};
use crate::message::{Message, MessageFactory};
use crate::pump::Pump;
use crate::resource::Resource;

/// A resource over a TCP connection.
///
/// Closing the connection shuts the socket down in both directions, which
/// unblocks both pumps.
pub struct Conn<Req, F: MessageFactory> {
    pump: Pump<Req, F::Response>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    _factory: PhantomData<fn() -> F>,
}

impl<Req, F> Conn<Req, F>
where
    Req: Message,
    F: MessageFactory,
{
    /// Connect to `addr` with the default configuration.
    pub fn dial(factory: impl Into<Arc<F>>, addr: impl ToSocketAddrs + Debug) -> Result<Self> {
        Self::dial_with_config(factory, addr, &ResourceConfig::default())
    }

    /// Connect to `addr`, applying the socket deadlines from `config`.
    pub fn dial_with_config(
        factory: impl Into<Arc<F>>,
        addr: impl ToSocketAddrs + Debug,
        config: &ResourceConfig,
    ) -> Result<Self> {
        let stream = TcpTransport::connect(addr)?;
        Self::from_stream(stream, factory.into(), config)
    }

    pub(crate) fn from_stream(
        stream: NetStream,
        factory: Arc<F>,
        config: &ResourceConfig,
    ) -> Result<Self> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;

        let read_half = stream.try_clone()?;
        let shutdown_handle = stream.try_clone()?;
        let reader = FrameReader::with_config_net(read_half, config.frame.clone())?;
        let writer = FrameWriter::with_config_net(stream, config.frame.clone())?;

        let label = config.label_or("conn");
        debug!(resource = %label, %local_addr, %peer_addr, "starting connection");

        let pump = Pump::start(
            label,
            reader,
            writer,
            factory,
            Box::new(move || shutdown_handle.shutdown().map_err(std::io::Error::other)),
        )?;

        Ok(Self {
            pump,
            local_addr,
            peer_addr,
            _factory: PhantomData,
        })
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address of the remote peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl<Req, F> Resource for Conn<Req, F>
where
    Req: Message,
    F: MessageFactory,
{
    type Request = Req;
    type Response = F::Response;

    fn write(&self, request: Req) -> Result<()> {
        self.pump.write(request)
    }

    fn read(&self) -> Result<F::Response> {
        self.pump.read()
    }

    fn close(&self) {
        self.pump.close(CloseReason::Requested);
    }

    fn lifecycle(&self) -> LifecycleState {
        self.pump.lifecycle()
    }

    fn close_reason(&self) -> Option<CloseReason> {
        self.pump.close_reason()
    }
}

impl<Req, F: MessageFactory> std::fmt::Debug for Conn<Req, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("label", &self.pump.label())
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.pump.lifecycle())
            .finish()
    }
}
