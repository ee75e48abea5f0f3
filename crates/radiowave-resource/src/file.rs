use std::io::{self, Cursor, Read, Write};
use std::marker::PhantomData;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use radiowave_frame::{FrameReader, FrameWriter};

use crate::config::ResourceConfig;
use crate::error::Result;
use crate::gate::{CloseReason, LifecycleState};
use crate::message::{Message, MessageFactory};
use crate::pump::{noop_closer, CloseTrigger, Pump, TransportCloser};
use crate::resource::Resource;

/// A stream half that can be closed while a pump is blocked in it.
///
/// [`File::new`] asks the reader half for a [`Shutdown::Read`] closer and
/// the writer half for a [`Shutdown::Write`] closer, and runs both once at
/// teardown. When both halves are the same socket the peer sees end of
/// stream.
pub trait HalfClose {
    /// A closer that shuts down `how` on this stream from another thread.
    fn half_closer(&self, how: Shutdown) -> io::Result<Box<dyn TransportCloser>>;
}

impl HalfClose for TcpStream {
    fn half_closer(&self, how: Shutdown) -> io::Result<Box<dyn TransportCloser>> {
        let handle = self.try_clone()?;
        Ok(Box::new(move || -> io::Result<()> {
            ignore_not_connected(handle.shutdown(how))
        }))
    }
}

#[cfg(unix)]
impl HalfClose for std::os::unix::net::UnixStream {
    fn half_closer(&self, how: Shutdown) -> io::Result<Box<dyn TransportCloser>> {
        let handle = self.try_clone()?;
        Ok(Box::new(move || -> io::Result<()> {
            ignore_not_connected(handle.shutdown(how))
        }))
    }
}

// In-memory streams never block, so there is nothing to interrupt.
impl<T> HalfClose for Cursor<T> {
    fn half_closer(&self, _how: Shutdown) -> io::Result<Box<dyn TransportCloser>> {
        Ok(noop_closer())
    }
}

impl HalfClose for io::Empty {
    fn half_closer(&self, _how: Shutdown) -> io::Result<Box<dyn TransportCloser>> {
        Ok(noop_closer())
    }
}

impl HalfClose for io::Sink {
    fn half_closer(&self, _how: Shutdown) -> io::Result<Box<dyn TransportCloser>> {
        Ok(noop_closer())
    }
}

impl HalfClose for Vec<u8> {
    fn half_closer(&self, _how: Shutdown) -> io::Result<Box<dyn TransportCloser>> {
        Ok(noop_closer())
    }
}

fn ignore_not_connected(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}

/// Run the reader closer then the writer closer, reporting the first error.
fn both_halves(
    reader: Box<dyn TransportCloser>,
    writer: Box<dyn TransportCloser>,
) -> Box<dyn TransportCloser> {
    Box::new(move || -> io::Result<()> {
        let read = reader.close();
        let write = writer.close();
        read.and(write)
    })
}

/// A resource over a reader/writer pair.
///
/// The reader half is owned by the reader pump and the writer half by the
/// writer pump; each is dropped when its pump exits. At teardown each half
/// is shut down through its [`HalfClose`] closer, which unblocks a pump
/// waiting inside the stream. Streams without that capability go through
/// [`File::with_closer`] with a closer that can interrupt them.
///
/// Frame size limits from the configuration apply; socket deadlines do not.
pub struct File<Req, F: MessageFactory> {
    pump: Pump<Req, F::Response>,
    _factory: PhantomData<fn() -> F>,
}

impl<Req, F> File<Req, F>
where
    Req: Message,
    F: MessageFactory,
{
    /// Start a resource over `reader` and `writer`, closing each half at
    /// teardown.
    pub fn new<R, W>(factory: impl Into<Arc<F>>, reader: R, writer: W) -> Result<Self>
    where
        R: Read + HalfClose + Send + 'static,
        W: Write + HalfClose + Send + 'static,
    {
        let closer = both_halves(
            reader.half_closer(Shutdown::Read)?,
            writer.half_closer(Shutdown::Write)?,
        );
        Self::start(
            factory.into(),
            reader,
            writer,
            closer,
            &ResourceConfig::default(),
        )
    }

    /// Like [`File::new`], with `closer` run once at teardown.
    pub fn with_closer<R, W, C>(
        factory: impl Into<Arc<F>>,
        reader: R,
        writer: W,
        closer: C,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        C: TransportCloser,
    {
        Self::start(
            factory.into(),
            reader,
            writer,
            Box::new(closer),
            &ResourceConfig::default(),
        )
    }

    /// Start a resource with an explicit configuration and closer.
    pub fn with_config<R, W, C>(
        factory: impl Into<Arc<F>>,
        reader: R,
        writer: W,
        closer: C,
        config: &ResourceConfig,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        C: TransportCloser,
    {
        Self::start(factory.into(), reader, writer, Box::new(closer), config)
    }

    pub(crate) fn start<R, W>(
        factory: Arc<F>,
        reader: R,
        writer: W,
        closer: Box<dyn TransportCloser>,
        config: &ResourceConfig,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let pump = Pump::start(
            config.label_or("file"),
            FrameReader::with_config(reader, config.frame.clone()),
            FrameWriter::with_config(writer, config.frame.clone()),
            factory,
            closer,
        )?;
        Ok(Self {
            pump,
            _factory: PhantomData,
        })
    }

    pub(crate) fn trigger(&self) -> CloseTrigger {
        self.pump.trigger()
    }
}

#[cfg(unix)]
impl<Req, F> File<Req, F>
where
    Req: Message,
    F: MessageFactory,
{
    /// Adopt an OS descriptor as both halves of the resource.
    ///
    /// The descriptor is duplicated for the writer. At teardown it is shut
    /// down with `shutdown(SHUT_RDWR)`, which unblocks both pumps and
    /// signals end of stream to the peer. Only sockets support that: for
    /// any other descriptor the teardown logs an `Unsupported` error and a
    /// blocked read returns only when the other end closes.
    pub fn from_fd(factory: impl Into<Arc<F>>, fd: std::os::fd::OwnedFd) -> Result<Self> {
        Self::from_fd_with_config(factory, fd, &ResourceConfig::default())
    }

    /// Like [`File::from_fd`], with an explicit configuration.
    pub fn from_fd_with_config(
        factory: impl Into<Arc<F>>,
        fd: std::os::fd::OwnedFd,
        config: &ResourceConfig,
    ) -> Result<Self> {
        let reader = std::fs::File::from(fd);
        let writer = reader.try_clone()?;
        let shutdown_handle = reader.try_clone()?;

        Self::start(
            factory.into(),
            reader,
            writer,
            Box::new(move || shutdown_fd(&shutdown_handle)),
            config,
        )
    }
}

#[cfg(unix)]
fn shutdown_fd(file: &std::fs::File) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: `file` owns the descriptor for the duration of the call.
    let rc = unsafe { libc::shutdown(file.as_raw_fd(), libc::SHUT_RDWR) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ENOTCONN) => Ok(()),
        Some(libc::ENOTSOCK) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "descriptor is not a socket and cannot be shut down",
        )),
        _ => Err(err),
    }
}

impl<Req, F> Resource for File<Req, F>
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

impl<Req, F: MessageFactory> std::fmt::Debug for File<Req, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("label", &self.pump.label())
            .field("state", &self.pump.lifecycle())
            .finish()
    }
}
