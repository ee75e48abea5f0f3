use std::io::{ErrorKind, Read};

use bytes::{BufMut, BytesMut};
use radiowave_transport::NetStream;
use tracing::trace;

use crate::codec::{read_length, Frame, FrameConfig, MAX_PREFIX_WIDTH};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// Each field is read with an exact byte count, retrying short reads, so
/// the reader never pulls bytes belonging to the next frame off the stream.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached,
    /// whether at a frame boundary or in the middle of one.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut prefix = [0u8; 1];
        self.read_full(&mut prefix)?;
        let width = prefix[0];
        if width > MAX_PREFIX_WIDTH {
            return Err(FrameError::InvalidPrefix(width));
        }

        let mut field = [0u8; 8];
        let field = &mut field[..usize::from(width)];
        self.read_full(field)?;

        let length = read_length(field)?;
        if length > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: length,
                max: self.config.max_payload_size,
            });
        }
        let payload_len = usize::try_from(length).map_err(|_| FrameError::PayloadTooLarge {
            size: length,
            max: self.config.max_payload_size,
        })?;

        let header_len = 1 + field.len();
        let mut raw = BytesMut::with_capacity(header_len + payload_len);
        raw.put_u8(width);
        raw.put_slice(field);
        raw.resize(header_len + payload_len, 0);
        self.read_full(&mut raw[header_len..])?;

        trace!(width, length, "read frame");
        Ok(Frame::from_parts(raw.freeze(), header_len))
    }

    fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameReader<NetStream> {
    /// Create a frame reader for a `NetStream` and apply read timeout from config.
    pub fn with_config_net(inner: NetStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: radiowave_transport::TransportError) -> FrameError {
    match err {
        radiowave_transport::TransportError::Io(io)
        | radiowave_transport::TransportError::Accept(io) => FrameError::Io(io),
        radiowave_transport::TransportError::Bind { source, .. }
        | radiowave_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
