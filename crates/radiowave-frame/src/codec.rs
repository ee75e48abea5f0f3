use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Widest possible length field: a full big-endian `u64`.
pub const MAX_PREFIX_WIDTH: u8 = 8;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: u64 = 16 * 1024 * 1024;

/// A payload length in its minimal big-endian form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthField {
    bytes: [u8; 8],
    width: u8,
}

impl LengthField {
    /// Encode `length` with leading zero bytes stripped.
    pub fn new(length: u64) -> Self {
        Self {
            bytes: length.to_be_bytes(),
            width: MAX_PREFIX_WIDTH - (length.leading_zeros() / 8) as u8,
        }
    }

    /// Number of bytes in the field; this is the frame's prefix byte.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// The field bytes as they appear on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[usize::from(MAX_PREFIX_WIDTH - self.width)..]
    }

    /// The encoded length.
    pub fn value(&self) -> u64 {
        u64::from_be_bytes(self.bytes)
    }
}

/// Unpack a 1-8 byte big-endian length field into a `u64`.
///
/// The field is left-padded with zero bytes, so non-minimal encodings are
/// accepted.
pub fn unpack_length(field: &[u8]) -> Result<u64> {
    if field.is_empty() {
        return Err(FrameError::EmptyLengthField);
    }
    if field.len() > usize::from(MAX_PREFIX_WIDTH) {
        return Err(FrameError::InvalidPrefix(
            u8::try_from(field.len()).unwrap_or(u8::MAX),
        ));
    }

    let mut padded = [0u8; 8];
    padded[8 - field.len()..].copy_from_slice(field);
    Ok(u64::from_be_bytes(padded))
}

/// One complete frame as it appeared on the wire.
///
/// Holds the full frame bytes (prefix, length field and payload), which is
/// what message factories receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raw: Bytes,
    header_len: usize,
}

impl Frame {
    /// Build the frame for `payload`.
    pub fn encode(payload: &[u8]) -> Self {
        let mut buf = BytesMut::new();
        let header_len = encode_frame(payload, &mut buf);
        Self {
            raw: buf.freeze(),
            header_len,
        }
    }

    /// Validate that `raw` holds exactly one frame.
    pub fn parse(raw: impl Into<Bytes>) -> Result<Self> {
        let raw = raw.into();
        let Some(&width) = raw.first() else {
            return Err(FrameError::ConnectionClosed);
        };
        if width > MAX_PREFIX_WIDTH {
            return Err(FrameError::InvalidPrefix(width));
        }

        let header_len = 1 + usize::from(width);
        if raw.len() < header_len {
            return Err(FrameError::ConnectionClosed);
        }
        let length = read_length(&raw[1..header_len])?;

        let actual = (raw.len() - header_len) as u64;
        if actual != length {
            return Err(FrameError::LengthMismatch {
                expected: length,
                actual,
            });
        }

        Ok(Self { raw, header_len })
    }

    pub(crate) fn from_parts(raw: Bytes, header_len: usize) -> Self {
        Self { raw, header_len }
    }

    /// The prefix byte (width of the length field).
    pub fn prefix(&self) -> u8 {
        self.raw[0]
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.raw[self.header_len..]
    }

    /// The payload as a cheaply cloned `Bytes`.
    pub fn payload_bytes(&self) -> Bytes {
        self.raw.slice(self.header_len..)
    }

    /// The full frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consume the frame and return its full bytes.
    pub fn into_bytes(self) -> Bytes {
        self.raw
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        self.raw.len()
    }
}

/// Encode a payload into the wire format, returning the header length.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────────────┬──────────────────┐
/// │ Prefix (1B)│ Length (prefix bytes,│ Payload          │
/// │ 0..=8      │ big-endian, minimal) │ (Length bytes)   │
/// └────────────┴──────────────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> usize {
    let field = LengthField::new(payload.len() as u64);
    let header_len = 1 + usize::from(field.width());

    dst.reserve(header_len + payload.len());
    dst.put_u8(field.width());
    dst.put_slice(field.as_bytes());
    dst.put_slice(payload);
    header_len
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: u64) -> Result<Option<Frame>> {
    let Some(&width) = src.first() else {
        return Ok(None);
    };
    if width > MAX_PREFIX_WIDTH {
        return Err(FrameError::InvalidPrefix(width));
    }

    let header_len = 1 + usize::from(width);
    if src.len() < header_len {
        return Ok(None); // Need more data
    }

    let length = read_length(&src[1..header_len])?;
    if length > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }
    let payload_len = usize::try_from(length).map_err(|_| FrameError::PayloadTooLarge {
        size: length,
        max: max_payload,
    })?;

    let total = header_len + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let raw = src.split_to(total).freeze();
    Ok(Some(Frame::from_parts(raw, header_len)))
}

/// A zero-width field is the explicit encoding of length 0.
pub(crate) fn read_length(field: &[u8]) -> Result<u64> {
    if field.is_empty() {
        Ok(0)
    } else {
        unpack_length(field)
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: u64,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    /// Set the largest payload accepted or sent.
    pub fn with_max_payload_size(mut self, max_payload_size: u64) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Set the socket read deadline.
    pub fn with_read_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the socket write deadline.
    pub fn with_write_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}
