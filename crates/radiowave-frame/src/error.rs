/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The prefix byte announces a length field wider than 8 bytes.
    #[error("invalid length prefix {0} (max 8)")]
    InvalidPrefix(u8),

    /// A length field was unpacked from an empty buffer.
    #[error("length field is empty")]
    EmptyLengthField,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    /// A buffer handed to [`crate::Frame::parse`] is not exactly one frame.
    #[error("frame length mismatch (header announces {expected} bytes, got {actual})")]
    LengthMismatch { expected: u64, actual: u64 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for malformed-header errors, as opposed to I/O failures.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPrefix(_) | Self::EmptyLengthField | Self::LengthMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
