//! Length-prefixed message framing.
//!
//! Every message on the wire is framed as:
//! - A 1-byte prefix `w` in `0..=8`
//! - A `w`-byte big-endian payload length with no leading zero byte
//! - The payload itself
//!
//! Readers consume exactly one frame's bytes from the stream, so whatever
//! follows a frame is left untouched for the next call.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, unpack_length, Frame, FrameConfig, LengthField,
    DEFAULT_MAX_PAYLOAD, MAX_PREFIX_WIDTH,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
