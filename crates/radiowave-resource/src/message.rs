use std::convert::Infallible;

use bytes::Bytes;
use radiowave_frame::{Frame, FrameError};

/// A value that can be sent as one frame's payload.
pub trait Message: Send + 'static {
    /// Serialize the message into the payload bytes.
    fn to_bytes(&self) -> Bytes;
}

impl Message for Bytes {
    fn to_bytes(&self) -> Bytes {
        self.clone()
    }
}

impl Message for Vec<u8> {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl Message for String {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl Message for &'static [u8] {
    fn to_bytes(&self) -> Bytes {
        Bytes::from_static(self)
    }
}

impl Message for &'static str {
    fn to_bytes(&self) -> Bytes {
        Bytes::from_static(self.as_bytes())
    }
}

/// Builds typed responses from received frames.
///
/// `from_bytes` receives the *complete* frame: the prefix byte, the length
/// field and the payload. Factories that only care about the payload can
/// use [`Frame::parse`] or wrap [`PayloadFactory`].
///
/// The factory is called once per frame on the reader pump's thread. An
/// error stops the reader pump and closes the resource.
pub trait MessageFactory: Send + Sync + 'static {
    /// The decoded response type.
    type Response: Send + 'static;
    /// Decode failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode one frame into a response.
    fn from_bytes(&self, frame: Bytes) -> Result<Self::Response, Self::Error>;
}

/// Returns each frame's full bytes unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameBytesFactory;

impl MessageFactory for FrameBytesFactory {
    type Response = Bytes;
    type Error = Infallible;

    fn from_bytes(&self, frame: Bytes) -> Result<Bytes, Infallible> {
        Ok(frame)
    }
}

/// Strips the frame header and returns the payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct PayloadFactory;

impl MessageFactory for PayloadFactory {
    type Response = Bytes;
    type Error = FrameError;

    fn from_bytes(&self, frame: Bytes) -> Result<Bytes, FrameError> {
        Frame::parse(frame).map(|frame| frame.payload_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bytes_factory_keeps_header() {
        let frame = Frame::encode(b"abc").into_bytes();
        let response = FrameBytesFactory.from_bytes(frame.clone()).unwrap();
        assert_eq!(response, frame);
        assert_eq!(response.as_ref(), &[0x01, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn payload_factory_strips_header() {
        let frame = Frame::encode(b"abc").into_bytes();
        let response = PayloadFactory.from_bytes(frame).unwrap();
        assert_eq!(response.as_ref(), b"abc");
    }

    #[test]
    fn payload_factory_rejects_malformed_frame() {
        let err = PayloadFactory
            .from_bytes(Bytes::from_static(&[0x01, 0x09, b'x']))
            .unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { .. }));
    }

    #[test]
    fn builtin_messages_serialize_verbatim() {
        assert_eq!(b"raw".as_slice().to_bytes().as_ref(), b"raw");
        assert_eq!("text".to_bytes().as_ref(), b"text");
        assert_eq!(String::from("owned").to_bytes().as_ref(), b"owned");
        assert_eq!(vec![1u8, 2, 3].to_bytes().as_ref(), &[1, 2, 3]);
    }
}
