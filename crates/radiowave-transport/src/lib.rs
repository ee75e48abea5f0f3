//! TCP transport handles for radiowave.
//!
//! This is the lowest layer: a bound [`TcpTransport`] that accepts inbound
//! connections, an outbound [`TcpTransport::connect`], and the [`NetStream`]
//! handle both produce. Framing and message pumps build on top of it.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::NetStream;
pub use tcp::TcpTransport;
