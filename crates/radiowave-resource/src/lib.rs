//! Typed request/response resources over framed byte streams.
//!
//! A resource bridges a byte stream to two blocking handoff points: `write`
//! hands a request to a background writer pump, `read` takes the next
//! response decoded by a background reader pump. The same capability is
//! offered over three transports:
//!
//! - [`Conn`]: a TCP connection, dialed or produced by a [`Listener`]
//! - [`File`]: any reader/writer pair, or an adopted file descriptor
//! - [`Process`]: a child process's stdin/stdout
//!
//! Explicit close, pump failure, child exit and drop all converge on one
//! teardown that runs exactly once.

pub mod config;
pub mod conn;
pub mod error;
pub mod file;
pub mod gate;
mod handoff;
pub mod listener;
pub mod message;
pub mod process;
mod pump;
pub mod resource;

pub use config::ResourceConfig;
pub use conn::Conn;
pub use error::{ResourceError, Result};
pub use file::{File, HalfClose};
pub use gate::{CloseReason, LifecycleState};
pub use listener::Listener;
pub use message::{FrameBytesFactory, Message, MessageFactory, PayloadFactory};
pub use process::Process;
pub use pump::TransportCloser;
pub use resource::Resource;
