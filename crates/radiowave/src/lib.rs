//! Typed request/response messaging over framed byte streams.
//!
//! radiowave moves length-prefixed frames over TCP connections, arbitrary
//! reader/writer pairs and child-process pipes, and exposes each as a
//! [`Resource`](resource::Resource) with blocking `write`, `read` and `call`.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and stream handles
//! - [`frame`]: minimal-width length-prefixed framing
//! - [`resource`]: pumps, close coordination, and the `Conn`, `File`,
//!   `Process` and `Listener` resources

/// Re-export transport types.
pub mod transport {
    pub use radiowave_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use radiowave_frame::*;
}

/// Re-export resource types.
pub mod resource {
    pub use radiowave_resource::*;
}

pub use radiowave_resource::{
    CloseReason, Conn, File, Listener, Message, MessageFactory, PayloadFactory, Process, Resource,
    ResourceConfig, ResourceError,
};
