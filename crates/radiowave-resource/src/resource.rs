use crate::error::Result;
use crate::gate::{CloseReason, LifecycleState};
use crate::message::Message;

/// A typed request/response endpoint backed by a framed byte stream.
///
/// Implemented by [`Conn`](crate::Conn), [`File`](crate::File) and
/// [`Process`](crate::Process). All methods take `&self`, so a resource can
/// be shared across threads; responses are still delivered strictly in wire
/// order, so concurrent `call`s on one resource can receive each other's
/// responses.
pub trait Resource {
    /// Messages sent to the peer.
    type Request: Message;
    /// Responses decoded by the resource's factory.
    type Response: Send + 'static;

    /// Hand `request` to the writer pump.
    ///
    /// Blocks until the pump has taken it. Returns
    /// [`ResourceError::Closed`](crate::ResourceError::Closed) once the
    /// resource is closed. A payload over the frame size limit is refused
    /// with [`ResourceError::Frame`](crate::ResourceError::Frame) and the
    /// resource stays open.
    fn write(&self, request: Self::Request) -> Result<()>;

    /// Block until the next response arrives.
    fn read(&self) -> Result<Self::Response>;

    /// Send a request and wait for the next response.
    fn call(&self, request: Self::Request) -> Result<Self::Response> {
        self.write(request)?;
        self.read()
    }

    /// Close the resource and wait for teardown. Idempotent.
    fn close(&self);

    /// `true` once the close signal has fired, whatever triggered it.
    fn is_closed(&self) -> bool {
        self.lifecycle() != LifecycleState::Open
    }

    /// Current lifecycle state.
    fn lifecycle(&self) -> LifecycleState;

    /// What closed the resource, if it is closed.
    fn close_reason(&self) -> Option<CloseReason>;
}
