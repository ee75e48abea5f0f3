/// Errors that can occur in resource operations.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] radiowave_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] radiowave_frame::FrameError),

    /// The message factory could not build a response from a frame.
    #[error("message factory failed: {0}")]
    Factory(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A constructor argument was rejected before anything was started.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The child process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// A background task could not be started.
    #[error("failed to start {task} task: {source}")]
    Task {
        task: &'static str,
        source: std::io::Error,
    },

    /// The resource is closed; no further messages can be exchanged.
    #[error("resource closed")]
    Closed,
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(radiowave_transport::TransportError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, ResourceError>;
