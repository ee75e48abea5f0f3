use std::fmt;
use std::io;

use radiowave_frame::FrameError;
use radiowave_resource::ResourceError;
use radiowave_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const NOT_FOUND: i32 = 127;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn resource_error(context: &str, err: ResourceError) -> CliError {
    match err {
        ResourceError::Transport(err) => transport_error(context, err),
        ResourceError::Frame(err) => frame_error(context, err),
        ResourceError::Factory(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ResourceError::InvalidArgument(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ResourceError::Spawn { source, .. } => io_error(context, source),
        ResourceError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = resource_error(
            "call failed",
            ResourceError::Frame(FrameError::Io(io::Error::from(io::ErrorKind::TimedOut))),
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("call failed: "));
    }

    #[test]
    fn missing_program_maps_to_127() {
        let err = resource_error(
            "exec failed",
            ResourceError::Spawn {
                program: "nope".to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, NOT_FOUND);
    }

    #[test]
    fn closed_and_usage_codes() {
        assert_eq!(resource_error("x", ResourceError::Closed).code, FAILURE);
        assert_eq!(
            resource_error("x", ResourceError::InvalidArgument("argv".into())).code,
            USAGE
        );
        assert_eq!(
            resource_error("x", ResourceError::Transport(TransportError::Shutdown)).code,
            TRANSPORT_ERROR
        );
    }
}
