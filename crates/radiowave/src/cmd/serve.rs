use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use radiowave_resource::{Conn, Listener, PayloadFactory, Resource, ResourceConfig, ResourceError};
use radiowave_transport::TransportError;

use crate::cmd::{echo_reply, ServeArgs};
use crate::exit::{resource_error, CliError, CliResult, SUCCESS};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let listener: Listener<Bytes, PayloadFactory> =
        Listener::bind(PayloadFactory, args.addr.as_str())
            .map_err(|err| resource_error("bind failed", err))?
            .with_config(ResourceConfig::default().with_label("serve"));
    let listener = Arc::new(listener);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running), Arc::clone(&listener))?;

    print_listening(listener.local_addr(), format);

    let mut handlers: Vec<thread::JoinHandle<()>> = Vec::new();
    let mut accepted = 0usize;
    while running.load(Ordering::SeqCst) {
        let conn = match next_conn(listener.accept()) {
            Accepted::Ready(conn) => conn,
            Accepted::Skip => continue,
            Accepted::Stop => break,
        };
        accepted += 1;

        let upper = args.upper;
        let peer = conn.peer_addr();
        match thread::Builder::new()
            .name(format!("serve-{peer}"))
            .spawn(move || serve_conn(&conn, upper))
        {
            Ok(handler) => handlers.push(handler),
            Err(err) => tracing::warn!(%peer, error = %err, "failed to start connection handler"),
        }
        handlers.retain(|handler| !handler.is_finished());

        if args.count.is_some_and(|count| accepted >= count) {
            break;
        }
    }

    for handler in handlers {
        let _ = handler.join();
    }
    Ok(SUCCESS)
}

enum Accepted<T> {
    Ready(T),
    Skip,
    Stop,
}

/// Only a listener shutdown ends the accept loop. Any other error belongs to
/// a single inbound connection and is skipped.
fn next_conn<T>(result: Result<T, ResourceError>) -> Accepted<T> {
    match result {
        Ok(conn) => Accepted::Ready(conn),
        Err(ResourceError::Transport(TransportError::Shutdown)) => Accepted::Stop,
        Err(err) => {
            tracing::warn!(error = %err, "dropping inbound connection");
            Accepted::Skip
        }
    }
}

fn serve_conn(conn: &Conn<Bytes, PayloadFactory>, upper: bool) {
    let peer = conn.peer_addr();
    tracing::info!(%peer, "connection accepted");

    let mut served = 0usize;
    while let Ok(payload) = conn.read() {
        tracing::debug!(%peer, size = payload.len(), "echoing payload");
        if conn.write(Bytes::from(echo_reply(&payload, upper))).is_err() {
            break;
        }
        served += 1;
    }

    conn.close();
    tracing::info!(%peer, served, reason = ?conn.close_reason(), "connection closed");
}

fn install_ctrlc_handler(
    running: Arc<AtomicBool>,
    listener: Arc<Listener<Bytes, PayloadFactory>>,
) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        listener.close();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn connection_setup_errors_keep_serving() {
        let reset = ResourceError::Transport(TransportError::Io(io::Error::from(
            io::ErrorKind::NotConnected,
        )));
        assert!(matches!(next_conn::<()>(Err(reset)), Accepted::Skip));

        let accept = ResourceError::Transport(TransportError::Accept(io::Error::from(
            io::ErrorKind::ConnectionAborted,
        )));
        assert!(matches!(next_conn::<()>(Err(accept)), Accepted::Skip));
    }

    #[test]
    fn listener_shutdown_stops_serving() {
        let shutdown = ResourceError::Transport(TransportError::Shutdown);
        assert!(matches!(next_conn::<()>(Err(shutdown)), Accepted::Stop));
        assert!(matches!(next_conn(Ok(7u8)), Accepted::Ready(7)));
    }
}
