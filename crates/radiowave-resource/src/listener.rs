use std::fmt::Debug;
use std::marker::PhantomData;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use radiowave_transport::TcpTransport;
use tracing::debug;

use crate::config::ResourceConfig;
use crate::conn::Conn;
use crate::error::Result;
use crate::message::{Message, MessageFactory};

/// Accepts TCP connections and wraps each one in a [`Conn`].
///
/// Every accepted connection shares the listener's factory but is otherwise
/// independent: closing one has no effect on the others or on the listener.
pub struct Listener<Req, F: MessageFactory> {
    transport: TcpTransport,
    factory: Arc<F>,
    config: ResourceConfig,
    next_conn_id: AtomicU64,
    _request: PhantomData<fn(Req)>,
}

impl<Req, F> Listener<Req, F>
where
    Req: Message,
    F: MessageFactory,
{
    /// Bind to `addr`. Use port 0 to pick a free port.
    pub fn bind(factory: impl Into<Arc<F>>, addr: impl ToSocketAddrs + Debug) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        debug!(addr = %transport.local_addr(), "resource listener ready");
        Ok(Self {
            transport,
            factory: factory.into(),
            config: ResourceConfig::default(),
            next_conn_id: AtomicU64::new(1),
            _request: PhantomData,
        })
    }

    /// Configuration applied to accepted connections.
    ///
    /// When a label is set, accepted connections are labelled
    /// `<label>-<n>`.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Block until a connection arrives and start a resource over it.
    pub fn accept(&self) -> Result<Conn<Req, F>> {
        let stream = self.transport.accept()?;
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let prefix = self.config.label.as_deref().unwrap_or("conn");
        let config = self.config.clone().with_label(format!("{prefix}-{id}"));
        Conn::from_stream(stream, Arc::clone(&self.factory), &config)
    }

    /// Stop accepting. A blocked or later `accept` returns
    /// [`TransportError::Shutdown`](radiowave_transport::TransportError::Shutdown).
    pub fn close(&self) {
        self.transport.shutdown();
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

impl<Req, F: MessageFactory> Debug for Listener<Req, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("transport", &self.transport)
            .field("label", &self.config.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use bytes::Bytes;
    use radiowave_transport::TransportError;

    use super::*;
    use crate::error::ResourceError;
    use crate::gate::LifecycleState;
    use crate::message::PayloadFactory;
    use crate::resource::Resource;

    fn upper_server(
        listener: Listener<Bytes, PayloadFactory>,
        connections: usize,
    ) -> thread::JoinHandle<()> {
        // The server reads requests as responses of its own factory and
        // writes replies back as requests.
        thread::spawn(move || {
            let mut handles = Vec::new();
            for _ in 0..connections {
                let conn = listener.accept().unwrap();
                handles.push(thread::spawn(move || {
                    while let Ok(payload) = conn.read() {
                        let reply = Bytes::from(payload.to_ascii_uppercase());
                        if conn.write(reply).is_err() {
                            break;
                        }
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
        })
    }

    #[test]
    fn accepted_connections_serve_calls() {
        let listener: Listener<Bytes, PayloadFactory> =
            Listener::bind(PayloadFactory, "127.0.0.1:0").unwrap();
        let addr = listener.local_addr();
        let server = upper_server(listener, 1);

        let conn: Conn<&'static str, PayloadFactory> = Conn::dial(PayloadFactory, addr).unwrap();
        assert_eq!(conn.call("quiet").unwrap().as_ref(), b"QUIET");
        assert_eq!(conn.call("again").unwrap().as_ref(), b"AGAIN");

        conn.close();
        server.join().unwrap();
    }

    fn serve_upper(conn: Conn<Bytes, PayloadFactory>) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while let Ok(payload) = conn.read() {
                if conn.write(Bytes::from(payload.to_ascii_uppercase())).is_err() {
                    break;
                }
            }
        })
    }

    #[test]
    fn closing_an_accepted_conn_leaves_others_and_the_listener_running() {
        let listener: Listener<Bytes, PayloadFactory> =
            Listener::bind(PayloadFactory, "127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let first: Conn<&'static str, PayloadFactory> = Conn::dial(PayloadFactory, addr).unwrap();
        let first_accepted = listener.accept().unwrap();
        let second: Conn<&'static str, PayloadFactory> = Conn::dial(PayloadFactory, addr).unwrap();
        let second_server = serve_upper(listener.accept().unwrap());

        assert_eq!(second.call("two").unwrap().as_ref(), b"TWO");

        first_accepted.close();
        assert_eq!(first_accepted.lifecycle(), LifecycleState::Closed);
        assert!(matches!(first.read(), Err(ResourceError::Closed)));

        // The other connection is unaffected.
        assert_eq!(second.call("still here").unwrap().as_ref(), b"STILL HERE");
        assert!(!second.is_closed());

        // The listener keeps accepting.
        let third: Conn<&'static str, PayloadFactory> = Conn::dial(PayloadFactory, addr).unwrap();
        let third_server = serve_upper(listener.accept().unwrap());
        assert_eq!(third.call("three").unwrap().as_ref(), b"THREE");

        first.close();
        second.close();
        third.close();
        second_server.join().unwrap();
        third_server.join().unwrap();
    }

    #[test]
    fn accepted_conns_carry_labels() {
        let listener: Listener<Bytes, PayloadFactory> =
            Listener::bind(PayloadFactory, "127.0.0.1:0")
                .unwrap()
                .with_config(ResourceConfig::default().with_label("echo"));
        let addr = listener.local_addr();

        let client = thread::spawn(move || {
            let conn: Conn<Bytes, PayloadFactory> = Conn::dial(PayloadFactory, addr).unwrap();
            conn.close();
        });

        let accepted = listener.accept().unwrap();
        let rendered = format!("{accepted:?}");
        assert!(rendered.contains("echo-1"), "{rendered}");
        client.join().unwrap();
        accepted.close();
    }

    #[test]
    fn close_wakes_blocked_accept() {
        let listener: Arc<Listener<Bytes, PayloadFactory>> =
            Arc::new(Listener::bind(PayloadFactory, "127.0.0.1:0").unwrap());

        let acceptor = {
            let listener = Arc::clone(&listener);
            thread::spawn(move || listener.accept())
        };

        thread::sleep(Duration::from_millis(50));
        listener.close();

        let err = acceptor.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Transport(TransportError::Shutdown)
        ));
        assert!(matches!(
            listener.accept(),
            Err(ResourceError::Transport(TransportError::Shutdown))
        ));
    }

    #[test]
    fn bind_conflict_is_reported() {
        let first: Listener<Bytes, PayloadFactory> =
            Listener::bind(PayloadFactory, "127.0.0.1:0").unwrap();
        let err =
            Listener::<Bytes, PayloadFactory>::bind(PayloadFactory, first.local_addr()).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Transport(TransportError::Bind { .. })
        ));
    }
}
