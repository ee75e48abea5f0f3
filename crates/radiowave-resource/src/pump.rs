//! Background pumps shared by every resource.
//!
//! A [`Pump`] owns three threads for its whole lifetime:
//!
//! - the writer pump takes requests from the inbound handoff and writes
//!   them as frames;
//! - the reader pump reads frames, runs the factory and publishes the
//!   responses to the outbound handoff;
//! - the cleanup task waits for the close gate, closes the transport once,
//!   tears down both handoffs and marks the resource closed.

use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use radiowave_frame::{FrameError, FrameReader, FrameWriter};
use tracing::{debug, warn};

use crate::error::{ResourceError, Result};
use crate::gate::{CloseGate, CloseReason, LifecycleState};
use crate::handoff::Handoff;
use crate::message::{Message, MessageFactory};

/// Releases the underlying transport at teardown.
///
/// Runs exactly once per resource, on the cleanup thread, after the close
/// signal fires. It should unblock any reader or writer stuck in the
/// transport. Errors are logged and otherwise ignored.
pub trait TransportCloser: Send + 'static {
    /// Close the transport.
    fn close(self: Box<Self>) -> io::Result<()>;
}

impl<F> TransportCloser for F
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    fn close(self: Box<Self>) -> io::Result<()> {
        (*self)()
    }
}

/// A closer that does nothing; the pump halves are released when their
/// threads exit.
pub(crate) fn noop_closer() -> Box<dyn TransportCloser> {
    Box::new(|| -> io::Result<()> { Ok(()) })
}

type CloserSlot = Arc<Mutex<Option<Box<dyn TransportCloser>>>>;

fn run_closer(slot: &CloserSlot, label: &str) {
    let closer = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(closer) = closer {
        if let Err(err) = closer.close() {
            warn!(resource = label, error = %err, "transport close failed");
        }
    }
}

/// Fires the close gate when a pump thread exits, including by panic.
struct FireOnExit {
    gate: Arc<CloseGate>,
    reason: CloseReason,
}

impl Drop for FireOnExit {
    fn drop(&mut self) {
        self.gate.fire(self.reason);
    }
}

/// Raises the close signal without waiting for teardown.
#[derive(Clone)]
pub(crate) struct CloseTrigger {
    gate: Arc<CloseGate>,
}

impl CloseTrigger {
    pub(crate) fn fire(&self, reason: CloseReason) -> bool {
        self.gate.fire(reason)
    }
}

pub(crate) struct Pump<Req, Resp> {
    inbound: Arc<Handoff<Bytes>>,
    outbound: Arc<Handoff<Resp>>,
    gate: Arc<CloseGate>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
    label: Arc<str>,
    max_payload: u64,
    _request: PhantomData<fn(Req)>,
}

impl<Req, Resp> Pump<Req, Resp>
where
    Req: Message,
    Resp: Send + 'static,
{
    /// Start the cleanup task and both pumps.
    ///
    /// If a thread cannot be spawned, whatever was started is torn down and
    /// the transport is closed before the error is returned.
    pub(crate) fn start<R, W, F>(
        label: Arc<str>,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        factory: Arc<F>,
        closer: Box<dyn TransportCloser>,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        F: MessageFactory<Response = Resp>,
    {
        let inbound = Arc::new(Handoff::new());
        let outbound = Arc::new(Handoff::new());
        let gate = Arc::new(CloseGate::new());
        let closer: CloserSlot = Arc::new(Mutex::new(Some(closer)));
        let max_payload = writer.max_payload_size();

        let cleanup = {
            let inbound = Arc::clone(&inbound);
            let outbound = Arc::clone(&outbound);
            let gate = Arc::clone(&gate);
            let closer = Arc::clone(&closer);
            let label = Arc::clone(&label);
            thread::Builder::new()
                .name(format!("{label}-cleanup"))
                .spawn(move || cleanup_task(&label, &gate, &closer, &inbound, &outbound))
        };
        let cleanup = match cleanup {
            Ok(handle) => handle,
            Err(source) => {
                run_closer(&closer, &label);
                return Err(ResourceError::Task {
                    task: "cleanup",
                    source,
                });
            }
        };

        let pump = Self {
            inbound,
            outbound,
            gate,
            cleanup: Mutex::new(Some(cleanup)),
            label,
            max_payload,
            _request: PhantomData,
        };

        let writer_task = {
            let inbound = Arc::clone(&pump.inbound);
            let guard = FireOnExit {
                gate: Arc::clone(&pump.gate),
                reason: CloseReason::WriterFailed,
            };
            let label = Arc::clone(&pump.label);
            thread::Builder::new()
                .name(format!("{label}-writer"))
                .spawn(move || writer_pump(&label, writer, &inbound, guard))
        };
        if let Err(source) = writer_task {
            pump.abort();
            return Err(ResourceError::Task {
                task: "writer",
                source,
            });
        }

        let reader_task = {
            let outbound = Arc::clone(&pump.outbound);
            let guard = FireOnExit {
                gate: Arc::clone(&pump.gate),
                reason: CloseReason::ReaderFailed,
            };
            let label = Arc::clone(&pump.label);
            thread::Builder::new()
                .name(format!("{label}-reader"))
                .spawn(move || reader_pump(&label, reader, factory.as_ref(), &outbound, guard))
        };
        if let Err(source) = reader_task {
            pump.abort();
            return Err(ResourceError::Task {
                task: "reader",
                source,
            });
        }

        debug!(resource = %pump.label, "resource started");
        Ok(pump)
    }

    /// Hand a request to the writer pump.
    ///
    /// A payload over the frame limit is rejected here and the resource
    /// stays open.
    pub(crate) fn write(&self, request: Req) -> Result<()> {
        let payload = request.to_bytes();
        let size = payload.len() as u64;
        if size > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload,
            }
            .into());
        }
        self.inbound.put(payload).map_err(|_| ResourceError::Closed)
    }
}

impl<Req, Resp> Pump<Req, Resp> {
    /// Take the next response from the reader pump.
    pub(crate) fn read(&self) -> Result<Resp> {
        self.outbound.take().ok_or(ResourceError::Closed)
    }

    /// Fire the close gate and wait for teardown to finish.
    pub(crate) fn close(&self, reason: CloseReason) {
        if self.gate.fire(reason) {
            debug!(resource = %self.label, %reason, "close requested");
        }
        self.gate.wait_closed();

        let handle = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(resource = %self.label, "cleanup task panicked");
            }
        }
    }

    /// A handle that can raise the close signal from another thread.
    pub(crate) fn trigger(&self) -> CloseTrigger {
        CloseTrigger {
            gate: Arc::clone(&self.gate),
        }
    }

    pub(crate) fn lifecycle(&self) -> LifecycleState {
        self.gate.lifecycle()
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.gate.reason()
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    fn abort(&self) {
        self.gate.fire(CloseReason::Requested);
        self.gate.wait_closed();
    }
}

impl<Req, Resp> Drop for Pump<Req, Resp> {
    fn drop(&mut self) {
        if self.gate.fire(CloseReason::Dropped) {
            debug!(resource = %self.label, "resource dropped while open");
        }
    }
}

fn cleanup_task<Req, Resp>(
    label: &str,
    gate: &CloseGate,
    closer: &CloserSlot,
    inbound: &Handoff<Req>,
    outbound: &Handoff<Resp>,
) {
    let reason = gate.wait_fired();
    debug!(resource = label, %reason, "tearing down");

    run_closer(closer, label);
    inbound.close();
    outbound.close();
    gate.finish();

    debug!(resource = label, "closed");
}

fn writer_pump<W: Write>(
    label: &str,
    mut writer: FrameWriter<W>,
    inbound: &Handoff<Bytes>,
    exit: FireOnExit,
) {
    while let Some(payload) = inbound.take() {
        if let Err(err) = writer.send(&payload) {
            if exit.gate.lifecycle() == LifecycleState::Open {
                warn!(resource = label, error = %err, "writer pump failed");
            } else {
                debug!(resource = label, error = %err, "writer pump stopped during close");
            }
            return;
        }
    }
    debug!(resource = label, "writer pump finished");
}

fn reader_pump<R, F>(
    label: &str,
    mut reader: FrameReader<R>,
    factory: &F,
    outbound: &Handoff<F::Response>,
    exit: FireOnExit,
) where
    R: Read,
    F: MessageFactory,
{
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                debug!(resource = label, "peer closed the stream");
                return;
            }
            Err(err) => {
                if exit.gate.lifecycle() == LifecycleState::Open {
                    warn!(resource = label, error = %err, "reader pump failed");
                } else {
                    debug!(resource = label, error = %err, "reader pump stopped during close");
                }
                return;
            }
        };

        let response = match factory.from_bytes(frame.into_bytes()) {
            Ok(response) => response,
            Err(err) => {
                warn!(resource = label, error = %err, "message factory rejected frame");
                return;
            }
        };

        if outbound.put(response).is_err() {
            debug!(resource = label, "reader pump finished");
            return;
        }
    }
}
