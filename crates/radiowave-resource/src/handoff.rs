use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// The handoff was closed before the transfer completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HandoffClosed;

/// Single-slot rendezvous between one side that puts and one that takes.
///
/// `put` returns only once its value has been taken, so there is never
/// more than one value in flight. `close` wakes every waiter; a value still
/// sitting in the slot is handed back to its putter's scope and dropped.
pub(crate) struct Handoff<T> {
    slot: Mutex<Slot<T>>,
    changed: Condvar,
}

struct Slot<T> {
    value: Option<T>,
    closed: bool,
    /// Tickets issued to putters, in slot order.
    issued: u64,
    /// Number of values taken so far.
    taken: u64,
}

impl<T> Handoff<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
                issued: 0,
                taken: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Block until `value` is taken, or fail if the handoff closes first.
    pub(crate) fn put(&self, value: T) -> Result<(), HandoffClosed> {
        let mut slot = self.lock();
        while slot.value.is_some() && !slot.closed {
            slot = self.wait(slot);
        }
        if slot.closed {
            return Err(HandoffClosed);
        }

        slot.value = Some(value);
        slot.issued += 1;
        let ticket = slot.issued;
        self.changed.notify_all();

        while slot.taken < ticket && !slot.closed {
            slot = self.wait(slot);
        }
        if slot.taken >= ticket {
            return Ok(());
        }

        // Closed with our value still in the slot.
        slot.value = None;
        Err(HandoffClosed)
    }

    /// Block until a value is available, or return `None` once closed.
    pub(crate) fn take(&self) -> Option<T> {
        let mut slot = self.lock();
        loop {
            if slot.closed {
                return None;
            }
            if let Some(value) = slot.value.take() {
                slot.taken += 1;
                self.changed.notify_all();
                return Some(value);
            }
            slot = self.wait(slot);
        }
    }

    /// Close the handoff, waking all waiters. Idempotent.
    pub(crate) fn close(&self) {
        let mut slot = self.lock();
        slot.closed = true;
        slot.value = None;
        self.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Slot<T>>) -> MutexGuard<'a, Slot<T>> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}
