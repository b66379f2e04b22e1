//! The ordered FIFO of completion handles
//!
//! Single producer, single consumer in practice; safe for more. Slots are
//! enqueued at submission time, so draining the queue head-first yields
//! buffers in file order regardless of which worker finishes when.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::reader::slot::DecodeSlot;

struct QueueState {
    slots: VecDeque<Arc<DecodeSlot>>,
    finished: bool,
}

pub(crate) struct OutputQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl OutputQueue {
    pub fn new() -> OutputQueue {
        OutputQueue {
            state: Mutex::new(QueueState {
                slots: VecDeque::new(),
                finished: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, slot: Arc<DecodeSlot>) {
        let mut state = self.lock();
        state.slots.push_back(slot);
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Marks that no further slots will arrive, waking any blocked `pop`.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.finished = true;
        self.available.notify_all();
    }

    /// Takes the head slot, blocking while the queue is empty but still
    /// open. `None` once the queue is finished and drained.
    pub fn pop(&self) -> Option<Arc<DecodeSlot>> {
        let mut state = self.lock();
        loop {
            if let Some(slot) = state.slots.pop_front() {
                return Some(slot);
            }
            if state.finished {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Empties the queue without waiting on the slots. Used during
    /// teardown so worker-held buffers are released as they complete.
    pub fn drain(&self) {
        self.lock().slots.clear();
    }
}
