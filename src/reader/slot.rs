//! Completion handles connecting workers to the consumer

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::block::primitive::OutputBuffer;
use crate::error::Result;

/// A one-shot completion handle for a single blob decode. The worker fills
/// it; the consumer blocks on it. Buffers transfer ownership through the
/// slot, worker to consumer.
pub(crate) struct DecodeSlot {
    cell: Mutex<Option<Result<OutputBuffer>>>,
    ready: Condvar,
}

impl DecodeSlot {
    pub fn new() -> Arc<DecodeSlot> {
        Arc::new(DecodeSlot {
            cell: Mutex::new(None),
            ready: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Result<OutputBuffer>>> {
        self.cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes the decode result. Called exactly once.
    pub fn fill(&self, result: Result<OutputBuffer>) {
        let mut cell = self.lock();
        debug_assert!(cell.is_none(), "slot filled twice");
        *cell = Some(result);
        self.ready.notify_all();
    }

    /// Blocks until the worker has filled the slot, then takes the result.
    pub fn wait(&self) -> Result<OutputBuffer> {
        let mut cell = self.lock();
        loop {
            if let Some(result) = cell.take() {
                return result;
            }
            cell = self
                .ready
                .wait(cell)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}
