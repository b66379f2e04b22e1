//! The producer loop feeding the worker pool
//!
//! One producer thread owns the frame reader and is the only reader of the
//! byte source. Decode work is handed to the pool; completion slots are
//! queued in submission order so delivery matches file order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::trace;

use crate::blob::decode::decode_blob;
use crate::blob::frame::{Frame, FrameReader, BLOB_TYPE_DATA};
use crate::blob::source::ByteSource;
use crate::block::primitive::decode_primitive_block;
use crate::entity::EntityMask;
use crate::reader::queue::OutputQueue;
use crate::reader::slot::DecodeSlot;

/// Producer stalls once this many decode tasks are in flight.
pub(crate) const DEFAULT_MAX_WORK_QUEUE: usize = 10;
/// Producer stalls once this many undelivered buffers are queued.
pub(crate) const DEFAULT_MAX_BUFFER_QUEUE: usize = 20;

const BACKPRESSURE_POLL: Duration = Duration::from_millis(10);

/// State shared between the producer, the workers and the consumer.
pub(crate) struct PipelineShared {
    pub queue: OutputQueue,
    pub done: AtomicBool,
    pub pending: AtomicUsize,
}

impl PipelineShared {
    pub fn new() -> PipelineShared {
        PipelineShared {
            queue: OutputQueue::new(),
            done: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
        }
    }
}

pub(crate) struct PipelineConfig {
    pub mask: EntityMask,
    pub max_work_queue: usize,
    pub max_buffer_queue: usize,
}

/// Runs until the source is exhausted, the shared `done` flag is raised, or
/// a frame fails to read. A frame error is published through a pre-failed
/// slot so the consumer observes it in order.
pub(crate) fn run_producer<S: ByteSource>(
    mut frames: FrameReader<S>,
    shared: Arc<PipelineShared>,
    pool: rayon::ThreadPool,
    config: PipelineConfig,
) {
    loop {
        if shared.done.load(Ordering::Relaxed) {
            break;
        }

        match frames.next_frame(BLOB_TYPE_DATA) {
            Ok(None) => break,
            Ok(Some(frame)) => {
                let slot = DecodeSlot::new();
                shared.queue.push(Arc::clone(&slot));
                shared.pending.fetch_add(1, Ordering::Relaxed);

                let task_shared = Arc::clone(&shared);
                let mask = config.mask;
                pool.spawn(move || {
                    let Frame { seq_no, payload } = frame;
                    let result = decode_blob(&payload)
                        .and_then(|data| decode_primitive_block(&data, mask, seq_no));
                    task_shared.pending.fetch_sub(1, Ordering::Relaxed);
                    slot.fill(result);
                });

                // Stall while either queue is over its bound.
                while !shared.done.load(Ordering::Relaxed)
                    && (shared.pending.load(Ordering::Relaxed) >= config.max_work_queue
                        || shared.queue.len() >= config.max_buffer_queue)
                {
                    thread::sleep(BACKPRESSURE_POLL);
                }
            }
            Err(err) => {
                let slot = DecodeSlot::new();
                slot.fill(Err(err));
                shared.queue.push(slot);
                break;
            }
        }
    }

    trace!("producer finished");
    shared.queue.finish();
}
