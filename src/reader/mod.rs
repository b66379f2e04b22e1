//! The user-facing reader over the parallel decode pipeline

mod pipeline;
mod queue;
mod slot;


use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::blob::decode::decode_blob;
use crate::blob::frame::{FrameReader, BLOB_TYPE_HEADER};
use crate::blob::source::ByteSource;
use crate::block::header::{decode_header_block, Header};
use crate::block::primitive::OutputBuffer;
use crate::entity::EntityMask;
use crate::error::{CodecError, Result};
use pipeline::{
    run_producer, PipelineConfig, PipelineShared, DEFAULT_MAX_BUFFER_QUEUE,
    DEFAULT_MAX_WORK_QUEUE,
};

/// Tuning knobs for [`Reader`].
#[derive(Clone, Copy, Debug)]
pub struct ReaderOptions {
    /// Entity kinds to decode. With an empty mask the reader only decodes
    /// the header and [`Reader::read`] immediately reports end of stream.
    pub mask: EntityMask,

    /// Worker threads for blob decoding. 0 uses the available parallelism.
    pub threads: usize,

    /// The producer stalls once this many decode tasks are in flight.
    pub max_work_queue: usize,

    /// The producer stalls once this many undelivered buffers are queued.
    pub max_buffer_queue: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            mask: EntityMask::ALL,
            threads: 0,
            max_work_queue: DEFAULT_MAX_WORK_QUEUE,
            max_buffer_queue: DEFAULT_MAX_BUFFER_QUEUE,
        }
    }
}

/// Reads a PBF stream and yields buffers of decoded entities in file order.
///
/// The header is decoded synchronously during construction; data decoding
/// runs on a dedicated producer thread feeding a worker pool. Call
/// [`Reader::read`] until it returns `None`.
pub struct Reader {
    header: Header,
    shared: Arc<PipelineShared>,
    producer: Option<JoinHandle<()>>,
    failed: bool,
}

impl Reader {
    pub fn new<S>(source: S) -> Result<Reader>
    where
        S: ByteSource + Send + 'static,
    {
        Reader::with_options(source, ReaderOptions::default())
    }

    pub fn with_options<S>(source: S, options: ReaderOptions) -> Result<Reader>
    where
        S: ByteSource + Send + 'static,
    {
        let mut frames = FrameReader::new(source);

        let header_frame = frames
            .next_frame(BLOB_TYPE_HEADER)?
            .ok_or(CodecError::Truncated("missing OSMHeader blob"))?;
        let header_data = decode_blob(&header_frame.payload)?;
        let header = decode_header_block(&header_data)?;

        let shared = Arc::new(PipelineShared::new());

        let producer = if options.mask.is_empty() {
            shared.queue.finish();
            None
        } else {
            let threads = match options.threads {
                0 => thread::available_parallelism().map(usize::from).unwrap_or(1),
                n => n,
            };
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|index| format!("osmflow-worker-{index}"))
                .build()
                .map_err(|err| CodecError::Io(io::Error::other(err)))?;

            let config = PipelineConfig {
                mask: options.mask,
                max_work_queue: options.max_work_queue.max(1),
                max_buffer_queue: options.max_buffer_queue.max(1),
            };
            let producer_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name("osmflow-read".into())
                .spawn(move || run_producer(frames, producer_shared, pool, config))
                .map_err(CodecError::Io)?;
            Some(handle)
        };

        Ok(Reader {
            header,
            shared,
            producer,
            failed: false,
        })
    }

    /// The header record decoded from the leading OSMHeader blob.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The next buffer of decoded entities, in file order. Blocks while
    /// decoding is in flight; `None` at the end of the stream.
    ///
    /// A decode error aborts the pipeline: the error is returned once and
    /// subsequent calls report end of stream.
    pub fn read(&mut self) -> Result<Option<OutputBuffer>> {
        if self.failed {
            return Ok(None);
        }
        match self.shared.queue.pop() {
            None => Ok(None),
            Some(slot) => match slot.wait() {
                Ok(buffer) => Ok(Some(buffer)),
                Err(err) => {
                    self.failed = true;
                    self.shared.done.store(true, Ordering::Relaxed);
                    Err(err)
                }
            },
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.shared.done.store(true, Ordering::Relaxed);
        self.shared.queue.drain();
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
    }
}
