//! Extracts length-delimited `BlobHeader` + `Blob` frames from a byte source

use log::trace;
use prost::Message;

use crate::blob::decode::MAX_UNCOMPRESSED_BLOB_SIZE;
use crate::blob::source::ByteSource;
use crate::error::{CodecError, Result};
use crate::model::BlobHeader;

/// Largest `BlobHeader` the format permits on the wire.
pub const MAX_BLOB_HEADER_SIZE: u32 = 64 * 1024;

/// Blob type of the first frame in a file.
pub(crate) const BLOB_TYPE_HEADER: &str = "OSMHeader";
/// Blob type of every frame after the first.
pub(crate) const BLOB_TYPE_DATA: &str = "OSMData";

const FRAME_LEN_SIZE: usize = 4;

/// One extracted frame: the blob payload together with its position in the
/// file, counted from 0.
pub struct Frame {
    pub seq_no: u64,
    pub payload: Vec<u8>,
}

/// Sequential frame extraction. Owns the input cursor; the only component
/// that touches the source.
pub struct FrameReader<S> {
    source: S,
    seq_no: u64,
}

impl<S: ByteSource> FrameReader<S> {
    pub fn new(source: S) -> FrameReader<S> {
        FrameReader { source, seq_no: 0 }
    }

    /// Extracts the next frame, or `None` at a clean end of the stream.
    ///
    /// `expected_type` is "OSMHeader" for the first call and "OSMData" for
    /// every call after it; a frame of any other type is corrupt.
    pub fn next_frame(&mut self, expected_type: &str) -> Result<Option<Frame>> {
        let mut len_buffer = [0_u8; FRAME_LEN_SIZE];
        if !self.source.read_exact(&mut len_buffer)? {
            return Ok(None);
        }

        let header_size = u32::from_be_bytes(len_buffer);
        if header_size > MAX_BLOB_HEADER_SIZE {
            return Err(CodecError::Corrupt(format!(
                "blob header too large: {header_size}"
            )));
        }

        let mut header_buffer = vec![0_u8; header_size as usize];
        if !self.source.read_exact(&mut header_buffer)? {
            return Err(CodecError::Truncated("unexpected end of input in blob header"));
        }

        let header = BlobHeader::decode(header_buffer.as_slice())?;
        if header.r#type != expected_type {
            return Err(CodecError::Corrupt(format!(
                "unexpected blob type {:?}, expected {expected_type:?}",
                header.r#type
            )));
        }
        if header.datasize < 0 || header.datasize as usize > MAX_UNCOMPRESSED_BLOB_SIZE {
            return Err(CodecError::Corrupt(format!(
                "invalid blob size: {}",
                header.datasize
            )));
        }

        let mut payload = vec![0_u8; header.datasize as usize];
        if !self.source.read_exact(&mut payload)? {
            return Err(CodecError::Truncated(
                "unexpected end of input in blob payload",
            ));
        }

        trace!(
            "frame {}: {} bytes of {expected_type}",
            self.seq_no,
            payload.len()
        );

        let frame = Frame {
            seq_no: self.seq_no,
            payload,
        };
        self.seq_no += 1;
        Ok(Some(frame))
    }
}
