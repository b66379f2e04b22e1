//! The byte source consumed by the frame reader
//!
//! Transport is an external concern; anything that can fill buffers works.
//! The pipeline reads from exactly one source, on one thread.

use std::io::{self, Read};

use crate::error::{CodecError, Result};

/// A blocking, sequential byte stream.
pub trait ByteSource {
    /// Fills `dst` completely, or returns `false` when the stream ended
    /// cleanly before the first byte of `dst`. A stream that ends partway
    /// through `dst` is truncated input.
    fn read_exact(&mut self, dst: &mut [u8]) -> Result<bool>;
}

/// Adapts any [`Read`] into a [`ByteSource`], looping over partial reads.
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> ReadSource<R> {
        ReadSource { inner }
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read_exact(&mut self, dst: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < dst.len() {
            match self.inner.read(&mut dst[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(CodecError::Truncated("unexpected end of input")),
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }
}

impl ByteSource for &[u8] {
    fn read_exact(&mut self, dst: &mut [u8]) -> Result<bool> {
        if self.is_empty() && !dst.is_empty() {
            return Ok(false);
        }
        if self.len() < dst.len() {
            return Err(CodecError::Truncated("unexpected end of input"));
        }
        let (head, tail) = self.split_at(dst.len());
        dst.copy_from_slice(head);
        *self = tail;
        Ok(true)
    }
}
