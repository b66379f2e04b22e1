//! Decodes one blob payload into the enclosed block bytes
//!
//! Stateless and reentrant; runs on any worker thread.

use std::io::Read;

use flate2::read::ZlibDecoder;
use prost::Message;

use crate::error::{CodecError, Result};
use crate::model::{blob::Data, Blob};

/// Largest uncompressed block the format permits.
pub const MAX_UNCOMPRESSED_BLOB_SIZE: usize = 32 * 1024 * 1024;

/// Decodes a `Blob` message and unpacks its single payload variant.
pub fn decode_blob(payload: &[u8]) -> Result<Vec<u8>> {
    let blob = Blob::decode(payload)?;

    match blob.data {
        Some(Data::Raw(data)) => Ok(data),
        Some(Data::ZlibData(data)) => {
            let raw_size = blob.raw_size.unwrap_or(0);
            if raw_size < 0 || raw_size as usize > MAX_UNCOMPRESSED_BLOB_SIZE {
                return Err(CodecError::Corrupt(format!(
                    "invalid uncompressed blob size: {raw_size}"
                )));
            }
            inflate(&data, raw_size as usize)
        }
        Some(Data::LzmaData(_)) => {
            Err(CodecError::Unsupported("lzma blobs not implemented".into()))
        }
        Some(Data::ObsoleteBzip2Data(_)) => {
            Err(CodecError::Unsupported("bzip2 blobs not implemented".into()))
        }
        None => Err(CodecError::Corrupt("blob contains no data".into())),
    }
}

/// Inflates zlib data into exactly `raw_size` bytes.
fn inflate(data: &[u8], raw_size: usize) -> Result<Vec<u8>> {
    let mut decoded = vec![0_u8; raw_size];
    ZlibDecoder::new(data)
        .read_exact(&mut decoded)
        .map_err(|err| CodecError::Corrupt(format!("zlib inflate failed: {err}")))?;
    Ok(decoded)
}
