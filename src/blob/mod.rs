//! Byte sources, frame extraction and blob payload decoding

pub mod decode;
pub mod frame;
pub mod source;


#[doc(inline)]
pub use decode::decode_blob;
#[doc(inline)]
pub use frame::{Frame, FrameReader};
#[doc(inline)]
pub use source::{ByteSource, ReadSource};
