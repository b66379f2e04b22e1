#![doc = include_str!("../docs/lib.md")]

// Exposed modules
pub mod blob;
pub mod block;
pub mod collector;
pub mod entity;
pub mod reader;

// Hidden modules
#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod model;

#[cfg(test)]
pub(crate) mod test_support;

// Inlined structs
#[doc(inline)]
pub use blob::source::{ByteSource, ReadSource};
#[doc(inline)]
pub use block::header::{BoundingBox, Header};
#[doc(inline)]
pub use block::primitive::OutputBuffer;
#[doc(inline)]
pub use collector::{Collector, RelationHandler};
#[doc(inline)]
pub use entity::{
    Entity, EntityKind, EntityMask, Info, Location, Node, Relation, RelationMember, Tag, Tags,
    Way,
};
#[doc(inline)]
pub use reader::{Reader, ReaderOptions};

#[doc(hidden)]
pub use error::{CodecError, Result};
