//! Describes a decoded `Node` with its fixed-point location

use super::{Info, Location, Tags};

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: i64,
    /// Undefined when the node is not visible.
    pub location: Location,
    pub tags: Tags,
    pub info: Info,
}

impl Node {
    /// Constructs a bare node without metadata or tags.
    pub fn new(id: i64, location: Location) -> Node {
        Node {
            id,
            location,
            tags: Tags::new(),
            info: Info::default(),
        }
    }
}
