//! Describes a decoded `Way` and its ordered node references

use super::{Info, Tags};

#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub id: i64,
    pub tags: Tags,
    pub info: Info,
    /// Referenced node ids in input order, reconstructed from the
    /// delta-encoded wire form.
    pub refs: Vec<i64>,
}

impl Way {
    pub fn new(id: i64, refs: Vec<i64>) -> Way {
        Way {
            id,
            refs,
            tags: Tags::new(),
            info: Info::default(),
        }
    }
}
