//! Describes a decoded `Relation` and its ordered member list

use super::{EntityKind, Info, Tags};

#[derive(Clone, Debug, PartialEq)]
pub struct RelationMember {
    pub kind: EntityKind,
    /// The referenced object id. The relation collector writes 0 here for
    /// members it was told not to track.
    pub ref_id: i64,
    pub role: String,
}

impl RelationMember {
    pub fn new(kind: EntityKind, ref_id: i64, role: impl Into<String>) -> RelationMember {
        RelationMember {
            kind,
            ref_id,
            role: role.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub id: i64,
    pub tags: Tags,
    pub info: Info,
    /// Members in input order.
    pub members: Vec<RelationMember>,
}

impl Relation {
    pub fn new(id: i64, members: Vec<RelationMember>) -> Relation {
        Relation {
            id,
            members,
            tags: Tags::new(),
            info: Info::default(),
        }
    }
}
