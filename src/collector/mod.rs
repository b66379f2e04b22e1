//! Two-pass assembly of relations with copies of their members
//!
//! Pass 1 scans the stream for relations worth keeping and indexes the
//! members they reference. Pass 2 scans the stream again, copies referenced
//! objects as they come by, and fires [`RelationHandler::complete_relation`]
//! the moment a relation's last member arrives. Memory stays bounded by the
//! kept relations and the members still outstanding; copies of members whose
//! relations have all completed are purged periodically.

mod meta;
mod store;

#[doc(hidden)]
mod test;

use log::{debug, trace};

use crate::entity::{Entity, EntityKind, EntityMask, Node, Relation, RelationMember, Way};
use meta::{MemberIndex, MemberMeta, RelationSlot};
use store::Buffer;

/// Member-store compactions run after this many completions by default.
pub const DEFAULT_PURGE_INTERVAL: usize = 1000;

/// Hooks a collector user implements to steer and observe assembly.
///
/// Only [`complete_relation`](RelationHandler::complete_relation) is
/// mandatory; every other hook defaults to keeping everything and observing
/// nothing.
pub trait RelationHandler {
    /// Pass 1: should this relation be assembled at all?
    fn keep_relation(&mut self, _relation: &Relation) -> bool {
        true
    }

    /// Pass 1: should this member of a kept relation be tracked? Members
    /// rejected here have their `ref_id` zeroed in the stored copy and are
    /// handed to `complete_relation` as `None`.
    fn keep_member(&mut self, _relation: &Relation, _member: &RelationMember) -> bool {
        true
    }

    /// Pass 2: all tracked members of `relation` have arrived. `members`
    /// aligns with `relation.members`; untracked members are `None`.
    ///
    /// Fires exactly once per relation, in the order last members arrive,
    /// which is not input order.
    fn complete_relation(&mut self, relation: &Relation, members: &[Option<&Entity>]);

    /// Pass 2: a tracked-kind node referenced by no kept relation.
    fn orphan_node(&mut self, _node: &Node) {}

    /// Pass 2: a tracked-kind way referenced by no kept relation.
    fn orphan_way(&mut self, _way: &Way) {}

    /// Pass 2: a tracked-kind relation referenced by no kept relation.
    fn orphan_relation(&mut self, _relation: &Relation) {}

    /// A purge relocated a member copy from `old_offset` to `new_offset`.
    /// Offsets previously observed through [`Collector::member_offset`]
    /// are stale after this fires.
    fn moving_in_buffer(&mut self, _old_offset: usize, _new_offset: usize) {}

    /// The second pass consumed its whole stream. Relations that never
    /// completed are still inspectable on the collector.
    fn done(&mut self) {}
}

/// Assembles relations over two sequential scans of an OSM stream.
pub struct Collector<H> {
    handler: H,
    tracked: EntityMask,
    relations: Buffer<Relation>,
    slots: Vec<RelationSlot>,
    index: MemberIndex,
    members: Buffer<Entity>,
    completions_since_purge: usize,
    purge_interval: usize,
    sorted: bool,
}

impl<H: RelationHandler> Collector<H> {
    /// `tracked` selects the member kinds worth collecting; members of
    /// other kinds are never tracked, pass-2 objects of other kinds are
    /// ignored.
    pub fn new(handler: H, tracked: EntityMask) -> Collector<H> {
        Collector {
            handler,
            tracked,
            relations: Buffer::new(),
            slots: Vec::new(),
            index: MemberIndex::default(),
            members: Buffer::new(),
            completions_since_purge: 0,
            purge_interval: DEFAULT_PURGE_INTERVAL,
            sorted: false,
        }
    }

    /// Overrides how many completions accumulate before a purge.
    pub fn purge_interval(mut self, completions: usize) -> Collector<H> {
        self.purge_interval = completions.max(1);
        self
    }

    /// Pass 1: consumes a stream, keeping relations and indexing their
    /// members. Non-relations in the stream are skipped.
    pub fn read_relations<I>(&mut self, source: I)
    where
        I: IntoIterator<Item = Entity>,
    {
        for entity in source {
            if let Entity::Relation(relation) = entity {
                if self.handler.keep_relation(&relation) {
                    self.add_relation(relation);
                }
            }
        }

        self.index.sort();
        self.sorted = true;

        debug!(
            "collecting {} relation(s): {} node, {} way, {} relation member(s) indexed",
            self.slots.len(),
            self.index.len(EntityKind::Node),
            self.index.len(EntityKind::Way),
            self.index.len(EntityKind::Relation),
        );
    }

    fn add_relation(&mut self, mut relation: Relation) {
        let slot_no = self.slots.len();

        let mut kept = Vec::with_capacity(relation.members.len());
        for member in &relation.members {
            kept.push(
                self.tracked.contains(member.kind)
                    && self.handler.keep_member(&relation, member),
            );
        }

        let mut slot = RelationSlot::new(0);
        for (position, (member, keep)) in relation.members.iter_mut().zip(&kept).enumerate() {
            if *keep {
                self.index.push(
                    member.kind,
                    MemberMeta {
                        member_id: member.ref_id,
                        relation_slot: slot_no as u32,
                        member_position: position as u32,
                        buffer_offset: None,
                    },
                );
                slot.needed += 1;
            } else {
                // Zeroed ref marks the member as uninteresting in the copy.
                member.ref_id = 0;
            }
        }

        let offset = self.relations.push(relation);
        if slot.needed == 0 {
            // Nothing to assemble.
            self.relations.rollback();
        } else {
            self.relations.commit();
            slot.offset = offset;
            self.slots.push(slot);
        }
    }

    /// Pass 2: consumes a stream of objects, then runs [`Collector::finish`].
    pub fn read_members<I>(&mut self, source: I)
    where
        I: IntoIterator<Item = Entity>,
    {
        for entity in source {
            self.handle(entity);
        }
        self.finish();
    }

    /// Feeds one pass-2 object. Exposed so callers can drive the second
    /// pass incrementally; call [`Collector::finish`] when the stream ends.
    pub fn handle(&mut self, entity: Entity) {
        debug_assert!(self.sorted, "read_relations must precede the second pass");

        let kind = entity.kind();
        if !self.tracked.contains(kind) {
            return;
        }

        let range = self.index.equal_range(kind, entity.id());
        if range.is_empty() {
            match entity {
                Entity::Node(node) => self.handler.orphan_node(&node),
                Entity::Way(way) => self.handler.orphan_way(&way),
                Entity::Relation(relation) => self.handler.orphan_relation(&relation),
            }
            return;
        }

        let position = self.members.push(entity);
        self.members.commit();

        // Record the copy on the whole range before advancing any slot, so
        // a completion triggered below sees every occurrence resolved.
        let entries = self.index.entries_mut(kind);
        for entry in &mut entries[range.clone()] {
            entry.buffer_offset = Some(position);
        }

        let mut completed = Vec::new();
        for entry in &entries[range] {
            let slot = &mut self.slots[entry.relation_slot as usize];
            slot.found += 1;
            if slot.is_complete() && !slot.done {
                completed.push(entry.relation_slot as usize);
            }
        }

        for slot_no in completed {
            self.complete(slot_no);
        }
        self.possibly_purge();
    }

    /// Ends the second pass: releases the index and fires
    /// [`RelationHandler::done`].
    pub fn finish(&mut self) {
        self.index.clear();
        self.handler.done();
    }

    fn complete(&mut self, slot_no: usize) {
        let Collector {
            handler,
            relations,
            members,
            slots,
            index,
            ..
        } = self;

        let slot = &mut slots[slot_no];
        let relation = relations.get(slot.offset);
        let resolved: Vec<Option<&Entity>> = relation
            .members
            .iter()
            .map(|member| {
                if member.ref_id == 0 {
                    return None;
                }
                let range = index.equal_range(member.kind, member.ref_id);
                index.entries(member.kind)[range]
                    .first()
                    .and_then(|entry| entry.buffer_offset)
                    .map(|offset| members.get(offset))
            })
            .collect();

        handler.complete_relation(relation, &resolved);
        slot.done = true;

        self.completions_since_purge += 1;
    }

    fn possibly_purge(&mut self) {
        if self.completions_since_purge < self.purge_interval {
            return;
        }
        self.purge_members();
        self.completions_since_purge = 0;
    }

    /// Compacts the member store, dropping copies referenced only by
    /// completed relations. Survivors that shift have their index entries
    /// rewritten before the relocation hook fires.
    fn purge_members(&mut self) {
        let keep: Vec<bool> = self
            .members
            .iter()
            .map(|entity| {
                let range = self.index.equal_range(entity.kind(), entity.id());
                self.index.entries(entity.kind())[range]
                    .iter()
                    .any(|entry| !self.slots[entry.relation_slot as usize].done)
            })
            .collect();

        trace!(
            "purging member store: keeping {}/{}",
            keep.iter().filter(|&&keep| keep).count(),
            keep.len()
        );

        let Collector {
            handler,
            members,
            index,
            ..
        } = self;
        members.compact(&keep, |entity, old, new| {
            let range = index.equal_range(entity.kind(), entity.id());
            for entry in &mut index.entries_mut(entity.kind())[range] {
                if entry.buffer_offset == Some(old) {
                    entry.buffer_offset = Some(new);
                }
            }
            handler.moving_in_buffer(old, new);
        });
    }

    /// Where the copy of `(kind, id)` currently lives in the member store,
    /// if it has arrived. Stale after the next purge relocates it.
    pub fn member_offset(&self, kind: EntityKind, id: i64) -> Option<usize> {
        let range = self.index.equal_range(kind, id);
        self.index.entries(kind)[range]
            .first()
            .and_then(|entry| entry.buffer_offset)
    }

    /// The member copy at `offset`.
    pub fn member(&self, offset: usize) -> &Entity {
        self.members.get(offset)
    }

    /// Kept relations whose members never all arrived.
    pub fn incomplete_relations(&self) -> impl Iterator<Item = &Relation> {
        self.slots
            .iter()
            .filter(|slot| !slot.done)
            .map(|slot| self.relations.get(slot.offset))
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}
