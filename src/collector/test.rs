#![cfg(test)]

use crate::collector::{Collector, RelationHandler};
use crate::entity::{
    Entity, EntityKind, EntityMask, Location, Node, Relation, RelationMember, Way,
};

fn way(id: i64) -> Entity {
    Entity::Way(Way::new(id, vec![id * 10, id * 10 + 1]))
}

fn node(id: i64) -> Entity {
    Entity::Node(Node::new(id, Location::new(0, 0)))
}

fn relation(id: i64, members: Vec<RelationMember>) -> Entity {
    Entity::Relation(Relation::new(id, members))
}

fn way_member(ref_id: i64) -> RelationMember {
    RelationMember::new(EntityKind::Way, ref_id, "outer")
}

/// Records every hook invocation for assertions.
#[derive(Default)]
struct Recorder {
    completed: Vec<(i64, Vec<Option<i64>>)>,
    orphan_ways: Vec<i64>,
    orphan_nodes: Vec<i64>,
    moves: Vec<(usize, usize)>,
    done: usize,
}

impl RelationHandler for Recorder {
    fn complete_relation(&mut self, relation: &Relation, members: &[Option<&Entity>]) {
        self.completed.push((
            relation.id,
            members.iter().map(|m| m.map(Entity::id)).collect(),
        ));
    }

    fn orphan_node(&mut self, node: &Node) {
        self.orphan_nodes.push(node.id);
    }

    fn orphan_way(&mut self, way: &Way) {
        self.orphan_ways.push(way.id);
    }

    fn moving_in_buffer(&mut self, old_offset: usize, new_offset: usize) {
        self.moves.push((old_offset, new_offset));
    }

    fn done(&mut self) {
        self.done += 1;
    }
}

#[test]
fn two_pass_assembly() {
    let mut collector = Collector::new(Recorder::default(), EntityMask::WAYS);

    collector.read_relations(vec![relation(1, vec![way_member(7), way_member(8)])]);
    collector.read_members(vec![way(7), way(9), way(8)]);

    let recorder = collector.handler();
    assert_eq!(recorder.orphan_ways, vec![9]);
    assert_eq!(recorder.done, 1);
    assert_eq!(recorder.completed.len(), 1);

    let (relation_id, members) = &recorder.completed[0];
    assert_eq!(*relation_id, 1);
    assert_eq!(members, &vec![Some(7), Some(8)]);
}

#[test]
fn completion_fires_when_last_member_arrives() {
    struct OrderProbe {
        completed: Vec<i64>,
    }
    impl RelationHandler for OrderProbe {
        fn complete_relation(&mut self, relation: &Relation, members: &[Option<&Entity>]) {
            assert!(members.iter().all(Option::is_some));
            self.completed.push(relation.id);
        }
    }

    let mut collector = Collector::new(OrderProbe { completed: vec![] }, EntityMask::WAYS);
    collector.read_relations(vec![
        relation(1, vec![way_member(7), way_member(8)]),
        relation(2, vec![way_member(9)]),
    ]);
    // Relation 2's only member arrives before relation 1's last one.
    collector.read_members(vec![way(7), way(9), way(8)]);

    assert_eq!(collector.handler().completed, vec![2, 1]);
}

#[test]
fn relation_with_only_filtered_members_is_rolled_back() {
    struct RejectAll;
    impl RelationHandler for RejectAll {
        fn keep_member(&mut self, _: &Relation, _: &RelationMember) -> bool {
            false
        }
        fn complete_relation(&mut self, _: &Relation, _: &[Option<&Entity>]) {
            panic!("nothing should complete");
        }
    }

    let mut collector = Collector::new(RejectAll, EntityMask::WAYS);
    collector.read_relations(vec![relation(1, vec![way_member(7)])]);
    collector.read_members(vec![way(7)]);

    // The relation was never committed, so way 7 is an orphan and nothing
    // is left incomplete.
    assert_eq!(collector.incomplete_relations().count(), 0);
}

#[test]
fn untracked_member_kinds_resolve_to_none() {
    let mut collector = Collector::new(Recorder::default(), EntityMask::WAYS);
    collector.read_relations(vec![relation(
        5,
        vec![
            RelationMember::new(EntityKind::Node, 100, "admin_centre"),
            way_member(7),
        ],
    )]);
    collector.read_members(vec![node(100), way(7)]);

    let (_, members) = &collector.handler().completed[0];
    assert_eq!(members, &vec![None, Some(7)]);
}

#[test]
fn shared_member_counts_for_every_relation() {
    let mut collector = Collector::new(Recorder::default(), EntityMask::WAYS);
    collector.read_relations(vec![
        relation(1, vec![way_member(7)]),
        relation(2, vec![way_member(7)]),
    ]);
    collector.read_members(vec![way(7)]);

    let completed: Vec<i64> = collector
        .handler()
        .completed
        .iter()
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(completed, vec![1, 2]);
}

#[test]
fn duplicate_member_positions_both_resolve() {
    let mut collector = Collector::new(Recorder::default(), EntityMask::WAYS);
    collector.read_relations(vec![relation(1, vec![way_member(7), way_member(7)])]);
    collector.read_members(vec![way(7)]);

    let (_, members) = &collector.handler().completed[0];
    assert_eq!(members, &vec![Some(7), Some(7)]);
}

#[test]
fn incomplete_relations_survive_done() {
    let mut collector = Collector::new(Recorder::default(), EntityMask::WAYS);
    collector.read_relations(vec![relation(1, vec![way_member(7), way_member(8)])]);
    collector.read_members(vec![way(7)]);

    assert_eq!(collector.handler().done, 1);
    assert!(collector.handler().completed.is_empty());
    let incomplete: Vec<i64> = collector.incomplete_relations().map(|r| r.id).collect();
    assert_eq!(incomplete, vec![1]);
}

#[test]
fn orphans_of_untracked_kinds_are_ignored() {
    let mut collector = Collector::new(Recorder::default(), EntityMask::WAYS);
    collector.read_relations(vec![relation(1, vec![way_member(7)])]);
    collector.read_members(vec![node(55), way(7)]);

    assert!(collector.handler().orphan_nodes.is_empty());
}

#[test]
fn purge_relocates_surviving_members() {
    let mut collector =
        Collector::new(Recorder::default(), EntityMask::WAYS).purge_interval(1);

    // Relation 1 completes first and its member becomes purgeable;
    // relation 2 stays open so way 8's copy must survive the purge.
    collector.read_relations(vec![
        relation(1, vec![way_member(7)]),
        relation(2, vec![way_member(8), way_member(9)]),
    ]);

    collector.handle(way(7));
    collector.handle(way(8));

    // Way 7's completion triggered a purge; way 8 arrived afterwards and
    // sits at offset 0 of the compacted store.
    assert_eq!(collector.member_offset(EntityKind::Way, 8), Some(0));

    collector.handle(way(9));
    collector.finish();

    let recorder = collector.handler();
    assert_eq!(recorder.completed.len(), 2);
    let (_, members) = &recorder.completed[1];
    assert_eq!(members, &vec![Some(8), Some(9)]);
}

#[test]
fn purge_rewrites_offsets_and_notifies() {
    let mut collector =
        Collector::new(Recorder::default(), EntityMask::WAYS).purge_interval(1);

    collector.read_relations(vec![
        relation(1, vec![way_member(7)]),
        relation(2, vec![way_member(8), way_member(9)]),
    ]);

    // Way 8 arrives first, then way 7 completes relation 1 and forces a
    // purge: way 7's copy (offset 1) is dropped, way 8 stays at offset 0.
    collector.handle(way(8));
    assert_eq!(collector.member_offset(EntityKind::Way, 8), Some(0));
    collector.handle(way(7));
    assert_eq!(collector.member_offset(EntityKind::Way, 8), Some(0));

    // No survivor shifted, so no relocation was reported.
    assert!(collector.handler().moves.is_empty());
}

#[test]
fn relocated_member_is_read_from_its_new_offset() {
    let mut collector =
        Collector::new(Recorder::default(), EntityMask::WAYS).purge_interval(2);

    collector.read_relations(vec![
        relation(1, vec![way_member(7)]),
        relation(2, vec![way_member(8), way_member(9)]),
        relation(3, vec![way_member(10)]),
    ]);

    collector.handle(way(7)); // offset 0, completes relation 1
    collector.handle(way(8)); // offset 1, relation 2 still open
    collector.handle(way(10)); // offset 2, completes relation 3, triggers purge

    // The purge dropped ways 7 and 10 and slid way 8 from offset 1 to 0.
    assert_eq!(collector.handler().moves, vec![(1, 0)]);
    assert_eq!(collector.member_offset(EntityKind::Way, 8), Some(0));

    // Relation 2 completes after the relocation and must read the copy
    // from its new home.
    collector.handle(way(9));
    collector.finish();

    let recorder = collector.handler();
    assert_eq!(recorder.completed.len(), 3);
    let (relation_id, members) = &recorder.completed[2];
    assert_eq!(*relation_id, 2);
    assert_eq!(members, &vec![Some(8), Some(9)]);
}
