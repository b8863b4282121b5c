//! Membership replacement, transactions and the tools built on them

use ptassist_common::Error;
use ptassist_core::{
    plan_platform_transfer, plan_replacement, CancellationToken, Dataset, Fix, FixTask,
    GraphStore, Member, MembershipIndex, Node, PrimitiveRef, Relation, StopKind, Tags, Way,
};

const OLD: PrimitiveRef = PrimitiveRef::node(1);
const NEW: PrimitiveRef = PrimitiveRef::node(2);

fn route_dataset() -> Dataset {
    let mut ds = Dataset::new();
    ds.add_node(
        Node::new(1)
            .with_tag("public_transport", "stop_position")
            .with_tag("highway", "bus_stop")
            .with_tag("name", "Gare du Midi"),
    );
    ds.add_node(Node::new(2));
    ds.add_node(Node::new(3));
    ds.add_way(Way::new(10, vec![1, 3]).with_tag("highway", "primary"));
    ds.add_relation(
        Relation::new(100)
            .with_tag("type", "route")
            .with_tag("route", "bus")
            .with_member("", PrimitiveRef::way(10))
            .with_member("", PrimitiveRef::way(11))
            .with_member("stop", OLD)
            .with_member("", PrimitiveRef::way(12))
            .with_member("platform", PrimitiveRef::node(3))
            .with_member("stop_exit_only", OLD)
            .with_member("", PrimitiveRef::way(13)),
    );
    ds.add_relation(
        Relation::new(200)
            .with_tag("route", "bus")
            .with_member("stop", OLD)
            .with_member("", PrimitiveRef::way(10)),
    );
    ds.add_relation(Relation::new(300).with_member("", PrimitiveRef::way(10)));
    ds
}

#[test]
fn every_occurrence_rewritten_in_one_edit() {
    let ds = route_dataset();
    let edits = plan_replacement(&ds, OLD, NEW, "platform").unwrap();

    assert_eq!(edits.relation_ids(), vec![100, 200]);
    let edit = edits.iter().next().unwrap();
    assert_eq!(edit.relation_id(), 100);
    assert_eq!(edit.changed_positions(), vec![2, 5]);
    assert_eq!(edit.new.members[2], Member::new("platform", NEW));
    assert_eq!(edit.new.members[5], Member::new("platform", NEW));
    for position in [0, 1, 3, 4, 6] {
        assert_eq!(edit.new.members[position], edit.old.members[position]);
    }
    assert_eq!(edit.new.tags, edit.old.tags);
}

#[test]
fn unreferenced_primitive_plans_nothing() {
    let ds = route_dataset();
    let before = ds.node(3).cloned();
    let edits = plan_replacement(&ds, PrimitiveRef::node(99), NEW, "platform").unwrap();
    assert!(edits.is_empty());
    assert_eq!(ds.node(3).cloned(), before);
}

#[test]
fn replanning_is_deterministic() {
    let ds = route_dataset();
    let first = plan_replacement(&ds, OLD, NEW, "platform").unwrap();
    let second = plan_replacement(&ds, OLD, NEW, "platform").unwrap();
    assert_eq!(first, second);
}

#[test]
fn scan_fallback_plans_the_same_edits() {
    let indexed = route_dataset();
    let scanned = route_dataset().without_back_references();
    assert_eq!(
        plan_replacement(&indexed, OLD, NEW, "platform").unwrap(),
        plan_replacement(&scanned, OLD, NEW, "platform").unwrap()
    );
}

#[test]
fn reverse_plan_restores_single_role_membership() {
    let mut ds = route_dataset();
    let original = ds.relation(200).cloned();

    let forward = plan_replacement(&ds, OLD, NEW, "platform").unwrap();
    let mut tx = ds.begin();
    tx.apply_edit_set(&forward).unwrap();
    tx.commit();
    assert!(MembershipIndex::new(&ds).references_of(OLD).is_empty());

    let backward = plan_replacement(&ds, NEW, OLD, "stop").unwrap();
    let mut tx = ds.begin();
    tx.apply_edit_set(&backward).unwrap();
    tx.commit();
    assert_eq!(ds.relation(200).cloned(), original);
}

#[test]
fn inverse_restores_every_role() {
    let mut ds = route_dataset();
    let before: Vec<Relation> = ds.relations().cloned().collect();

    let edits = plan_replacement(&ds, OLD, NEW, "platform").unwrap();
    let mut tx = ds.begin();
    tx.apply_edit_set(&edits).unwrap();
    tx.commit();

    let mut tx = ds.begin();
    tx.apply_edit_set(&edits.inverse()).unwrap();
    assert_eq!(tx.commit(), 2);

    let after: Vec<Relation> = ds.relations().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(
        MembershipIndex::new(&ds).references_of(OLD).len(),
        3,
        "back-references follow the undo"
    );
}

#[test]
fn stale_plan_is_rejected_whole() {
    let mut ds = route_dataset();
    let edits = plan_replacement(&ds, OLD, NEW, "platform").unwrap();

    let mut tags = Tags::new();
    tags.insert("route".into(), "bus".into());
    tags.insert("ref".into(), "49".into());
    let mut tx = ds.begin();
    tx.set_tags(PrimitiveRef::relation(200), tags).unwrap();
    tx.commit();

    let untouched = ds.relation(100).cloned();
    let mut tx = ds.begin();
    let err = tx.apply_edit_set(&edits).unwrap_err();
    assert!(matches!(err, Error::StaleSnapshot { relation: 200 }));
    assert!(err.is_recoverable());
    drop(tx);
    assert_eq!(ds.relation(100).cloned(), untouched);

    let replanned = plan_replacement(&ds, OLD, NEW, "platform").unwrap();
    let mut tx = ds.begin();
    tx.apply_edit_set(&replanned).unwrap();
    tx.commit();
    assert_eq!(ds.relation(200).unwrap().tag("ref"), Some("49"));
}

#[test]
fn platform_transfer_commits_together() {
    let mut ds = route_dataset();
    let transfer = plan_platform_transfer(&ds, 1, 2, "platform").unwrap();
    assert_eq!(transfer.kind, StopKind::Highway);
    assert_eq!(transfer.memberships.len(), 2);

    let mut tx = ds.begin();
    transfer.apply(&mut tx).unwrap();
    tx.commit();

    let platform = ds.node(2).unwrap();
    assert_eq!(platform.tag("highway"), Some("bus_stop"));
    assert_eq!(platform.tag("bus"), Some("yes"));
    assert_eq!(platform.tag("public_transport"), Some("platform"));
    assert_eq!(platform.tag("name"), Some("Gare du Midi"));
    assert!(ds.node(1).unwrap().tags.is_empty());
    assert_eq!(MembershipIndex::new(&ds).references_of(NEW).len(), 3);
}

#[test]
fn platform_transfer_rolls_back_when_dropped() {
    let mut ds = route_dataset();
    let stop_before = ds.node(1).cloned();
    let transfer = plan_platform_transfer(&ds, 1, 2, "platform").unwrap();
    {
        let mut tx = ds.begin();
        transfer.apply(&mut tx).unwrap();
    }
    assert_eq!(ds.node(1).cloned(), stop_before);
    assert!(ds.node(2).unwrap().tags.is_empty());
    assert_eq!(MembershipIndex::new(&ds).references_of(OLD).len(), 3);
}

#[test]
fn railway_stop_becomes_tram_platform() {
    let mut ds = Dataset::new();
    ds.add_node(
        Node::new(1)
            .with_tag("public_transport", "stop_position")
            .with_tag("railway", "stop"),
    );
    ds.add_node(Node::new(2));
    let transfer = plan_platform_transfer(&ds, 1, 2, "platform").unwrap();
    assert_eq!(transfer.kind, StopKind::Railway);
    assert_eq!(transfer.platform_tags.get("railway").map(String::as_str), Some("tram_stop"));
    assert_eq!(transfer.platform_tags.get("tram").map(String::as_str), Some("yes"));
    assert!(transfer.memberships.is_empty());
}

#[test]
fn platform_transfer_preconditions() {
    let ds = route_dataset();
    assert!(matches!(
        plan_platform_transfer(&ds, 3, 2, "platform"),
        Err(Error::NotAStopPosition(3))
    ));
    assert!(matches!(
        plan_platform_transfer(&ds, 1, 42, "platform"),
        Err(Error::PrimitiveNotFound(_))
    ));
    assert!(matches!(
        plan_platform_transfer(&ds, 1, 1, "platform"),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn conflicting_fixes_roll_back_the_batch() {
    let mut ds = route_dataset();
    let before: Vec<Relation> = ds.relations().cloned().collect();

    // both planned from the same snapshot of relation 100
    let task: FixTask = [
        Fix::new("stop to node 2", plan_replacement(&ds, OLD, NEW, "platform").unwrap()),
        Fix::new(
            "platform 3 to node 2",
            plan_replacement(&ds, PrimitiveRef::node(3), NEW, "platform").unwrap(),
        ),
    ]
    .into_iter()
    .collect();

    let err = task
        .run(&mut ds, &CancellationToken::new(), |_, _, _| {})
        .unwrap_err();
    assert!(matches!(err, Error::StaleSnapshot { relation: 100 }));

    let after: Vec<Relation> = ds.relations().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(ds.revision(), 0);
}

#[test]
fn cancelled_fix_task_leaves_dataset_untouched() {
    let mut ds = route_dataset();
    let before: Vec<Relation> = ds.relations().cloned().collect();
    let task: FixTask = [
        Fix::new("first", plan_replacement(&ds, OLD, NEW, "platform").unwrap()),
        Fix::new(
            "second",
            plan_replacement(&ds, PrimitiveRef::way(10), PrimitiveRef::way(20), "").unwrap(),
        ),
    ]
    .into_iter()
    .collect();

    let token = CancellationToken::new();
    let err = task
        .run(&mut ds, &token, |done, _, _| {
            if done == 0 {
                token.cancel();
            }
        })
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    let after: Vec<Relation> = ds.relations().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn deferred_fixes_replan_against_batch_state() {
    let mut ds = route_dataset();
    let task: FixTask = [
        Fix::replacement(OLD, NEW, "platform"),
        Fix::replacement(PrimitiveRef::node(3), PrimitiveRef::node(4), "platform"),
    ]
    .into_iter()
    .collect();

    let outcome = task
        .run(&mut ds, &CancellationToken::new(), |_, _, _| {})
        .unwrap();
    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.relations_changed, 3);

    let route = ds.relation(100).unwrap();
    assert_eq!(route.members[2], Member::new("platform", NEW));
    assert_eq!(route.members[4], Member::new("platform", PrimitiveRef::node(4)));
    assert_eq!(route.members[5], Member::new("platform", NEW));
    assert!(MembershipIndex::new(&ds).references_of(OLD).is_empty());
}
