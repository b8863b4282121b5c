//! Relation membership lookup: which relations reference a primitive, where, and with which role

use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::primitives::{PrimitiveRef, Relation};
use crate::store::GraphStore;

/// One occurrence of a child primitive inside a parent relation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RelationToChildReference {
    pub parent: i64,
    pub position: usize,
    pub role: String,
    pub child: PrimitiveRef,
}

/// Read-only membership queries over a [`GraphStore`]
///
/// Uses the store's back-reference capability when it has one and scans every
/// relation otherwise. Both paths yield the same references.
pub struct MembershipIndex<'a, S: GraphStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> MembershipIndex<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Every `(parent, position)` where the member refers to `child`, ordered by
    /// parent id then position. Repeated occurrences are separate entries.
    pub fn references_of(&self, child: PrimitiveRef) -> Vec<RelationToChildReference> {
        let mut references = Vec::new();
        match self.store.referrers(child) {
            Some(parents) => {
                for parent in parents {
                    match self.store.relation(parent) {
                        Some(relation) => collect(relation, child, &mut references),
                        None => debug!("Back-reference to missing relation {parent} ignored"),
                    }
                }
            }
            None => {
                debug!("No back-reference index, scanning relations for {child}");
                for relation in self.store.relations() {
                    collect(relation, child, &mut references);
                }
            }
        }
        references.sort();
        references.dedup();
        references
    }

    /// [`references_of`](Self::references_of) grouped by parent relation
    pub fn grouped_references_of(
        &self,
        child: PrimitiveRef,
    ) -> BTreeMap<i64, Vec<RelationToChildReference>> {
        let mut grouped: BTreeMap<i64, Vec<RelationToChildReference>> = BTreeMap::new();
        for reference in self.references_of(child) {
            grouped.entry(reference.parent).or_default().push(reference);
        }
        grouped
    }
}

fn collect(
    relation: &Relation,
    child: PrimitiveRef,
    out: &mut Vec<RelationToChildReference>,
) {
    out.extend(
        relation
            .members
            .iter()
            .enumerate()
            .filter(|(_, member)| member.refers_to(child))
            .map(|(position, member)| RelationToChildReference {
                parent: relation.id,
                position,
                role: member.role.clone(),
                child,
            }),
    );
}
