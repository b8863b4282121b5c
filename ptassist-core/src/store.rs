//! Read surface of the graph store
//!
//! The store owns every primitive. This crate only reads through [`GraphStore`];
//! mutation happens through [`Transaction`](crate::dataset::Transaction).

use crate::primitives::{MemberKind, Node, PrimitiveRef, Relation, Way};

pub trait GraphStore {
    fn node(&self, id: i64) -> Option<&Node>;

    fn way(&self, id: i64) -> Option<&Way>;

    fn relation(&self, id: i64) -> Option<&Relation>;

    /// Every relation currently in the store
    fn relations(&self) -> Box<dyn Iterator<Item = &Relation> + '_>;

    /// Ids of the relations referencing `primitive`, if the store maintains a
    /// back-reference index. `None` means callers must scan [`relations`](Self::relations).
    fn referrers(&self, _primitive: PrimitiveRef) -> Option<Vec<i64>> {
        None
    }

    fn contains(&self, primitive: PrimitiveRef) -> bool {
        match primitive.kind {
            MemberKind::Node => self.node(primitive.id).is_some(),
            MemberKind::Way => self.way(primitive.id).is_some(),
            MemberKind::Relation => self.relation(primitive.id).is_some(),
        }
    }
}
