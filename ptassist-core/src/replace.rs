//! Geometry replacement planning
//!
//! Turns "every membership of `old`" into "the same membership of `new`" as an
//! [`EditSet`]: one full relation copy per affected parent, never one per occurrence.

use log::debug;
use ptassist_common::{Error, Result};

use crate::edit::{EditSet, RelationEdit};
use crate::membership::MembershipIndex;
use crate::primitives::{Member, PrimitiveRef};
use crate::store::GraphStore;

/// Plan substituting `new` for `old` in every relation referencing `old`.
///
/// Each occurrence keeps its position and takes `role`. Other members and member
/// order are untouched. No references yields an empty set. The store is only read.
pub fn plan_replacement<S: GraphStore + ?Sized>(
    store: &S,
    old: PrimitiveRef,
    new: PrimitiveRef,
    role: &str,
) -> Result<EditSet> {
    let mut edits = EditSet::new(format!("Replace membership of {old} with {new}"));
    let grouped = MembershipIndex::new(store).grouped_references_of(old);

    for (parent, references) in grouped {
        let original = store
            .relation(parent)
            .ok_or_else(|| Error::PrimitiveNotFound(PrimitiveRef::relation(parent).to_string()))?;
        let mut replacement = original.clone();
        for reference in &references {
            if !replacement.set_member(reference.position, Member::new(role, new)) {
                return Err(Error::StaleSnapshot { relation: parent });
            }
        }
        debug!(
            "Relation {parent}: {} occurrence(s) of {old} become {new} as '{role}'",
            references.len()
        );
        edits.push(RelationEdit {
            old: original.clone(),
            new: replacement,
        });
    }

    Ok(edits)
}
