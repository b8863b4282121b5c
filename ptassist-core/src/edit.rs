//! Edit sets - copy-on-write relation replacements handed to a transaction
//!
//! An [`EditSet`] never touches the store. Each [`RelationEdit`] pairs the snapshot
//! it was planned against with the full replacement value; applying checks the
//! old snapshot against the live relation first.

use serde::{Deserialize, Serialize};

use crate::primitives::Relation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdit {
    pub old: Relation,
    pub new: Relation,
}

impl RelationEdit {
    pub fn relation_id(&self) -> i64 {
        self.old.id
    }

    /// Member positions whose role or reference differs between old and new
    pub fn changed_positions(&self) -> Vec<usize> {
        let len = self.old.members.len().max(self.new.members.len());
        (0..len)
            .filter(|&i| self.old.members.get(i) != self.new.members.get(i))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSet {
    pub label: String,
    edits: Vec<RelationEdit>,
}

impl EditSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            edits: Vec::new(),
        }
    }

    pub fn push(&mut self, edit: RelationEdit) {
        self.edits.push(edit);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RelationEdit> {
        self.edits.iter()
    }

    pub fn relation_ids(&self) -> Vec<i64> {
        self.edits.iter().map(RelationEdit::relation_id).collect()
    }

    /// The edit set that undoes this one
    pub fn inverse(&self) -> EditSet {
        EditSet {
            label: format!("Undo: {}", self.label),
            edits: self
                .edits
                .iter()
                .rev()
                .map(|e| RelationEdit {
                    old: e.new.clone(),
                    new: e.old.clone(),
                })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EditSet {
    type Item = &'a RelationEdit;
    type IntoIter = std::slice::Iter<'a, RelationEdit>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.iter()
    }
}
