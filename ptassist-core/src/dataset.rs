//! In-memory dataset implementing [`GraphStore`]
//!
//! Keeps an incrementally maintained back-reference map (primitive -> referencing
//! relations) unless disabled, and hands out scoped [`Transaction`]s for all
//! mutation. A transaction that is dropped without [`Transaction::commit`] restores
//! every primitive it touched.

use log::{info, warn};
use ptassist_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::edit::EditSet;
use crate::primitives::{MemberKind, Node, PrimitiveRef, Relation, Tags, Way};
use crate::store::GraphStore;

/// On-disk JSON layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    ways: Vec<Way>,
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    nodes: BTreeMap<i64, Node>,
    ways: BTreeMap<i64, Way>,
    relations: BTreeMap<i64, Relation>,
    back_refs: Option<HashMap<PrimitiveRef, BTreeSet<i64>>>,
    revision: u64,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            ways: BTreeMap::new(),
            relations: BTreeMap::new(),
            back_refs: Some(HashMap::new()),
            revision: 0,
        }
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the back-reference map; membership lookups fall back to full scans.
    pub fn without_back_references(mut self) -> Self {
        self.back_refs = None;
        self
    }

    pub fn has_back_references(&self) -> bool {
        self.back_refs.is_some()
    }

    /// Incremented by every commit that changed something
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn add_way(&mut self, way: Way) {
        self.ways.insert(way.id, way);
    }

    pub fn add_relation(&mut self, relation: Relation) {
        self.put_relation(relation);
    }

    fn put_relation(&mut self, relation: Relation) -> Option<Relation> {
        if let Some(back_refs) = self.back_refs.as_mut() {
            if let Some(previous) = self.relations.get(&relation.id) {
                unindex(back_refs, previous);
            }
            for member in &relation.members {
                back_refs
                    .entry(member.primitive())
                    .or_default()
                    .insert(relation.id);
            }
        }
        self.relations.insert(relation.id, relation)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: DatasetFile =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Self::from_file(file))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_file())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Read a dataset from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let file: DatasetFile = serde_json::from_reader(reader).map_err(|e| {
            Error::Serialization(format!("{}: {e}", path.as_ref().display()))
        })?;
        let dataset = Self::from_file(file);
        info!(
            "Loaded {} nodes, {} ways, {} relations from {}",
            dataset.node_count(),
            dataset.way_count(),
            dataset.relation_count(),
            path.as_ref().display()
        );
        Ok(dataset)
    }

    /// Write the dataset to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, &self.to_file())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    fn from_file(file: DatasetFile) -> Self {
        let mut dataset = Self::new();
        file.nodes.into_iter().for_each(|n| dataset.add_node(n));
        file.ways.into_iter().for_each(|w| dataset.add_way(w));
        file.relations.into_iter().for_each(|r| dataset.add_relation(r));
        dataset
    }

    fn to_file(&self) -> DatasetFile {
        DatasetFile {
            nodes: self.nodes.values().cloned().collect(),
            ways: self.ways.values().cloned().collect(),
            relations: self.relations.values().cloned().collect(),
        }
    }

    /// Open a scoped transaction; see [`Transaction`]
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction {
            dataset: self,
            undo: Vec::new(),
            committed: false,
        }
    }
}

fn unindex(back_refs: &mut HashMap<PrimitiveRef, BTreeSet<i64>>, relation: &Relation) {
    for member in &relation.members {
        let key = member.primitive();
        if let Some(parents) = back_refs.get_mut(&key) {
            parents.remove(&relation.id);
            if parents.is_empty() {
                back_refs.remove(&key);
            }
        }
    }
}

impl GraphStore for Dataset {
    fn node(&self, id: i64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn way(&self, id: i64) -> Option<&Way> {
        self.ways.get(&id)
    }

    fn relation(&self, id: i64) -> Option<&Relation> {
        self.relations.get(&id)
    }

    fn relations(&self) -> Box<dyn Iterator<Item = &Relation> + '_> {
        Box::new(self.relations.values())
    }

    fn referrers(&self, primitive: PrimitiveRef) -> Option<Vec<i64>> {
        self.back_refs.as_ref().map(|back_refs| {
            back_refs
                .get(&primitive)
                .map(|parents| parents.iter().copied().collect())
                .unwrap_or_default()
        })
    }
}

/// Previous value of a primitive touched by a transaction
#[derive(Debug)]
enum Undo {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

/// Scoped batch of changes against a [`Dataset`]
///
/// Either every change made through the transaction becomes visible on
/// [`commit`](Self::commit), or none does: dropping it uncommitted, including on
/// `?` early returns and cancellation, rolls everything back.
#[derive(Debug)]
pub struct Transaction<'a> {
    dataset: &'a mut Dataset,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    /// Read access to the dataset including this transaction's uncommitted changes
    pub fn dataset(&self) -> &Dataset {
        self.dataset
    }

    /// Apply every relation edit, or none of them.
    ///
    /// Fails with [`Error::StaleSnapshot`] when a target relation no longer equals
    /// the snapshot the edit was planned against.
    pub fn apply_edit_set(&mut self, edits: &EditSet) -> Result<()> {
        let mut targets = HashSet::new();
        for edit in edits {
            let id = edit.relation_id();
            if edit.new.id != id {
                return Err(Error::InvalidInput(format!(
                    "edit for relation {id} would replace it with relation {}",
                    edit.new.id
                )));
            }
            if !targets.insert(id) {
                return Err(Error::InvalidInput(format!(
                    "edit set '{}' targets relation {id} more than once",
                    edits.label
                )));
            }
            if self.dataset.relations.get(&id) != Some(&edit.old) {
                warn!("Relation {id} changed since '{}' was planned", edits.label);
                return Err(Error::StaleSnapshot { relation: id });
            }
        }

        for edit in edits {
            if let Some(previous) = self.dataset.put_relation(edit.new.clone()) {
                self.undo.push(Undo::Relation(previous));
            }
        }
        Ok(())
    }

    /// Replace the complete tag set of a primitive
    pub fn set_tags(&mut self, primitive: PrimitiveRef, tags: Tags) -> Result<()> {
        let not_found = || Error::PrimitiveNotFound(primitive.to_string());
        match primitive.kind {
            MemberKind::Node => {
                let node = self.dataset.nodes.get_mut(&primitive.id).ok_or_else(not_found)?;
                let previous = std::mem::replace(&mut node.tags, tags);
                self.undo.push(Undo::Node(Node {
                    id: node.id,
                    tags: previous,
                }));
            }
            MemberKind::Way => {
                let way = self.dataset.ways.get_mut(&primitive.id).ok_or_else(not_found)?;
                self.undo.push(Undo::Way(way.clone()));
                way.tags = tags;
            }
            MemberKind::Relation => {
                let mut relation = self
                    .dataset
                    .relations
                    .get(&primitive.id)
                    .cloned()
                    .ok_or_else(not_found)?;
                relation.tags = tags;
                if let Some(previous) = self.dataset.put_relation(relation) {
                    self.undo.push(Undo::Relation(previous));
                }
            }
        }
        Ok(())
    }

    /// Number of primitive changes recorded so far
    pub fn changes(&self) -> usize {
        self.undo.len()
    }

    /// Make all changes visible and return the dataset revision
    pub fn commit(mut self) -> u64 {
        self.committed = true;
        if !self.undo.is_empty() {
            self.dataset.revision += 1;
            info!(
                "Committed {} change(s), dataset revision {}",
                self.undo.len(),
                self.dataset.revision
            );
        }
        self.dataset.revision
    }

    /// Discard all changes
    pub fn rollback(mut self) {
        self.undo_all();
    }

    fn undo_all(&mut self) {
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::Node(node) => {
                    self.dataset.nodes.insert(node.id, node);
                }
                Undo::Way(way) => {
                    self.dataset.ways.insert(way.id, way);
                }
                Undo::Relation(relation) => {
                    self.dataset.put_relation(relation);
                }
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            warn!("Rolling back {} uncommitted change(s)", self.undo.len());
            self.undo_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::RelationEdit;
    use crate::primitives::Member;

    fn sample() -> Dataset {
        let mut ds = Dataset::new();
        ds.add_node(Node::new(1).with_tag("public_transport", "stop_position"));
        ds.add_node(Node::new(2));
        ds.add_way(Way::new(10, vec![1, 2]).with_tag("highway", "primary"));
        ds.add_relation(
            Relation::new(100)
                .with_tag("route", "bus")
                .with_member("stop", PrimitiveRef::node(1))
                .with_member("", PrimitiveRef::way(10)),
        );
        ds
    }

    fn swap_stop(ds: &Dataset) -> EditSet {
        let old = ds.relation(100).unwrap().clone();
        let mut new = old.clone();
        new.set_member(0, Member::new("platform", PrimitiveRef::node(2)));
        let mut set = EditSet::new("swap");
        set.push(RelationEdit { old, new });
        set
    }

    #[test]
    fn test_back_references_follow_edits() {
        let mut ds = sample();
        assert_eq!(ds.referrers(PrimitiveRef::node(1)), Some(vec![100]));
        assert_eq!(ds.referrers(PrimitiveRef::node(2)), Some(vec![]));

        let edits = swap_stop(&ds);
        let mut tx = ds.begin();
        tx.apply_edit_set(&edits).unwrap();
        assert_eq!(tx.commit(), 1);

        assert_eq!(ds.referrers(PrimitiveRef::node(1)), Some(vec![]));
        assert_eq!(ds.referrers(PrimitiveRef::node(2)), Some(vec![100]));
    }

    #[test]
    fn test_drop_rolls_back() {
        let mut ds = sample();
        let before = ds.relation(100).cloned();
        let edits = swap_stop(&ds);
        {
            let mut tx = ds.begin();
            tx.apply_edit_set(&edits).unwrap();
            tx.set_tags(PrimitiveRef::node(1), Tags::new()).unwrap();
            assert_eq!(tx.changes(), 2);
        }
        assert_eq!(ds.relation(100).cloned(), before);
        assert!(ds.node(1).unwrap().has_tag("public_transport"));
        assert_eq!(ds.referrers(PrimitiveRef::node(1)), Some(vec![100]));
        assert_eq!(ds.revision(), 0);
    }

    #[test]
    fn test_stale_snapshot_applies_nothing() {
        let mut ds = sample();
        let edits = swap_stop(&ds);

        let mut tx = ds.begin();
        let mut tags = Tags::new();
        tags.insert("name".into(), "Line 1".into());
        tx.set_tags(PrimitiveRef::relation(100), tags).unwrap();

        let err = tx.apply_edit_set(&edits).unwrap_err();
        assert!(matches!(err, Error::StaleSnapshot { relation: 100 }));
        assert_eq!(tx.changes(), 1);
        tx.rollback();

        assert_eq!(ds.relation(100).unwrap().tag("route"), Some("bus"));
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let mut ds = sample();
        let mut edits = swap_stop(&ds);
        let again = edits.iter().next().unwrap().clone();
        edits.push(again);

        let mut tx = ds.begin();
        assert!(matches!(
            tx.apply_edit_set(&edits),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_set_tags_missing_primitive() {
        let mut ds = sample();
        let mut tx = ds.begin();
        assert!(matches!(
            tx.set_tags(PrimitiveRef::way(999), Tags::new()),
            Err(Error::PrimitiveNotFound(_))
        ));
    }

    #[test]
    fn test_empty_commit_keeps_revision() {
        let mut ds = sample();
        let tx = ds.begin();
        assert_eq!(tx.commit(), 0);
    }

    #[test]
    fn test_json_roundtrip_through_file() {
        let ds = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");

        ds.save(&path).unwrap();
        let loaded = Dataset::load(&path).unwrap();

        assert_eq!(loaded.relation(100), ds.relation(100));
        assert_eq!(loaded.way(10), ds.way(10));
        assert_eq!(loaded.referrers(PrimitiveRef::way(10)), Some(vec![100]));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Dataset::from_json_str("{\"nodes\": 3}"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_scan_fallback_has_no_referrers() {
        let ds = sample().without_back_references();
        assert!(!ds.has_back_references());
        assert_eq!(ds.referrers(PrimitiveRef::node(1)), None);
    }
}
