//! Graph primitives - nodes, ways, relations and relation members
//!
//! These are passive values owned by a [`GraphStore`](crate::store::GraphStore).
//! Ways reference nodes and relations reference members by id only.

use ptassist_common::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tag mapping; ordered so that snapshots compare and serialize deterministically
pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

impl MemberKind {
    pub fn name(&self) -> &'static str {
        match self {
            MemberKind::Node => "node",
            MemberKind::Way => "way",
            MemberKind::Relation => "relation",
        }
    }
}

/// Typed handle to a primitive in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimitiveRef {
    pub kind: MemberKind,
    pub id: i64,
}

impl PrimitiveRef {
    pub const fn node(id: i64) -> Self {
        Self { kind: MemberKind::Node, id }
    }

    pub const fn way(id: i64) -> Self {
        Self { kind: MemberKind::Way, id }
    }

    pub const fn relation(id: i64) -> Self {
        Self { kind: MemberKind::Relation, id }
    }
}

impl fmt::Display for PrimitiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.name(), self.id)
    }
}

/// Parses `node:12`, `way:7`, `relation:3` or the short forms `n12`, `w7`, `r3`.
impl FromStr for PrimitiveRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind, id),
            None if !s.is_empty() && s.is_char_boundary(1) => s.split_at(1),
            None => ("", s),
        };

        let kind = match kind.to_ascii_lowercase().as_str() {
            "n" | "node" => MemberKind::Node,
            "w" | "way" => MemberKind::Way,
            "r" | "relation" => MemberKind::Relation,
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown primitive kind '{other}' in '{s}' (expected node, way or relation)"
                )))
            }
        };
        let id = id
            .parse::<i64>()
            .map_err(|e| Error::InvalidInput(format!("bad primitive id in '{s}': {e}")))?;

        Ok(Self { kind, id })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(default)]
    pub tags: Tags,
}

impl Node {
    pub fn new(id: i64) -> Self {
        Self { id, tags: Tags::new() }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }
}

/// Ordered node sequence; the stored order is the way's FORWARD direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Way {
    pub id: i64,
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: Tags,
}

impl Way {
    pub fn new(id: i64, nodes: Vec<i64>) -> Self {
        Self {
            id,
            nodes,
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn first_node(&self) -> Option<i64> {
        self.nodes.first().copied()
    }

    pub fn last_node(&self) -> Option<i64> {
        self.nodes.last().copied()
    }

    pub fn contains_node(&self, node_id: i64) -> bool {
        self.nodes.contains(&node_id)
    }

    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.first_node() == self.last_node()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub role: String,
    pub kind: MemberKind,
    #[serde(rename = "ref")]
    pub ref_id: i64,
}

impl Member {
    pub fn new(role: &str, primitive: PrimitiveRef) -> Self {
        Self {
            role: role.to_string(),
            kind: primitive.kind,
            ref_id: primitive.id,
        }
    }

    pub fn primitive(&self) -> PrimitiveRef {
        PrimitiveRef {
            kind: self.kind,
            id: self.ref_id,
        }
    }

    pub fn refers_to(&self, primitive: PrimitiveRef) -> bool {
        self.kind == primitive.kind && self.ref_id == primitive.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub tags: Tags,
}

impl Relation {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            members: Vec::new(),
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_member(mut self, role: &str, primitive: PrimitiveRef) -> Self {
        self.members.push(Member::new(role, primitive));
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Replace the member at `position`. Returns `false` when out of range.
    pub fn set_member(&mut self, position: usize, member: Member) -> bool {
        match self.members.get_mut(position) {
            Some(slot) => {
                *slot = member;
                true
            }
            None => false,
        }
    }
}
