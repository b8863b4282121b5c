//! Turn restriction index
//!
//! Built once from the `type=restriction` relations of a store and queried by the
//! transport modes when deciding whether a turn is legal.
//!
//! ## Turn Rule Types
//!
//! - **Ban** (`no_*`): cannot turn from `from` to `to` at `via`
//! - **Only** (`only_*`): coming from `from` at `via`, `to` is the only permitted exit
//!
//! Only via-node restrictions are indexed. Via-way restrictions and conditional
//! (`restriction:conditional`) rules are skipped.

use log::debug;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::mode::TransportMode;
use crate::primitives::{MemberKind, Relation};
use crate::store::GraphStore;
use crate::tag_lookup::TagLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TurnRuleKind {
    None,
    Ban,
    Only,
}

impl TurnRuleKind {
    fn parse(value: &str) -> Self {
        if value.starts_with("no_") {
            TurnRuleKind::Ban
        } else if value.starts_with("only_") {
            TurnRuleKind::Only
        } else {
            TurnRuleKind::None
        }
    }
}

/// Which vehicles a `restriction*` key targets
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    General,
    Vehicle(String),
}

/// One (from, via, to) triple of a restriction relation
#[derive(Debug, Clone)]
struct RestrictionRule {
    relation: i64,
    to_way: i64,
    kinds: Vec<(Scope, TurnRuleKind)>,
    except: Vec<String>,
}

impl RestrictionRule {
    /// Resolve the rule for `mode`: vehicle-specific keys win over the general one,
    /// and `except=*` only exempts from the general key.
    fn kind_for(&self, mode: TransportMode) -> TurnRuleKind {
        let scoped = |name: &str| {
            self.kinds.iter().find_map(|(scope, kind)| match scope {
                Scope::Vehicle(v) if v == name => Some(*kind),
                _ => None,
            })
        };

        if let Some(kind) = scoped(mode.route_value()) {
            return kind;
        }
        if mode.is_psv() {
            if let Some(kind) = scoped("psv") {
                return kind;
            }
        }

        // General restrictions address road traffic
        if !mode.is_road_mode() || self.is_exempt(mode) {
            return TurnRuleKind::None;
        }
        if let Some(kind) = scoped("motor_vehicle") {
            return kind;
        }

        self.kinds
            .iter()
            .find_map(|(scope, kind)| (*scope == Scope::General).then_some(*kind))
            .unwrap_or(TurnRuleKind::None)
    }

    fn is_exempt(&self, mode: TransportMode) -> bool {
        self.except
            .iter()
            .any(|e| e == mode.route_value() || (mode.is_psv() && e == "psv"))
    }
}

/// Index for fast turn restriction lookups
#[derive(Debug, Clone, Default)]
pub struct TurnRestrictionIndex {
    /// Via nodes that carry at least one restriction
    restricted_nodes: HashSet<i64>,

    /// (via_node, from_way) -> rules
    rules: HashMap<(i64, i64), Vec<RestrictionRule>>,

    relation_count: usize,
}

impl TurnRestrictionIndex {
    /// Scan every relation of the store for turn restrictions
    pub fn from_store<S: GraphStore + ?Sized>(store: &S) -> Self {
        Self::from_relations(store.relations())
    }

    pub fn from_relations<'a>(relations: impl IntoIterator<Item = &'a Relation>) -> Self {
        let mut index = Self::default();
        for relation in relations {
            if relation.tag("type") == Some("restriction") {
                index.insert(relation);
            }
        }
        debug!(
            "Indexed {} turn restrictions at {} via nodes",
            index.relation_count,
            index.restricted_nodes.len()
        );
        index
    }

    fn insert(&mut self, relation: &Relation) {
        let tags = TagLookup::new(&relation.tags);

        let mut kinds = Vec::new();
        for (key, value) in tags.with_prefix("restriction") {
            let scope = match key.strip_prefix("restriction") {
                Some("") => Scope::General,
                Some(rest) => match rest.strip_prefix(':') {
                    Some(vehicle)
                        if !vehicle.is_empty()
                            && !vehicle.contains(':')
                            && vehicle != "conditional" =>
                    {
                        Scope::Vehicle(vehicle.to_string())
                    }
                    _ => continue,
                },
                None => continue,
            };
            kinds.push((scope, TurnRuleKind::parse(value)));
        }
        if kinds.is_empty() {
            debug!("Restriction relation {} has no usable restriction tag", relation.id);
            return;
        }

        let except: Vec<String> = tags
            .get_str("except")
            .map(|e| e.split(';').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let mut from_ways = Vec::new();
        let mut via_nodes = Vec::new();
        let mut to_ways = Vec::new();
        for member in &relation.members {
            match (member.role.as_str(), member.kind) {
                ("from", MemberKind::Way) => from_ways.push(member.ref_id),
                ("to", MemberKind::Way) => to_ways.push(member.ref_id),
                ("via", MemberKind::Node) => via_nodes.push(member.ref_id),
                ("via", MemberKind::Way) => {
                    debug!("Skipping via-way restriction {}", relation.id);
                    return;
                }
                _ => {}
            }
        }

        let via = match via_nodes.as_slice() {
            [via] => *via,
            _ => {
                debug!(
                    "Restriction {} needs exactly one via node, found {}",
                    relation.id,
                    via_nodes.len()
                );
                return;
            }
        };
        if from_ways.is_empty() || to_ways.is_empty() {
            debug!("Restriction {} is missing its from or to way", relation.id);
            return;
        }

        self.restricted_nodes.insert(via);
        for &from in &from_ways {
            let entry = self.rules.entry((via, from)).or_default();
            for &to in &to_ways {
                entry.push(RestrictionRule {
                    relation: relation.id,
                    to_way: to,
                    kinds: kinds.clone(),
                    except: except.clone(),
                });
            }
        }
        self.relation_count += 1;
    }

    /// Number of indexed restriction relations
    pub fn len(&self) -> usize {
        self.relation_count
    }

    pub fn is_empty(&self) -> bool {
        self.relation_count == 0
    }

    /// Check if a node has turn restrictions
    #[inline]
    pub fn is_restricted(&self, via_node: i64) -> bool {
        self.restricted_nodes.contains(&via_node)
    }

    /// Check if a turn is allowed for `mode` at a junction
    ///
    /// Junctions without restriction data are always passable.
    pub fn is_turn_allowed(
        &self,
        mode: TransportMode,
        from_way: i64,
        via_node: i64,
        to_way: i64,
    ) -> bool {
        // Fast path: not a restricted node
        if !self.restricted_nodes.contains(&via_node) {
            return true;
        }
        let Some(rules) = self.rules.get(&(via_node, from_way)) else {
            return true;
        };

        let mut has_only = false;
        let mut only_matches = false;
        for rule in rules {
            match rule.kind_for(mode) {
                TurnRuleKind::Ban if rule.to_way == to_way => {
                    debug!(
                        "Turn {from_way} -> {to_way} at {via_node} banned for {mode} ({})",
                        rule.relation
                    );
                    return false;
                }
                TurnRuleKind::Only => {
                    has_only = true;
                    only_matches |= rule.to_way == to_way;
                }
                _ => {}
            }
        }

        !has_only || only_matches
    }
}
