//! Route traversal validator
//!
//! Walks the path members of a route relation in order and checks, per boundary,
//! that consecutive ways connect, that the mode may travel each way in the
//! direction the walk enters it, and that the turn between them is legal.
//!
//! [`RouteTraversal`] is a lazy iterator of [`Finding`]s. It never mutates the
//! relation, can be restarted, and stops early when its [`CancellationToken`] fires.

use log::{debug, info};
use ptassist_common::{Error, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

use crate::cancel::CancellationToken;
use crate::config::{SeedPolicy, ValidatorConfig};
use crate::mode::{Direction, TransportMode};
use crate::primitives::{MemberKind, Node, PrimitiveRef, Relation, Way};
use crate::restrictions::TurnRestrictionIndex;
use crate::store::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// The way does not connect to the previous one
    Gap,
    /// Turning from the previous way onto this one is not allowed
    IllegalTurn,
    /// The mode may not travel this way in the walked direction
    ModeIncompatibleWay,
    /// The relation is not a route of this mode
    ModeIncompatibleRelation,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FindingKind::Gap => "gap",
            FindingKind::IllegalTurn => "illegal turn",
            FindingKind::ModeIncompatibleWay => "way not usable by mode",
            FindingKind::ModeIncompatibleRelation => "relation not usable by mode",
        })
    }
}

/// A located issue. `position` is the member index in the relation; relation-level
/// findings use position 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub relation: i64,
    pub position: usize,
    pub kind: FindingKind,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relation {} member {}: {}",
            self.relation, self.position, self.kind
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraversalSummary {
    /// Path ways resolved and walked
    pub ways: usize,
    pub gaps: usize,
    pub illegal_turns: usize,
    pub incompatible_ways: usize,
    pub incompatible_relation: bool,
}

impl TraversalSummary {
    fn record(&mut self, kind: FindingKind) {
        match kind {
            FindingKind::Gap => self.gaps += 1,
            FindingKind::IllegalTurn => self.illegal_turns += 1,
            FindingKind::ModeIncompatibleWay => self.incompatible_ways += 1,
            FindingKind::ModeIncompatibleRelation => self.incompatible_relation = true,
        }
    }

    pub fn findings(&self) -> usize {
        self.gaps
            + self.illegal_turns
            + self.incompatible_ways
            + usize::from(self.incompatible_relation)
    }

    pub fn is_clean(&self) -> bool {
        self.findings() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    OnWay {
        way: i64,
        /// Node the walk leaves the current way through
        endpoint: i64,
        traversable: bool,
    },
    Done,
}

/// Lazy finding iterator over one relation for one mode
pub struct RouteTraversal<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    restrictions: &'a TurnRestrictionIndex,
    config: &'a ValidatorConfig,
    cancel: CancellationToken,
    relation: &'a Relation,
    mode: TransportMode,
    /// (member position, way id) of every path member
    path: Vec<(usize, i64)>,
    cursor: usize,
    state: State,
    relation_checked: bool,
    pending: VecDeque<Finding>,
    summary: TraversalSummary,
    cancelled: bool,
}

impl<'a, S: GraphStore + ?Sized> RouteTraversal<'a, S> {
    pub fn new(
        store: &'a S,
        restrictions: &'a TurnRestrictionIndex,
        config: &'a ValidatorConfig,
        relation: &'a Relation,
        mode: TransportMode,
        cancel: CancellationToken,
    ) -> Self {
        let path = relation
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.kind == MemberKind::Way && config.is_path_role(&m.role))
            .map(|(position, m)| (position, m.ref_id))
            .collect();

        Self {
            store,
            restrictions,
            config,
            cancel,
            relation,
            mode,
            path,
            cursor: 0,
            state: State::Start,
            relation_checked: false,
            pending: VecDeque::new(),
            summary: TraversalSummary::default(),
            cancelled: false,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Counts for the findings produced so far
    pub fn summary(&self) -> TraversalSummary {
        self.summary
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done && self.pending.is_empty()
    }

    /// Rewind to the first member, discarding the summary
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.state = State::Start;
        self.relation_checked = false;
        self.pending.clear();
        self.summary = TraversalSummary::default();
        self.cancelled = false;
    }

    fn emit(&mut self, position: usize, kind: FindingKind) {
        self.summary.record(kind);
        self.pending.push_back(Finding {
            relation: self.relation.id,
            position,
            kind,
        });
    }

    /// Advance by one path member
    fn step(&mut self) {
        if !self.relation_checked {
            self.relation_checked = true;
            if !self.mode.can_be_used_for_relation(self.relation) {
                self.emit(0, FindingKind::ModeIncompatibleRelation);
                self.state = State::Done;
                return;
            }
        }

        if self.cursor >= self.path.len() {
            self.state = State::Done;
            return;
        }
        if self.cancel.is_cancelled() {
            info!(
                "Traversal of relation {} cancelled at member {}",
                self.relation.id, self.path[self.cursor].0
            );
            self.cancelled = true;
            self.state = State::Done;
            return;
        }

        let (position, way_id) = self.path[self.cursor];
        self.cursor += 1;

        let store = self.store;
        let Some(way) = store.way(way_id) else {
            debug!(
                "Relation {}: {} not loaded, restarting after member {position}",
                self.relation.id,
                PrimitiveRef::way(way_id)
            );
            self.state = State::Start;
            return;
        };
        self.summary.ways += 1;

        match self.state {
            State::OnWay {
                way: previous,
                endpoint,
                traversable,
            } => match entry_direction(way, endpoint) {
                Some(direction) => {
                    self.continue_onto(position, previous, endpoint, traversable, way, direction)
                }
                None => {
                    self.emit(position, FindingKind::Gap);
                    self.seed(position, way);
                }
            },
            State::Start | State::Done => self.seed(position, way),
        }
    }

    fn continue_onto(
        &mut self,
        position: usize,
        previous: i64,
        via: i64,
        previous_traversable: bool,
        way: &Way,
        direction: Direction,
    ) {
        let traversable = self.mode.can_traverse_way(way, direction);
        if !traversable {
            self.emit(position, FindingKind::ModeIncompatibleWay);
        } else if previous_traversable {
            let store = self.store;
            if let Some(from) = store.way(previous) {
                let fallback;
                let via_node = match store.node(via) {
                    Some(node) => node,
                    None => {
                        fallback = Node::new(via);
                        &fallback
                    }
                };
                if !self.mode.can_turn(from, via_node, way, self.restrictions) {
                    self.emit(position, FindingKind::IllegalTurn);
                }
            }
        }
        self.enter(way, direction, traversable);
    }

    /// Start afresh on `way` after a gap or at the beginning of the route
    fn seed(&mut self, position: usize, way: &Way) {
        let direction = match self.config.seed_policy {
            SeedPolicy::Forward => Direction::Forward,
            SeedPolicy::LookAhead => self.look_ahead(way).unwrap_or_else(|| {
                if !self.mode.can_traverse_way(way, Direction::Forward)
                    && self.mode.can_traverse_way(way, Direction::Backward)
                {
                    Direction::Backward
                } else {
                    Direction::Forward
                }
            }),
        };

        let traversable = self.mode.can_traverse_way(way, direction);
        if !traversable {
            self.emit(position, FindingKind::ModeIncompatibleWay);
        }
        self.enter(way, direction, traversable);
    }

    /// Direction of `way` whose exit touches the next resolvable path way
    fn look_ahead(&self, way: &Way) -> Option<Direction> {
        let next = self.path[self.cursor..]
            .iter()
            .find_map(|&(_, id)| self.store.way(id))?;
        let touches = |node: Option<i64>| {
            node.is_some() && (node == next.first_node() || node == next.last_node())
        };
        if touches(way.last_node()) {
            Some(Direction::Forward)
        } else if touches(way.first_node()) {
            Some(Direction::Backward)
        } else {
            None
        }
    }

    fn enter(&mut self, way: &Way, direction: Direction, traversable: bool) {
        let exit = match direction {
            Direction::Forward => way.last_node(),
            Direction::Backward => way.first_node(),
        };
        self.state = match exit {
            Some(endpoint) => State::OnWay {
                way: way.id,
                endpoint,
                traversable,
            },
            None => State::Start,
        };
    }
}

/// Direction in which a way is entered through `node`, if `node` is one of its ends
fn entry_direction(way: &Way, node: i64) -> Option<Direction> {
    if way.first_node() == Some(node) {
        Some(Direction::Forward)
    } else if way.last_node() == Some(node) {
        Some(Direction::Backward)
    } else {
        None
    }
}

impl<S: GraphStore + ?Sized> Iterator for RouteTraversal<'_, S> {
    type Item = Finding;

    fn next(&mut self) -> Option<Finding> {
        loop {
            if let Some(finding) = self.pending.pop_front() {
                return Some(finding);
            }
            if self.state == State::Done {
                return None;
            }
            self.step();
        }
    }
}

/// Outcome of validating one relation
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub relation: i64,
    pub mode: TransportMode,
    pub findings: Vec<Finding>,
    pub summary: TraversalSummary,
    /// The walk stopped before the last member
    pub cancelled: bool,
}

/// Validates route relations of a store
pub struct RouteValidator<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    restrictions: TurnRestrictionIndex,
    config: ValidatorConfig,
    cancel: CancellationToken,
}

impl<'a, S: GraphStore + ?Sized> RouteValidator<'a, S> {
    /// Build a validator, indexing the store's turn restrictions
    pub fn new(store: &'a S) -> Self {
        let restrictions = TurnRestrictionIndex::from_store(store);
        info!("Loaded {} turn restrictions", restrictions.len());
        Self {
            store,
            restrictions,
            config: ValidatorConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn restrictions(&self) -> &TurnRestrictionIndex {
        &self.restrictions
    }

    pub fn traverse<'s>(
        &'s self,
        relation: &'s Relation,
        mode: TransportMode,
    ) -> RouteTraversal<'s, S> {
        RouteTraversal::new(
            self.store,
            &self.restrictions,
            &self.config,
            relation,
            mode,
            self.cancel.clone(),
        )
    }

    /// Validate one relation. Without an explicit mode the relation's `route` tag decides.
    pub fn validate(&self, relation_id: i64, mode: Option<TransportMode>) -> Result<RouteReport> {
        let relation = self.store.relation(relation_id).ok_or_else(|| {
            Error::PrimitiveNotFound(PrimitiveRef::relation(relation_id).to_string())
        })?;

        let mode = match mode {
            Some(mode) => mode,
            None => match relation.tag("route") {
                Some(route) => route.parse::<TransportMode>()?,
                None => {
                    return Err(Error::InvalidInput(format!(
                        "relation {relation_id} has no route tag, a transport mode is required"
                    )))
                }
            },
        };

        let mut traversal = self.traverse(relation, mode);
        let findings: Vec<Finding> = traversal.by_ref().collect();
        debug!(
            "Relation {relation_id} ({mode}): {} finding(s) over {} way(s)",
            findings.len(),
            traversal.summary().ways
        );

        Ok(RouteReport {
            relation: relation_id,
            mode,
            summary: traversal.summary(),
            cancelled: traversal.is_cancelled(),
            findings,
        })
    }

    /// Relations whose `route` tag names a known transport mode, in id order
    pub fn route_relations(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .store
            .relations()
            .filter(|r| TransportMode::for_relation(r).is_some())
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl<S: GraphStore + Sync + ?Sized> RouteValidator<'_, S> {
    /// Validate independent relations in parallel; results keep the input order
    pub fn validate_all(
        &self,
        relation_ids: &[i64],
        mode: Option<TransportMode>,
    ) -> Vec<Result<RouteReport>> {
        relation_ids
            .par_iter()
            .map(|&id| self.validate(id, mode))
            .collect()
    }
}
