//! Transport mode capability model
//!
//! Each [`TransportMode`] variant answers three questions about graph primitives:
//! may it travel along a way in a direction, is a relation a route for it, and
//! may it turn from one way onto another through a shared node. All answers are
//! pure functions of the tags involved.

use ptassist_common::{suggest_correction, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::primitives::{Node, Relation, Way};
use crate::restrictions::TurnRestrictionIndex;
use crate::tag_lookup::TagLookup;

/// Direction of travel along a way, relative to its node order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Bus,
    Trolleybus,
    Coach,
    Tram,
    LightRail,
    Train,
    Subway,
    Monorail,
    Ferry,
}

/// One-way constraint resolved from tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Oneway {
    No,
    Forward,
    Backward,
}

impl TransportMode {
    pub fn all() -> &'static [TransportMode] {
        &[
            TransportMode::Bus,
            TransportMode::Trolleybus,
            TransportMode::Coach,
            TransportMode::Tram,
            TransportMode::LightRail,
            TransportMode::Train,
            TransportMode::Subway,
            TransportMode::Monorail,
            TransportMode::Ferry,
        ]
    }

    /// The `route=*` value of relations served by this mode; also the mode's tag key.
    pub fn route_value(&self) -> &'static str {
        match self {
            TransportMode::Bus => "bus",
            TransportMode::Trolleybus => "trolleybus",
            TransportMode::Coach => "coach",
            TransportMode::Tram => "tram",
            TransportMode::LightRail => "light_rail",
            TransportMode::Train => "train",
            TransportMode::Subway => "subway",
            TransportMode::Monorail => "monorail",
            TransportMode::Ferry => "ferry",
        }
    }

    pub fn is_road_mode(&self) -> bool {
        matches!(
            self,
            TransportMode::Bus | TransportMode::Trolleybus | TransportMode::Coach
        )
    }

    /// Public service vehicles share the `psv` access and restriction keys.
    pub fn is_psv(&self) -> bool {
        matches!(self, TransportMode::Bus | TransportMode::Trolleybus)
    }

    /// Mode whose route value matches the relation's `route` tag
    pub fn for_relation(relation: &Relation) -> Option<TransportMode> {
        let route = relation.tag("route")?;
        Self::all()
            .iter()
            .copied()
            .find(|mode| mode.route_value() == route)
    }

    /// Convenience for [`can_traverse_way`](Self::can_traverse_way) in [`Direction::Forward`]
    pub fn can_traverse_way_forward(&self, way: &Way) -> bool {
        self.can_traverse_way(way, Direction::Forward)
    }

    /// `true` iff this mode may travel along `way` in `direction`.
    ///
    /// Ways with fewer than two nodes are never traversable.
    pub fn can_traverse_way(&self, way: &Way, direction: Direction) -> bool {
        if way.nodes.len() < 2 {
            return false;
        }

        let tags = TagLookup::new(&way.tags);
        match self {
            TransportMode::Bus | TransportMode::Trolleybus | TransportMode::Coach => {
                self.road_traversable(&tags, direction)
            }
            TransportMode::Ferry => {
                tags.get_str("route") == Some("ferry")
                    && self.oneway_allows(&tags, direction, Oneway::No)
            }
            _ => {
                let on_track = tags
                    .get_str("railway")
                    .is_some_and(|railway| self.rail_values().contains(&railway));
                on_track && self.oneway_allows(&tags, direction, Oneway::No)
            }
        }
    }

    /// `true` iff the relation's `route` tag is this mode's route value.
    pub fn can_be_used_for_relation(&self, relation: &Relation) -> bool {
        relation.tag("route") == Some(self.route_value())
    }

    /// `true` iff this mode may turn from `from` onto `to` through `via`.
    ///
    /// `via` must be a node of both ways, otherwise the turn is illegal. Traversability
    /// of the two ways is not rechecked here.
    pub fn can_turn(
        &self,
        from: &Way,
        via: &Node,
        to: &Way,
        restrictions: &TurnRestrictionIndex,
    ) -> bool {
        if !from.contains_node(via.id) || !to.contains_node(via.id) {
            return false;
        }
        restrictions.is_turn_allowed(*self, from.id, via.id, to.id)
    }

    /// `railway=*` values this mode runs on
    fn rail_values(&self) -> &'static [&'static str] {
        match self {
            TransportMode::Tram => &["tram", "light_rail"],
            TransportMode::LightRail => &["light_rail", "tram"],
            TransportMode::Train => &["rail", "narrow_gauge", "preserved"],
            TransportMode::Subway => &["subway"],
            TransportMode::Monorail => &["monorail"],
            _ => &[],
        }
    }

    /// Access key hierarchy, most specific first
    fn access_keys(&self) -> &'static [&'static str] {
        match self {
            TransportMode::Bus => &["bus", "psv", "motor_vehicle", "vehicle", "access"],
            TransportMode::Trolleybus => {
                &["trolleybus", "psv", "motor_vehicle", "vehicle", "access"]
            }
            TransportMode::Coach => &["coach", "motor_vehicle", "vehicle", "access"],
            _ => &[],
        }
    }

    fn oneway_keys(&self) -> &'static [&'static str] {
        match self {
            TransportMode::Bus => &["oneway:bus", "oneway:psv", "oneway"],
            TransportMode::Trolleybus => &["oneway:trolleybus", "oneway:psv", "oneway"],
            TransportMode::Coach => &["oneway:coach", "oneway"],
            TransportMode::Tram => &["oneway:tram", "oneway"],
            TransportMode::LightRail => &["oneway:light_rail", "oneway"],
            TransportMode::Train => &["oneway:train", "oneway"],
            TransportMode::Subway => &["oneway:subway", "oneway"],
            TransportMode::Monorail => &["oneway:monorail", "oneway"],
            TransportMode::Ferry => &["oneway"],
        }
    }

    fn road_traversable(&self, tags: &TagLookup, direction: Direction) -> bool {
        let Some(highway) = tags.get_str("highway") else {
            return false;
        };

        // Determine base accessibility from the highway class
        let access_default = match highway {
            "motorway" | "motorway_link" | "trunk" | "trunk_link" | "primary"
            | "primary_link" | "secondary" | "secondary_link" | "tertiary"
            | "tertiary_link" | "unclassified" | "residential" | "living_street"
            | "service" | "road" | "busway" => true,

            "bus_guideway" => *self == TransportMode::Bus,

            // Usable only with an explicit permission
            "pedestrian" | "track" => false,

            _ => return false,
        };

        let access = match self.access_value(tags, direction) {
            Some(value) if is_denied(value) => false,
            Some(value) if is_granted(value) => true,
            _ => access_default,
        };
        if !access {
            return false;
        }

        if *self == TransportMode::Trolleybus && !has_trolley_wire(tags, direction) {
            return false;
        }

        let implied = if matches!(tags.get_str("junction"), Some("roundabout") | Some("circular"))
            || matches!(highway, "motorway" | "motorway_link")
        {
            Oneway::Forward
        } else {
            Oneway::No
        };

        self.oneway_allows(tags, direction, implied) || self.contraflow_allowed(tags, direction)
    }

    /// Most specific access value, honouring `<key>:forward` / `<key>:backward`
    fn access_value<'a>(&self, tags: &TagLookup<'a>, direction: Direction) -> Option<&'a str> {
        self.access_keys().iter().find_map(|key| {
            tags.get_str(&format!("{key}:{}", direction.suffix()))
                .or_else(|| tags.get_str(key))
        })
    }

    fn oneway_allows(&self, tags: &TagLookup, direction: Direction, implied: Oneway) -> bool {
        let oneway = match tags.first_of(self.oneway_keys()) {
            Some("yes") | Some("1") | Some("true") => Oneway::Forward,
            Some("-1") | Some("reverse") => Oneway::Backward,
            Some(_) => Oneway::No,
            None => implied,
        };

        match oneway {
            Oneway::No => true,
            Oneway::Forward => direction == Direction::Forward,
            Oneway::Backward => direction == Direction::Backward,
        }
    }

    /// Contraflow lanes let buses run against a one-way street.
    fn contraflow_allowed(&self, tags: &TagLookup, direction: Direction) -> bool {
        let specific = if self.is_psv() {
            &self.access_keys()[..2]
        } else {
            &self.access_keys()[..1]
        };
        let granted = specific.iter().any(|key| {
            tags.get_str(&format!("{key}:{}", direction.suffix()))
                .is_some_and(is_granted)
        });
        if granted {
            return true;
        }

        self.is_psv()
            && ["busway", "busway:both", "busway:left", "busway:right"]
                .iter()
                .any(|key| {
                    matches!(
                        tags.get_str(key),
                        Some("opposite_lane") | Some("opposite_track")
                    )
                })
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route_value())
    }
}

impl FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(mode) = Self::all()
            .iter()
            .find(|mode| mode.route_value().eq_ignore_ascii_case(s.trim()))
        {
            return Ok(*mode);
        }

        let names: Vec<&str> = Self::all().iter().map(|m| m.route_value()).collect();
        Err(Error::UnknownMode {
            name: s.to_string(),
            suggestion: suggest_correction(s.trim(), &names),
        })
    }
}

/// Helper: check if access is denied
fn is_denied(value: &str) -> bool {
    matches!(value, "no" | "private" | "agricultural" | "forestry")
}

fn is_granted(value: &str) -> bool {
    matches!(
        value,
        "yes" | "designated" | "permissive" | "destination" | "official"
    )
}

fn has_trolley_wire(tags: &TagLookup, direction: Direction) -> bool {
    tags.get_str(&format!("trolley_wire:{}", direction.suffix()))
        .or_else(|| tags.get_str("trolley_wire"))
        == Some("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn road(tags: &[(&str, &str)]) -> Way {
        tags.iter()
            .fold(Way::new(1, vec![1, 2, 3]), |w, (k, v)| w.with_tag(k, v))
    }

    fn both(mode: TransportMode, way: &Way) -> (bool, bool) {
        (
            mode.can_traverse_way(way, Direction::Forward),
            mode.can_traverse_way(way, Direction::Backward),
        )
    }

    #[test]
    fn test_bus_on_plain_road() {
        let way = road(&[("highway", "residential")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, true));
        assert!(TransportMode::Bus.can_traverse_way_forward(&way));
    }

    #[test]
    fn test_short_ways_never_traversable() {
        let single = Way::new(1, vec![7]).with_tag("highway", "primary");
        let empty = Way::new(2, vec![]).with_tag("railway", "tram");
        for mode in TransportMode::all() {
            assert_eq!(both(*mode, &single), (false, false));
            assert_eq!(both(*mode, &empty), (false, false));
        }
    }

    #[test]
    fn test_oneway_restricts_exactly_one_direction() {
        let way = road(&[("highway", "primary"), ("oneway", "yes")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, false));

        let way = road(&[("highway", "primary"), ("oneway", "-1")]);
        assert_eq!(both(TransportMode::Coach, &way), (false, true));
    }

    #[test]
    fn test_mode_specific_oneway_wins() {
        let way = road(&[("highway", "primary"), ("oneway", "yes"), ("oneway:bus", "no")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, true));
        assert_eq!(both(TransportMode::Coach, &way), (true, false));

        let way = road(&[("highway", "primary"), ("oneway", "yes"), ("oneway:psv", "no")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, true));
    }

    #[test]
    fn test_roundabout_and_motorway_are_implied_oneway() {
        let way = road(&[("highway", "primary"), ("junction", "roundabout")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, false));

        let way = road(&[("highway", "motorway")]);
        assert_eq!(both(TransportMode::Coach, &way), (true, false));

        let way = road(&[("highway", "motorway"), ("oneway", "no")]);
        assert_eq!(both(TransportMode::Coach, &way), (true, true));
    }

    #[test]
    fn test_contraflow_bus_lane() {
        let way = road(&[
            ("highway", "secondary"),
            ("oneway", "yes"),
            ("busway:left", "opposite_lane"),
        ]);
        assert_eq!(both(TransportMode::Bus, &way), (true, true));
        assert_eq!(both(TransportMode::Coach, &way), (true, false));

        let way = road(&[
            ("highway", "secondary"),
            ("oneway", "yes"),
            ("psv:backward", "designated"),
        ]);
        assert_eq!(both(TransportMode::Bus, &way), (true, true));
    }

    #[test]
    fn test_access_hierarchy() {
        let way = road(&[("highway", "pedestrian")]);
        assert_eq!(both(TransportMode::Bus, &way), (false, false));

        let way = road(&[("highway", "pedestrian"), ("bus", "yes")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, true));

        let way = road(&[("highway", "primary"), ("motor_vehicle", "no"), ("psv", "yes")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, true));
        assert_eq!(both(TransportMode::Coach, &way), (false, false));

        let way = road(&[("highway", "service"), ("access", "private")]);
        assert_eq!(both(TransportMode::Bus, &way), (false, false));

        let way = road(&[("highway", "footway")]);
        assert_eq!(both(TransportMode::Bus, &way), (false, false));
    }

    #[test]
    fn test_directional_access() {
        let way = road(&[("highway", "primary"), ("bus:backward", "no")]);
        assert_eq!(both(TransportMode::Bus, &way), (true, false));
    }

    #[test]
    fn test_bus_guideway_only_for_buses() {
        let way = road(&[("highway", "bus_guideway")]);
        assert!(TransportMode::Bus.can_traverse_way_forward(&way));
        assert!(!TransportMode::Coach.can_traverse_way_forward(&way));
    }

    #[test]
    fn test_trolleybus_needs_wire() {
        let bare = road(&[("highway", "primary")]);
        assert_eq!(both(TransportMode::Trolleybus, &bare), (false, false));

        let wired = road(&[("highway", "primary"), ("trolley_wire", "yes")]);
        assert_eq!(both(TransportMode::Trolleybus, &wired), (true, true));

        let one_side = road(&[
            ("highway", "primary"),
            ("trolley_wire", "no"),
            ("trolley_wire:forward", "yes"),
        ]);
        assert_eq!(both(TransportMode::Trolleybus, &one_side), (true, false));
    }

    #[test]
    fn test_rail_modes() {
        let tram = road(&[("railway", "tram")]);
        assert_eq!(both(TransportMode::Tram, &tram), (true, true));
        assert_eq!(both(TransportMode::LightRail, &tram), (true, true));
        assert_eq!(both(TransportMode::Train, &tram), (false, false));
        assert_eq!(both(TransportMode::Bus, &tram), (false, false));

        let rail = road(&[("railway", "rail"), ("oneway", "yes")]);
        assert_eq!(both(TransportMode::Train, &rail), (true, false));
        assert_eq!(both(TransportMode::Subway, &rail), (false, false));

        let abandoned = road(&[("railway", "abandoned")]);
        assert_eq!(both(TransportMode::Train, &abandoned), (false, false));
    }

    #[test]
    fn test_ferry() {
        let ferry = road(&[("route", "ferry")]);
        assert_eq!(both(TransportMode::Ferry, &ferry), (true, true));
        assert_eq!(both(TransportMode::Bus, &ferry), (false, false));
    }

    #[test]
    fn test_relation_fit() {
        let tram_route = Relation::new(1)
            .with_tag("type", "route")
            .with_tag("route", "tram");
        assert!(TransportMode::Tram.can_be_used_for_relation(&tram_route));
        assert!(!TransportMode::Bus.can_be_used_for_relation(&tram_route));
        assert_eq!(TransportMode::for_relation(&tram_route), Some(TransportMode::Tram));

        let untagged = Relation::new(2);
        for mode in TransportMode::all() {
            assert!(!mode.can_be_used_for_relation(&untagged));
        }
        assert_eq!(TransportMode::for_relation(&untagged), None);
    }

    #[test]
    fn test_turn_requires_shared_via() {
        let from = Way::new(1, vec![1, 2]);
        let to = Way::new(2, vec![2, 3]);
        let elsewhere = Way::new(3, vec![5, 6]);
        let restrictions = TurnRestrictionIndex::default();

        assert!(TransportMode::Bus.can_turn(&from, &Node::new(2), &to, &restrictions));
        assert!(!TransportMode::Bus.can_turn(&from, &Node::new(3), &to, &restrictions));
        assert!(!TransportMode::Bus.can_turn(&from, &Node::new(2), &elsewhere, &restrictions));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("tram".parse::<TransportMode>().unwrap(), TransportMode::Tram);
        assert_eq!("Light_Rail".parse::<TransportMode>().unwrap(), TransportMode::LightRail);
        assert_eq!(TransportMode::Subway.to_string(), "subway");

        match "tarm".parse::<TransportMode>() {
            Err(Error::UnknownMode { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("tram"))
            }
            other => panic!("expected UnknownMode, got {other:?}"),
        }
    }
}
