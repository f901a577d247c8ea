//! Compass points, transits, and the map of named spots.
//!
//! A [`Map`] is declared from a table of spot names to display aliases.
//! From that table it derives four state kinds, `Spot`, `Into`, `Exit` and
//! `Home`, which transits and other entities use as states. The kinds are
//! immutable and shared between copies of a map.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::CoreResult;
use crate::state::{Category, State, StateKind, StateValue};

/// The eight points of the compass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Compass {
    /// North.
    N,
    /// Northeast.
    NE,
    /// East.
    E,
    /// Southeast.
    SE,
    /// South.
    S,
    /// Southwest.
    SW,
    /// West.
    W,
    /// Northwest.
    NW,
}

impl Compass {
    /// Unit step as `(x, y)` with north along +y.
    pub fn vector(self) -> (i32, i32) {
        match self {
            Self::N => (0, 1),
            Self::NE => (1, 1),
            Self::E => (1, 0),
            Self::SE => (1, -1),
            Self::S => (0, -1),
            Self::SW => (-1, -1),
            Self::W => (-1, 0),
            Self::NW => (-1, 1),
        }
    }

    /// The opposite point.
    pub fn back(self) -> Self {
        match self {
            Self::N => Self::S,
            Self::NE => Self::SW,
            Self::E => Self::W,
            Self::SE => Self::NW,
            Self::S => Self::N,
            Self::SW => Self::NE,
            Self::W => Self::E,
            Self::NW => Self::SE,
        }
    }

    /// Degrees clockwise from north, in `[0, 360)`.
    pub fn bearing(self) -> f64 {
        Self::bearing_of(&[self])
    }

    /// Bearing of the end of a sequence of steps, measured from its start.
    pub fn bearing_of(steps: &[Compass]) -> f64 {
        let (x, y) = steps.iter().fold((0, 0), |(x, y), step| {
            let (dx, dy) = step.vector();
            (x + dx, y + dy)
        });
        let phase = f64::from(y).atan2(f64::from(x)).to_degrees();
        let rv = if phase <= 90.0 {
            90.0 - phase
        } else {
            450.0 - phase
        };
        // Snap away float noise so exact points land on exact bearings.
        let rv = (rv * 1e9).round() / 1e9;
        let rv = if rv >= 360.0 { rv - 360.0 } else { rv };
        rv + 0.0
    }

    /// Parse a point from its short name or any display value.
    pub fn parse(text: &str) -> Option<Self> {
        Self::kind()
            .lookup(text)
            .and_then(|v| Self::from_value(&v))
    }
}

impl State for Compass {
    const CATEGORY: &'static str = "Compass";
    const ALL: &'static [Self] = &[
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::N => "N",
            Self::NE => "NE",
            Self::E => "E",
            Self::SE => "SE",
            Self::S => "S",
            Self::SW => "SW",
            Self::W => "W",
            Self::NW => "NW",
        }
    }

    fn values(self) -> &'static [&'static str] {
        match self {
            Self::N => &["North"],
            Self::NE => &["Northeast", "North East"],
            Self::E => &["East"],
            Self::SE => &["Southeast", "South East"],
            Self::S => &["South"],
            Self::SW => &["Southwest", "South West"],
            Self::W => &["West"],
            Self::NW => &["Northwest", "North West"],
        }
    }
}

impl From<Compass> for StateValue {
    fn from(c: Compass) -> Self {
        Self::Member(c.member())
    }
}

impl fmt::Display for Compass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.values()[0])
    }
}

/// Which way traffic may pass through a transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traffic {
    /// No traffic.
    Blocked,
    /// Exit to into only.
    Forward,
    /// Into to exit only.
    Reverse,
    /// Both ways.
    Flowing,
}

impl State for Traffic {
    const CATEGORY: &'static str = "Traffic";
    const ALL: &'static [Self] = &[Self::Blocked, Self::Forward, Self::Reverse, Self::Flowing];

    fn name(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Forward => "forward",
            Self::Reverse => "reverse",
            Self::Flowing => "flowing",
        }
    }

    fn values(self) -> &'static [&'static str] {
        match self {
            Self::Blocked => &["No traffic"],
            Self::Forward => &["Traffic flow forward"],
            Self::Reverse => &["Traffic flow reversed"],
            Self::Flowing => &["Traffic flows freely"],
        }
    }
}

impl From<Traffic> for StateValue {
    fn from(t: Traffic) -> Self {
        Self::Member(t.member())
    }
}

/// A connection between two spots: a door, a path, a staircase.
///
/// Its `Exit` and `Into` states name the spots it joins. A transit without
/// a `Traffic` state carries no traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transit(pub Entity);

impl Default for Transit {
    fn default() -> Self {
        Self::new()
    }
}

impl Transit {
    /// Create an anonymous transit.
    pub fn new() -> Self {
        Self(Entity::new().with_type("Transit"))
    }

    /// Create a named transit.
    pub fn named(name: impl Into<String>) -> Self {
        Self(Entity::named(name).with_type("Transit"))
    }

    /// Set a state value.
    pub fn with_state(mut self, value: impl Into<StateValue>) -> Self {
        self.0.set_state(value);
        self
    }

    /// The underlying entity.
    pub fn entity(&self) -> &Entity {
        &self.0
    }

    /// The spot this transit leaves from.
    pub fn origin(&self) -> Option<&StateValue> {
        self.0.get_state("Exit")
    }

    /// The spot this transit leads into.
    pub fn destination(&self) -> Option<&StateValue> {
        self.0.get_state("Into")
    }

    /// Heading from origin to destination, if known.
    pub fn compass(&self) -> Option<Compass> {
        self.0.get::<Compass>()
    }

    /// Current traffic mode.
    pub fn traffic(&self) -> Option<Traffic> {
        self.0.get::<Traffic>()
    }
}

/// How a move out of a spot is labelled: a compass point when the transit
/// has one, otherwise an index unique among the options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Heading {
    /// A compass heading.
    Compass(Compass),
    /// A positional label.
    Index(usize),
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compass(c) => write!(f, "{c}"),
            Self::Index(n) => write!(f, "{n}"),
        }
    }
}

/// One directed arc of the map's topology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Passage<'a> {
    /// Name of the spot the arc leaves.
    pub from: &'a str,
    /// Heading of the arc, if known.
    pub compass: Option<Compass>,
    /// The transit carrying the arc.
    pub transit: &'a Transit,
    /// Name of the spot the arc reaches.
    pub to: &'a str,
}

/// A graph of named spots joined by transits.
#[derive(Debug, Clone)]
pub struct Map {
    /// Absolute positions, e.g. `Spot.kitchen`.
    pub spot: Arc<StateKind>,
    /// Motion towards a position.
    pub into: Arc<StateKind>,
    /// Motion away from a position.
    pub exit: Arc<StateKind>,
    /// Affinity to a position.
    pub home: Arc<StateKind>,
    transits: Vec<Transit>,
    routes: HashMap<(Category, String, String), Vec<StateValue>>,
}

impl Map {
    /// Declare a map from spot names and their display aliases.
    pub fn new<N, V>(spots: impl IntoIterator<Item = (N, Vec<V>)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let spots: Vec<(String, Vec<String>)> = spots
            .into_iter()
            .map(|(n, v)| (n.into(), v.into_iter().map(Into::into).collect()))
            .collect();
        let kind = |category: &str| Arc::new(StateKind::new(category, spots.clone()));
        Self {
            spot: kind("Spot"),
            into: kind("Into"),
            exit: kind("Exit"),
            home: kind("Home"),
            transits: Vec::new(),
            routes: HashMap::new(),
        }
    }

    /// Populate the transits by running `build` against the declared spots.
    pub fn make<F>(mut self, build: F) -> CoreResult<Self>
    where
        F: FnOnce(&Map) -> CoreResult<Vec<Transit>>,
    {
        self.transits = build(&self)?;
        self.routes.clear();
        Ok(self)
    }

    /// Add one transit.
    pub fn add_transit(&mut self, transit: Transit) {
        self.transits.push(transit);
        self.routes.clear();
    }

    /// All transits in build order.
    pub fn transits(&self) -> &[Transit] {
        &self.transits
    }

    /// Mutable access to the transits. Forgets memoized routes.
    pub fn transits_mut(&mut self) -> &mut Vec<Transit> {
        self.routes.clear();
        &mut self.transits
    }

    /// Every permitted directed arc, honoring each transit's traffic.
    pub fn topology(&self) -> Vec<Passage<'_>> {
        let mut rv = Vec::new();
        for transit in &self.transits {
            let (Some(exit), Some(into)) = (transit.origin(), transit.destination()) else {
                continue;
            };
            let (Some(exit), Some(into)) = (exit.as_member(), into.as_member()) else {
                continue;
            };
            let compass = transit.compass();
            let traffic = transit.traffic();
            if matches!(traffic, Some(Traffic::Flowing | Traffic::Forward)) {
                rv.push(Passage {
                    from: &exit.name,
                    compass,
                    transit,
                    to: &into.name,
                });
            }
            if matches!(traffic, Some(Traffic::Flowing | Traffic::Reverse)) {
                rv.push(Passage {
                    from: &into.name,
                    compass: compass.map(Compass::back),
                    transit,
                    to: &exit.name,
                });
            }
        }
        rv
    }

    /// Permitted moves out of `spot`: heading, destination (as a `Spot`), transit.
    pub fn options(&self, spot: &StateValue) -> Vec<(Heading, StateValue, &Transit)> {
        let name = spot.name();
        let mut rv = Vec::new();
        for (n, passage) in self.topology().into_iter().enumerate() {
            if passage.from != name {
                continue;
            }
            let Some(dest) = self.spot.get(passage.to) else {
                continue;
            };
            let heading = passage.compass.map_or(Heading::Index(n), Heading::Compass);
            rv.push((heading, dest, passage.transit));
        }
        rv
    }

    /// Shortest route between two spots, endpoints included.
    ///
    /// Results are expressed in the kind of `start` and memoized per kind
    /// and pair of spot names. An empty route means the spots are not connected.
    pub fn route(&mut self, start: &StateValue, end: &StateValue) -> Vec<StateValue> {
        let key = (start.category(), start.name(), end.name());
        if let Some(rv) = self.routes.get(&key) {
            return rv.clone();
        }

        let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for passage in self.topology() {
            let next = graph.entry(passage.from).or_default();
            if !next.contains(&passage.to) {
                next.push(passage.to);
            }
        }

        let (from, to) = (key.1.as_str(), key.2.as_str());
        let mut visited: HashMap<&str, Option<&str>> = HashMap::new();
        let mut queue = VecDeque::new();
        visited.insert(from, None);
        queue.push_back(from);

        let mut names: Vec<String> = Vec::new();
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut node = to;
                names.push(node.to_string());
                while let Some(&Some(prev)) = visited.get(node) {
                    names.push(prev.to_string());
                    node = prev;
                }
                names.reverse();
                break;
            }
            for &neighbor in graph.get(current).into_iter().flatten() {
                if !visited.contains_key(neighbor) {
                    visited.insert(neighbor, Some(current));
                    queue.push_back(neighbor);
                }
            }
        }

        let kind = self.kind_of(start);
        let rv: Vec<StateValue> = names.iter().filter_map(|n| kind.get(n)).collect();
        self.routes.insert(key, rv.clone());
        rv
    }

    fn kind_of(&self, value: &StateValue) -> Arc<StateKind> {
        let category = value.category();
        [&self.spot, &self.into, &self.exit, &self.home]
            .into_iter()
            .find(|k| *k.category() == category)
            .unwrap_or(&self.spot)
            .clone()
    }
}
