//! State values: integer counters and named members of declared state kinds.
//!
//! An entity holds at most one current value per [`Category`]. Integer
//! values all share the `int` category; every other value is a [`Member`]
//! of some [`StateKind`], which names its own category explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a family of mutually exclusive states, e.g. `Compass` or `Spot`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category(pub String);

impl Category {
    /// The category shared by all plain integer states.
    pub const INT: &'static str = "int";

    /// Create a category from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The integer category.
    pub fn int() -> Self {
        Self(Self::INT.to_string())
    }

    /// The category name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the integer category.
    pub fn is_int(&self) -> bool {
        self.0 == Self::INT
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One named member of a state kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// The category this member belongs to.
    pub category: Category,
    /// The member name, e.g. `pub_bar`.
    pub name: String,
    /// Position within the declaring kind.
    pub ordinal: usize,
    /// Display strings for the member. Never empty.
    pub values: Vec<String>,
}

/// A current state value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// A plain integer, stored under the `int` category.
    Int(i64),
    /// A member of a declared state kind.
    Member(Member),
}

impl StateValue {
    /// The category this value is stored under.
    pub fn category(&self) -> Category {
        match self {
            Self::Int(_) => Category::int(),
            Self::Member(m) => m.category.clone(),
        }
    }

    /// The bare name: the member name, or the integer as text.
    pub fn name(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Member(m) => m.name.clone(),
        }
    }

    /// The integer, if this is an integer state.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Member(_) => None,
        }
    }

    /// The member, if this is a named state.
    pub fn as_member(&self) -> Option<&Member> {
        match self {
            Self::Int(_) => None,
            Self::Member(m) => Some(m),
        }
    }

    /// Test this value against one accepted value from a role specification.
    ///
    /// Integers match exactly. Members match their own name, a qualified
    /// `Category.name`, or a hierarchical prefix: `pub` accepts `pub_bar`.
    pub fn matches(&self, accepted: &str) -> bool {
        let accepted = accepted.trim();
        match self {
            Self::Int(n) => accepted.parse::<i64>().is_ok_and(|v| v == *n),
            Self::Member(m) => {
                let name = match accepted.split_once('.') {
                    Some((category, name)) if category == m.category.as_str() => name,
                    Some(_) => return false,
                    None => accepted,
                };
                m.name == name
                    || m.name
                        .strip_prefix(name)
                        .is_some_and(|rest| rest.starts_with('_'))
            }
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Member(m) => write!(f, "{}.{}", m.category, m.name),
        }
    }
}

impl From<i64> for StateValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for StateValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<Member> for StateValue {
    fn from(m: Member) -> Self {
        Self::Member(m)
    }
}

/// An ordered set of members forming one state category.
///
/// Kinds are immutable once built and are safe to share between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateKind {
    category: Category,
    members: Vec<Member>,
}

impl StateKind {
    /// Declare a kind from `(name, display values)` pairs.
    pub fn new<N, V>(category: &str, members: impl IntoIterator<Item = (N, Vec<V>)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let category = Category::new(category);
        let members = members
            .into_iter()
            .enumerate()
            .map(|(ordinal, (name, values))| {
                let name = name.into();
                let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
                if values.is_empty() {
                    values.push(name.clone());
                }
                Member {
                    category: category.clone(),
                    name,
                    ordinal,
                    values,
                }
            })
            .collect();
        Self { category, members }
    }

    /// Declare a kind whose members display as their own names.
    pub fn from_names<N: Into<String>>(category: &str, names: impl IntoIterator<Item = N>) -> Self {
        Self::new(category, names.into_iter().map(|n| (n, Vec::<String>::new())))
    }

    /// The category of every member.
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// All members in declaration order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the kind declares no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The member with exactly this name.
    pub fn get(&self, name: &str) -> Option<StateValue> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .map(StateValue::Member)
    }

    /// The member whose name or any display value matches, ignoring case.
    pub fn lookup(&self, text: &str) -> Option<StateValue> {
        let text = text.trim().to_lowercase();
        self.members
            .iter()
            .find(|m| {
                m.name.to_lowercase() == text || m.values.iter().any(|v| v.to_lowercase() == text)
            })
            .cloned()
            .map(StateValue::Member)
    }

    /// Every member as a state value.
    pub fn values(&self) -> impl Iterator<Item = StateValue> + '_ {
        self.members.iter().cloned().map(StateValue::Member)
    }
}

/// A Rust enum usable as a state kind.
pub trait State: Copy + PartialEq + 'static {
    /// The category name.
    const CATEGORY: &'static str;
    /// Every member in declaration order.
    const ALL: &'static [Self];

    /// The member name.
    fn name(self) -> &'static str;

    /// Display strings; defaults to the member name.
    fn values(self) -> &'static [&'static str] {
        &[]
    }

    /// This member as a generic [`Member`].
    fn member(self) -> Member {
        let mut values: Vec<String> = self.values().iter().map(|v| v.to_string()).collect();
        if values.is_empty() {
            values.push(self.name().to_string());
        }
        Member {
            category: Category::new(Self::CATEGORY),
            name: self.name().to_string(),
            ordinal: Self::ALL.iter().position(|s| *s == self).unwrap_or(0),
            values,
        }
    }

    /// The whole enum as a [`StateKind`].
    fn kind() -> StateKind {
        StateKind {
            category: Category::new(Self::CATEGORY),
            members: Self::ALL.iter().map(|s| s.member()).collect(),
        }
    }

    /// Recover the enum member from a stored value of this category.
    fn from_value(value: &StateValue) -> Option<Self> {
        let member = value.as_member()?;
        if member.category.as_str() != Self::CATEGORY {
            return None;
        }
        Self::ALL.iter().copied().find(|s| s.name() == member.name)
    }
}

/// How much detail the player asked for this turn.
///
/// Dramas are reset to [`Detail::None`] at the end of every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    /// The neutral value.
    #[default]
    None,
    /// A short account was requested.
    Summary,
    /// A full account was requested.
    Full,
}

impl State for Detail {
    const CATEGORY: &'static str = "Detail";
    const ALL: &'static [Self] = &[Self::None, Self::Summary, Self::Full];

    fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Summary => "summary",
            Self::Full => "full",
        }
    }
}

impl From<Detail> for StateValue {
    fn from(d: Detail) -> Self {
        Self::Member(d.member())
    }
}

/// Progress of a drama through its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fruition {
    /// Just begun.
    Inception,
    /// Being worked out.
    Elaboration,
    /// Under way.
    Construction,
    /// Handing over.
    Transition,
    /// Finished successfully.
    Completion,
    /// Open for discussion.
    Discussion,
    /// Failed to deliver.
    Defaulted,
    /// Pulled out.
    Withdrawn,
    /// Called off.
    Cancelled,
}

impl Fruition {
    /// True if a drama in this state has ended.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completion | Self::Defaulted | Self::Withdrawn | Self::Cancelled
        )
    }
}

impl State for Fruition {
    const CATEGORY: &'static str = "Fruition";
    const ALL: &'static [Self] = &[
        Self::Inception,
        Self::Elaboration,
        Self::Construction,
        Self::Transition,
        Self::Completion,
        Self::Discussion,
        Self::Defaulted,
        Self::Withdrawn,
        Self::Cancelled,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Inception => "inception",
            Self::Elaboration => "elaboration",
            Self::Construction => "construction",
            Self::Transition => "transition",
            Self::Completion => "completion",
            Self::Discussion => "discussion",
            Self::Defaulted => "defaulted",
            Self::Withdrawn => "withdrawn",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<Fruition> for StateValue {
    fn from(f: Fruition) -> Self {
        Self::Member(f.member())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> StateKind {
        StateKind::from_names("Location", ["pub", "pub_bar", "pub_carpark", "pub_snug"])
    }

    #[test]
    fn int_values_share_a_category() {
        assert_eq!(StateValue::from(3).category(), Category::int());
        assert_eq!(StateValue::from(3i64).to_string(), "3");
    }

    #[test]
    fn kind_members_keep_order_and_category() {
        let kind = location();
        assert_eq!(kind.len(), 4);
        let bar = kind.get("pub_bar").unwrap();
        assert_eq!(bar.category().as_str(), "Location");
        assert_eq!(bar.as_member().unwrap().ordinal, 1);
        assert_eq!(bar.to_string(), "Location.pub_bar");
    }

    #[test]
    fn lookup_matches_display_values() {
        let kind = StateKind::new("Room", [("hall", vec!["hall", "Hallway"])]);
        assert!(kind.lookup("hallway").is_some());
        assert!(kind.lookup("HALL").is_some());
        assert!(kind.lookup("kitchen").is_none());
    }

    #[test]
    fn matching_accepts_exact_qualified_and_prefix() {
        let bar = location().get("pub_bar").unwrap();
        assert!(bar.matches("pub_bar"));
        assert!(bar.matches("Location.pub_bar"));
        assert!(bar.matches("pub"));
        assert!(!bar.matches("pu"));
        assert!(!bar.matches("Weather.pub_bar"));
        assert!(!bar.matches("pub_snug"));
    }

    #[test]
    fn integers_match_exactly() {
        let one = StateValue::Int(1);
        assert!(one.matches("1"));
        assert!(!one.matches("10"));
        assert!(!one.matches("one"));
    }

    #[test]
    fn enum_states_round_trip_through_values() {
        let value = StateValue::from(Fruition::Withdrawn);
        assert_eq!(Fruition::from_value(&value), Some(Fruition::Withdrawn));
        assert_eq!(Detail::from_value(&value), None);
        assert!(Fruition::Withdrawn.is_terminal());
        assert!(!Fruition::Elaboration.is_terminal());
        assert_eq!(Fruition::kind().len(), 9);
    }
}
