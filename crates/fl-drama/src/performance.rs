//! Command phrases and matching of free player text.
//!
//! A [`Command`] declares phrase templates such as `"pick up a {obj.name}"`
//! and the [`Domain`] each placeholder parameter ranges over. Expansion
//! substitutes every combination of parameter values into every phrase,
//! giving concrete lower-case phrases that map back to an [`Invocation`].
//! Player text is tokenized the same way and matched to the closest phrase.

use std::collections::{BTreeMap, BTreeSet};

use fl_core::format::{format, resolve};
use fl_core::{Entity, EntityId, StateKind, StateValue};
use serde_json::{Map, Value, json};
use strsim::normalized_levenshtein;

use crate::config::PerformanceConfig;

/// Concrete phrases mapped to the invocations they trigger.
pub type Options = BTreeMap<String, Vec<Invocation>>;

/// The values a command parameter ranges over.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// One value per display string of every member of a state kind.
    States(StateKind),
    /// Every ensemble entity carrying a type tag.
    Typed(String),
    /// Every ensemble entity.
    Entities,
    /// Whatever a path like `world.statewise[Spot.inventory]` resolves to
    /// in the drama's own view. A list yields one value per item.
    Path(String),
    /// A fixed list of values.
    Values(Vec<Value>),
    /// The union of several domains, in order.
    Any(Vec<Domain>),
}

/// A parameter value bound by a matched phrase.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// An ensemble entity.
    Entity(EntityId),
    /// A state member.
    State(StateValue),
    /// Any other value.
    Value(Value),
}

/// A command handler to run, with its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    /// Name of the command.
    pub command: String,
    /// The player's text, once matched.
    pub text: String,
    /// Bound parameters by name.
    pub kwargs: BTreeMap<String, Binding>,
}

impl Invocation {
    /// The entity bound to a parameter.
    pub fn entity(&self, name: &str) -> Option<EntityId> {
        match self.kwargs.get(name)? {
            Binding::Entity(id) => Some(*id),
            _ => None,
        }
    }

    /// The state bound to a parameter.
    pub fn state(&self, name: &str) -> Option<&StateValue> {
        match self.kwargs.get(name)? {
            Binding::State(value) => Some(value),
            _ => None,
        }
    }

    /// The plain value bound to a parameter.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.kwargs.get(name)? {
            Binding::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// A named command with its phrase templates and parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    /// Name, unique within a drama.
    pub name: String,
    /// Template lines. Each line holds alternatives separated by `|`.
    pub templates: Vec<String>,
    /// Parameters in declaration order.
    pub params: Vec<(String, Domain)>,
}

impl Command {
    /// Create a command with no phrases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a template line.
    pub fn with_template(mut self, line: impl Into<String>) -> Self {
        self.templates.push(line.into());
        self
    }

    /// Declare a parameter. Parameter names should be lower case since
    /// phrases are lower-cased before substitution.
    pub fn with_param(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.params.push((name.into(), domain));
        self
    }

    /// Every phrase alternative, trimmed, empties dropped.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.templates
            .iter()
            .flat_map(|line| line.lines())
            .flat_map(|line| line.split('|'))
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Lower-case words of `text` with filler dropped.
///
/// Trailing `preserver` characters are removed. If `text` ends with the
/// preserver the filler words are kept.
pub fn parse_tokens(text: &str, preserver: char, discard: &[String]) -> Vec<String> {
    let keep_all = text.ends_with(preserver);
    text.trim_end_matches(preserver)
        .to_lowercase()
        .split_whitespace()
        .filter(|t| keep_all || !discard.iter().any(|d| d == t))
        .map(str::to_string)
        .collect()
}

/// Expands commands and matches player text against them.
#[derive(Debug, Clone, Default)]
pub struct Performance {
    config: PerformanceConfig,
    active: BTreeMap<String, BTreeSet<String>>,
}

impl Performance {
    /// Create a matcher.
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            config,
            active: BTreeMap::new(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: PerformanceConfig) {
        self.config = config;
    }

    /// Phrases produced for each command by the most recent [`options`](Self::options).
    pub fn active(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.active
    }

    /// Tokenize text with the configured preserver and filler words.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        parse_tokens(text, self.config.preserver, &self.config.discard)
    }

    /// Every concrete phrase of one command.
    ///
    /// A parameter combination that fails to substitute into a phrase is
    /// dropped for that phrase only.
    pub fn expand(
        &self,
        command: &Command,
        ensemble: &[&Entity],
        parent: &Value,
    ) -> Vec<(String, Invocation)> {
        let domains: Vec<Vec<(Binding, Value)>> = command
            .params
            .iter()
            .map(|(_, domain)| unpack(domain, ensemble, parent))
            .collect();

        let mut combinations: Vec<Vec<&(Binding, Value)>> = vec![Vec::new()];
        for domain in &domains {
            combinations = combinations
                .iter()
                .flat_map(|combo| {
                    domain.iter().map(move |item| {
                        let mut next = combo.clone();
                        next.push(item);
                        next
                    })
                })
                .collect();
        }

        let mut rv = Vec::new();
        for phrase in command.phrases() {
            let template = self.tokens(phrase).join(" ");
            for combo in &combinations {
                let mut args = Map::new();
                let mut kwargs = BTreeMap::new();
                for ((name, _), (binding, view)) in command.params.iter().zip(combo) {
                    args.insert(name.clone(), view.clone());
                    kwargs.insert(name.clone(), binding.clone());
                }
                match format(&template, &args) {
                    Ok(text) => rv.push((
                        text.to_lowercase(),
                        Invocation {
                            command: command.name.clone(),
                            text: String::new(),
                            kwargs,
                        },
                    )),
                    Err(e) => {
                        tracing::debug!(command = %command.name, phrase = %phrase, error = %e, "combination dropped");
                    }
                }
            }
        }
        rv
    }

    /// Expand every command against the ensemble.
    ///
    /// Call once per turn: the ensemble and its states change between turns.
    pub fn options<'a>(
        &mut self,
        commands: impl IntoIterator<Item = &'a Command>,
        ensemble: &[&Entity],
        parent: &Value,
    ) -> Options {
        let mut rv = Options::new();
        for command in commands {
            let expanded = self.expand(command, ensemble, parent);
            let phrases = self.active.entry(command.name.clone()).or_default();
            phrases.clear();
            for (phrase, invocation) in expanded {
                phrases.insert(phrase.clone());
                rv.entry(phrase).or_default().push(invocation);
            }
        }
        rv
    }

    /// The closest phrase to `text` at or above the cutoff.
    ///
    /// Among equally close phrases the last in sort order wins.
    pub fn closest<'a>(&self, text: &str, options: &'a Options) -> Option<&'a str> {
        options
            .keys()
            .map(|phrase| (phrase, normalized_levenshtein(text, phrase)))
            .filter(|(_, score)| *score >= self.config.cutoff)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(phrase, _)| phrase.as_str())
    }

    /// Invocations matching player text. Empty if nothing matched.
    ///
    /// The filtered tokens are tried first, then the raw trimmed text.
    pub fn resolve(&self, text: &str, options: &Options) -> Vec<Invocation> {
        let joined = self.tokens(text).join(" ");
        let phrase = self
            .closest(&joined, options)
            .or_else(|| self.closest(text.trim(), options));
        let Some(phrase) = phrase else {
            return Vec::new();
        };
        options
            .get(phrase)
            .into_iter()
            .flatten()
            .map(|invocation| Invocation {
                text: text.to_string(),
                ..invocation.clone()
            })
            .collect()
    }
}

fn state_view(value: &StateValue, text: &str) -> Value {
    match value {
        StateValue::Int(n) => json!({"name": n.to_string(), "value": text, "values": [text]}),
        StateValue::Member(m) => json!({
            "name": m.name,
            "value": text,
            "values": m.values,
            "category": m.category.as_str(),
            "ordinal": m.ordinal,
        }),
    }
}

fn unpack(domain: &Domain, ensemble: &[&Entity], parent: &Value) -> Vec<(Binding, Value)> {
    let entity = |e: &Entity| (Binding::Entity(e.uid), e.to_value(e.label()));
    match domain {
        Domain::States(kind) => kind
            .values()
            .flat_map(|value| {
                let texts = value
                    .as_member()
                    .map(|m| m.values.clone())
                    .unwrap_or_default();
                texts.into_iter().map(move |text| {
                    let view = state_view(&value, &text);
                    (Binding::State(value.clone()), view)
                })
            })
            .collect(),
        Domain::Typed(tag) => ensemble
            .iter()
            .filter(|e| e.is_a(tag))
            .map(|e| entity(*e))
            .collect(),
        Domain::Entities => ensemble.iter().map(|e| entity(*e)).collect(),
        Domain::Path(path) => match resolve(parent, path) {
            Ok(Value::Array(items)) => items.iter().map(|v| bind(v, ensemble)).collect(),
            Ok(value) => vec![bind(value, ensemble)],
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "unresolved parameter domain");
                Vec::new()
            }
        },
        Domain::Values(values) => values
            .iter()
            .map(|v| (Binding::Value(v.clone()), v.clone()))
            .collect(),
        Domain::Any(domains) => domains
            .iter()
            .flat_map(|d| unpack(d, ensemble, parent))
            .collect(),
    }
}

fn bind(value: &Value, ensemble: &[&Entity]) -> (Binding, Value) {
    let found = value
        .get("uid")
        .and_then(Value::as_str)
        .and_then(|uid| ensemble.iter().find(|e| e.uid.0.to_string() == uid));
    match found {
        Some(e) => (Binding::Entity(e.uid), value.clone()),
        None => (Binding::Value(value.clone()), value.clone()),
    }
}
