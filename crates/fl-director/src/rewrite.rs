//! Markup rewriting.
//!
//! The [`Director`] turns rendered cue markup into presentation blocks.
//! For every `<blockquote>` cue it applies, in order: the cast entity's
//! name, query parameters, fragments, mode, directives, paragraph timing,
//! and finally `{ROLE.field}` substitution. Side effects are filed as
//! [`Note`]s under the cue's [`NoteKey`].

use std::collections::HashMap;
use std::sync::LazyLock;

use fl_core::format::format;
use fl_core::markup::{self, escape, escape_attr, strip_tags, unescape};
use fl_core::{Entity, EntityId, Speech, SpeechKind};
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Map;

use crate::casting::{Cast, allows};
use crate::config::{DirectorConfig, ShotPolicy};
use crate::error::{DirectorError, DirectorResult};
use crate::notes::{Directive, Note, NoteKey, Notes};
use crate::scene::Scene;

static BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<blockquote[^>]*>.*?</blockquote>").expect("valid regex"));

static CITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<cite([^>]*)>([^<]*)</cite>").expect("valid regex"));

static DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-([a-z]+)="([^"]*)""#).expect("valid regex"));

static LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:ol|ul)>.*?</(?:ol|ul)>").expect("valid regex"));

static ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<li[^>]*>(.*?)</li>").expect("valid regex"));

static PARA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p>(.*?)</p>").expect("valid regex"));

/// One rendered block of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Position of the source speech or shot within the turn.
    pub ordinal: usize,
    /// Scene path, or `None` for programmatic speech.
    pub path: Option<String>,
    /// The rewritten HTML.
    pub html: String,
}

struct Item {
    path: Option<String>,
    ordinal: usize,
    html: String,
}

/// `(delay, duration)` for paragraphs of the given word counts.
///
/// Each paragraph lasts `dwell` seconds per word. The next one starts after
/// the previous delay, its duration and `pause`.
pub fn timing(words: &[usize], pause: f64, dwell: f64, start: f64) -> Vec<(f64, f64)> {
    let mut delay = start;
    words
        .iter()
        .map(|&w| {
            let duration = dwell * w as f64;
            let rv = (delay, duration);
            delay += pause + duration;
            rv
        })
        .collect()
}

fn parse_query(text: &str) -> Vec<(String, String)> {
    text.trim_start_matches('?')
        .split('&')
        .filter(|p| !p.trim().is_empty())
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (p.trim().to_string(), String::new()),
        })
        .collect()
}

/// Rewrites markup for one story session.
///
/// Pause, dwell and offer are running values: a cue that sets one changes
/// it for every later cue. The accumulated delay restarts at zero with
/// each [`rewrite`](Director::rewrite).
#[derive(Debug, Clone)]
pub struct Director {
    config: DirectorConfig,
    rng: StdRng,
    /// Current pause after each paragraph, seconds.
    pub pause: f64,
    /// Current display time per word, seconds.
    pub dwell: f64,
    /// Current offer value.
    pub offer: f64,
    delay: f64,
    notes: Notes,
    counters: HashMap<NoteKey, usize>,
}

impl Default for Director {
    fn default() -> Self {
        Self::new(DirectorConfig::default())
    }
}

impl Director {
    /// Create a director.
    pub fn new(config: DirectorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            pause: config.pause,
            dwell: config.dwell,
            offer: config.offer,
            delay: 0.0,
            notes: Notes::default(),
            counters: HashMap::new(),
            config,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// Notes gathered since they were last cleared.
    pub fn notes(&self) -> &Notes {
        &self.notes
    }

    /// Discard the notes. Fragment counters are kept.
    pub fn clear_notes(&mut self) {
        self.notes.clear();
    }

    /// The accumulated delay, seconds.
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Produce the blocks of one turn.
    ///
    /// Prologue speech comes first, then programmatic dialogue interleaved
    /// with the scene's allowed shots, then epilogue speech. Shot ordinals
    /// are offset by the amount of speech so ordinals never collide. A shot
    /// that fails to rewrite is dropped along with its notes.
    pub fn rewrite(
        &mut self,
        scene: Option<&Scene>,
        cast: &Cast,
        ensemble: &[&Entity],
        speech: &[Speech],
    ) -> Vec<Block> {
        self.delay = 0.0;

        let mut written = Vec::new();
        if let Some(scene) = scene {
            let path = scene.path_key();
            let limit = match self.config.shots {
                ShotPolicy::All => usize::MAX,
                ShotPolicy::First => 1,
            };
            let shots = scene
                .shots(&self.config.dialogue_key)
                .into_iter()
                .filter(|shot| allows(shot, cast, ensemble))
                .take(limit);
            for shot in shots {
                written.push(Item {
                    path: path.clone(),
                    ordinal: shot.index + speech.len(),
                    html: markup::render(&shot.text),
                });
            }
        }

        let mut items = spoken(speech, SpeechKind::Prologue);
        let mut programmatic = spoken(speech, SpeechKind::Dialogue).into_iter();
        let mut written = written.into_iter();
        loop {
            let (a, b) = (programmatic.next(), written.next());
            if a.is_none() && b.is_none() {
                break;
            }
            items.extend(a);
            items.extend(b);
        }
        items.extend(spoken(speech, SpeechKind::Epilogue));

        let mut blocks = Vec::new();
        for item in items {
            match self.edit(&item.html, cast, ensemble, item.path.as_deref(), item.ordinal) {
                Ok(html) if !html.trim().is_empty() => blocks.push(Block {
                    ordinal: item.ordinal,
                    path: item.path,
                    html,
                }),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, path = ?item.path, shot = item.ordinal, "shot dropped");
                    self.notes.forget_shot(item.path.as_deref(), item.ordinal);
                }
            }
        }
        blocks
    }

    /// Rewrite the cues of one rendered shot.
    pub fn edit(
        &mut self,
        html: &str,
        cast: &Cast,
        ensemble: &[&Entity],
        path: Option<&str>,
        shot: usize,
    ) -> DirectorResult<String> {
        let mut names: Vec<(String, EntityId, String)> = Vec::new();
        let mut args = Map::new();
        for (role, id) in cast.iter() {
            if let Some(entity) = ensemble.iter().find(|e| e.uid == id) {
                let name = entity.name(&mut self.rng).to_string();
                args.insert(role.to_string(), entity.to_value(&name));
                names.push((role.to_string(), id, name));
            }
        }

        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for (cue, m) in BLOCK.find_iter(html).enumerate() {
            out.push_str(&html[last..m.start()]);
            let key = NoteKey::new(path, shot, cue);
            out.push_str(&self.edit_cue(m.as_str(), &key, cast, &names)?);
            last = m.end();
        }
        out.push_str(&html[last..]);
        Ok(format(&out, &args)?)
    }

    fn edit_cue(
        &mut self,
        block: &str,
        key: &NoteKey,
        cast: &Cast,
        names: &[(String, EntityId, String)],
    ) -> DirectorResult<String> {
        let attrs: HashMap<String, String> = CITE
            .captures(block)
            .map(|c| {
                DATA.captures_iter(&c[1])
                    .map(|d| (d[1].to_string(), unescape(&d[2])))
                    .collect()
            })
            .unwrap_or_default();
        let get = |k: &str| attrs.get(k).map_or("", String::as_str);
        let mut block = block.to_string();

        // Cite
        let role = get("role");
        let actor = if role.is_empty() {
            None
        } else {
            let (id, name) = names
                .iter()
                .find(|(r, _, _)| r == role)
                .map(|(_, id, name)| (*id, name.as_str()))
                .ok_or_else(|| DirectorError::Uncast(role.to_string()))?;
            block = CITE
                .replace(&block, |c: &Captures<'_>| {
                    format!(
                        "<cite{} data-entity=\"{}\">{}</cite>",
                        &c[1],
                        escape_attr(name),
                        escape(name)
                    )
                })
                .into_owned();
            Some(id)
        };

        // Parameters
        let params = parse_query(get("parameters"));
        let last = |k: &str| {
            params
                .iter()
                .rev()
                .find(|(p, _)| p == k)
                .map(|(_, v)| v.as_str())
        };
        let every = |k: &str| -> Vec<String> {
            params
                .iter()
                .filter(|(p, _)| p == k)
                .map(|(_, v)| v.clone())
                .collect()
        };
        let number = |k: &str| last(k).and_then(|v| v.parse::<f64>().ok());
        if let Some(v) = number("pause") {
            self.pause = v;
        }
        if let Some(v) = number("dwell") {
            self.dwell = v;
        }
        if let Some(v) = number("delay") {
            self.delay = v;
        }
        if let Some(v) = number("offer") {
            self.offer = v;
            self.notes.push(key, Note::Offer(v));
        }
        let mut extra = String::new();
        if let Some(label) = last("label") {
            let label: String = label
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect();
            if !label.is_empty() {
                extra.push_str(&format!(" id=\"{label}\""));
                self.notes.push(key, Note::Label(label));
            }
        }
        let classes: Vec<String> = every("class")
            .iter()
            .flat_map(|c| c.split_whitespace().map(str::to_string))
            .collect();
        if !classes.is_empty() {
            extra.push_str(&format!(" class=\"{}\"", escape_attr(&classes.join(" "))));
            self.notes.push(key, Note::Classes(classes));
        }
        let style = every("style");
        if !style.is_empty() {
            self.notes.push(key, Note::Style(style));
        }
        let theme = every("theme");
        if !theme.is_empty() {
            self.notes.push(key, Note::Theme(theme));
        }
        if let Some(pos) = block.find('>') {
            block.insert_str(pos, &extra);
        }

        // Fragments
        let fragment = get("fragments").trim_start_matches('#');
        if let Ok(n) = fragment.parse::<usize>() {
            self.notes.push(key, Note::Option(n));
        } else if fragment.ends_with('!') {
            block = self.handle_fragments(&block, key);
        }

        // Mode
        let mut tokens = get("mode").split([':', '/']).filter(|t| !t.is_empty());
        if let Some(mode) = tokens.next() {
            let media = tokens.map(str::to_string).collect();
            self.notes.push(
                key,
                Note::Mode {
                    mode: mode.to_string(),
                    media,
                },
            );
        }

        // Directives
        for token in get("directives").split('.').filter(|t| !t.is_empty()) {
            let (action, roles) = token.split_once('@').unwrap_or((token, ""));
            let targets = roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(|r| cast.get(r).ok_or_else(|| DirectorError::Uncast(r.to_string())))
                .collect::<DirectorResult<Vec<_>>>()?;
            self.notes.push(
                key,
                Note::Directive(Directive {
                    action: action.to_string(),
                    entity: actor,
                    targets,
                }),
            );
        }

        // Timing
        let words: Vec<usize> = PARA
            .captures_iter(&block)
            .map(|c| strip_tags(&c[1]).split_whitespace().count())
            .collect();
        let pause = self.pause;
        let times = timing(&words, pause, self.dwell, self.delay);
        self.delay += times.iter().map(|(_, d)| d + pause).sum::<f64>();
        let mut times = times.into_iter();
        let block = PARA
            .replace_all(&block, |c: &Captures<'_>| {
                let (delay, duration) = times.next().unwrap_or_default();
                format!(
                    "<p style=\"animation-delay: {delay:.2}s; animation-duration: {duration:.2}s\">{}</p>",
                    &c[1]
                )
            })
            .into_owned();
        self.notes.push(
            key,
            Note::Timing {
                pause: self.pause,
                dwell: self.dwell,
                delay: self.delay,
            },
        );
        Ok(block)
    }

    /// Replace an embedded list with one of its items, round robin.
    ///
    /// Successive calls for the same key visit every item once before
    /// repeating. Text without a list is returned unchanged.
    pub fn handle_fragments(&mut self, html: &str, key: &NoteKey) -> String {
        let Some(list) = LIST.find(html) else {
            return html.to_string();
        };
        let items: Vec<&str> = ITEM
            .captures_iter(list.as_str())
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if items.is_empty() {
            return html.to_string();
        }
        let counter = self.counters.entry(key.clone()).or_insert(0);
        let index = *counter % items.len();
        *counter += 1;
        self.notes.push(
            key,
            Note::Pick {
                index,
                count: items.len(),
            },
        );
        format!("{}{}{}", &html[..list.start()], items[index], &html[list.end()..])
    }
}

fn spoken(speech: &[Speech], kind: SpeechKind) -> Vec<Item> {
    speech
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind() == kind)
        .map(|(ordinal, s)| Item {
            path: None,
            ordinal,
            html: s.tags().to_string(),
        })
        .collect()
}
