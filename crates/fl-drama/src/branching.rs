//! Branching conversations driven by numbered menus in shot text.
//!
//! A shot cued with the `branching` directive opens a [`Branch`]. The
//! numbered list in its text becomes the menu, and choosing an option
//! speaks the table nested under the option number, so `[[_.2]]` holds the
//! reply to option 2 of the shot above it. A reply that branches again
//! replaces the menu and the choice path grows by one key.
//!
//! The `returning` directive climbs back up. If it targets the drama the
//! last choice is dropped and the shot above is spoken again. Without the
//! drama as a target the branch closes. While a branch is open the drama's
//! entity carries the flag `tree = true`, so a scene can hide its root
//! shot with `if.ROLE.tree = false`.

use std::collections::BTreeMap;
use std::iter;
use std::sync::LazyLock;

use fl_core::markup::{strip_tags, unescape};
use fl_core::{Entity, SpecTable, Speech, World};
use fl_director::scene::SHOTS_KEY;
use fl_director::{Cast, Directive, NoteKey, Shot, allows};
use regex::Regex;
use serde_json::Value;

use crate::drama::Drama;
use crate::error::DramaResult;
use crate::performance::{Command, Domain, Invocation};
use crate::story::Turn;

/// Flag set on the drama's entity while a branch is open.
pub const TREE_FLAG: &str = "tree";

/// Name of the built-in command that picks a menu option.
pub const MENU_COMMAND: &str = "menu_option";

static LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<ol>.*?</ol>").expect("valid regex"));

static ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<li id="(\d+)">\s*<p[^>]*>(.*?)</p>"#).expect("valid regex")
});

/// An open branch of conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    /// Index of the root shot in the scene.
    pub shot: usize,
    /// Option keys chosen below the root, outermost first.
    pub keys: Vec<String>,
    /// Tables of the scene the branch opened in.
    pub tables: SpecTable,
    /// Role bindings when the branch opened.
    pub cast: Cast,
    /// Table key holding shot markup.
    pub dialogue_key: String,
    /// Option text and option number, each mapped to the number.
    pub menu: BTreeMap<String, String>,
}

impl Branch {
    /// The table reached from the root shot by `keys`.
    pub fn follow(&self, keys: &[String]) -> Option<&SpecTable> {
        follow_path(&self.tables, self.shot, keys)
    }

    /// Markup of the table reached by `keys`.
    pub fn text(&self, keys: &[String]) -> Option<&str> {
        self.follow(keys)?.get(&self.dialogue_key)?.as_str()
    }
}

/// Walk from shot `shot` of a scene down through nested option tables.
///
/// An option key naming an array of tables takes the first of them.
pub fn follow_path<'a>(tables: &'a SpecTable, shot: usize, keys: &[String]) -> Option<&'a SpecTable> {
    let mut node = tables.get(SHOTS_KEY)?.as_array()?.get(shot)?.as_object()?;
    for key in keys {
        node = match node.get(key)? {
            Value::Array(items) => items.first()?.as_object()?,
            Value::Object(table) => table,
            _ => return None,
        };
    }
    Some(node)
}

/// Options of the first numbered list in rendered HTML.
///
/// Both the plain option text and its number map to the number.
pub fn menu_options(html: &str) -> BTreeMap<String, String> {
    let mut rv = BTreeMap::new();
    let Some(list) = LIST.find(html) else {
        return rv;
    };
    for item in ITEM.captures_iter(list.as_str()) {
        let id = item[1].to_string();
        let text = unescape(&strip_tags(&item[2])).trim().to_string();
        if !text.is_empty() {
            rv.insert(text, id.clone());
        }
        rv.insert(id.clone(), id);
    }
    rv
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Directive handler for `branching`: open a branch or refresh its menu.
///
/// A scene shot opens a new branch rooted at that shot. Programmatic speech
/// only refreshes the menu of the branch already open.
pub fn on_branching<T>(
    drama: &mut Drama<T>,
    _: &mut World,
    key: &NoteKey,
    _: &Directive,
    turn: &Turn,
) -> DramaResult<()> {
    let Some(block) = turn
        .blocks
        .iter()
        .find(|b| b.ordinal == key.shot && b.path == key.path)
    else {
        tracing::debug!(shot = key.shot, "branching cue has no block");
        return Ok(());
    };
    let menu = menu_options(&block.html);

    if let (Some(_), Some(scene)) = (&key.path, &turn.scene) {
        drama.branch = Some(Branch {
            shot: key.shot.saturating_sub(turn.speech.len()),
            keys: Vec::new(),
            tables: scene.tables.clone(),
            cast: turn.cast.clone(),
            dialogue_key: turn.dialogue_key.clone(),
            menu,
        });
    } else if let Some(branch) = drama.branch.as_mut().filter(|_| key.path.is_none()) {
        branch.menu = menu;
    } else {
        tracing::debug!(shot = key.shot, "branching outside a scene");
        return Ok(());
    }
    drama.entity.flags.insert(TREE_FLAG.to_string(), true);
    Ok(())
}

/// Directive handler for `returning`: step back up, or close the branch.
pub fn on_returning<T>(
    drama: &mut Drama<T>,
    _: &mut World,
    _: &NoteKey,
    directive: &Directive,
    _: &Turn,
) -> DramaResult<()> {
    if !directive.targets.contains(&drama.entity.uid) {
        drama.branch = None;
        drama.entity.flags.insert(TREE_FLAG.to_string(), false);
        return Ok(());
    }
    let Some(branch) = drama.branch.as_mut() else {
        return Ok(());
    };
    if branch.keys.pop().is_none() {
        return Ok(());
    }
    let text = branch.text(&branch.keys).map(str::to_string);
    if let Some(text) = text {
        drama.speech.push_back(Speech::dialogue(text));
    }
    Ok(())
}

/// Command handler for [`MENU_COMMAND`]: speak the chosen option.
///
/// Options whose `if` conditions fail for the branch's cast are ignored.
pub fn menu_option<T>(
    drama: &mut Drama<T>,
    world: &mut World,
    invocation: &Invocation,
) -> DramaResult<Vec<Speech>> {
    let Some(option) = invocation.value("option").and_then(Value::as_str) else {
        return Ok(Vec::new());
    };
    let Some(branch) = drama.branch.as_ref() else {
        return Ok(Vec::new());
    };
    let Some(key) = branch.menu.get(option) else {
        return Ok(Vec::new());
    };
    let keys: Vec<String> = branch.keys.iter().chain(iter::once(key)).cloned().collect();
    let Some(table) = branch.follow(&keys) else {
        tracing::debug!(option = %option, "menu option has no table");
        return Ok(Vec::new());
    };
    let shot = Shot {
        index: 0,
        text: table
            .get(&branch.dialogue_key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        conditions: table
            .get("if")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    };
    let ensemble: Vec<&Entity> = world.entities().iter().chain(iter::once(&drama.entity)).collect();
    if !allows(&shot, &branch.cast, &ensemble) {
        return Ok(Vec::new());
    }

    if let Some(branch) = drama.branch.as_mut() {
        branch.keys = keys;
    }
    Ok(vec![Speech::dialogue(shot.text)])
}

impl<T> Drama<T> {
    /// Register the branching directives and the menu command.
    pub fn with_branching(mut self) -> Self {
        self.entity.flags.insert(TREE_FLAG.to_string(), false);
        self.with_directive("branching", on_branching)
            .with_directive("returning", on_returning)
            .with_command(
                Command::new(MENU_COMMAND)
                    .with_template("{option}")
                    .with_param("option", Domain::Path("menu".into())),
                menu_option,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drama::Play;
    use fl_director::{Block, Scene};
    use serde_json::json;

    fn tables() -> SpecTable {
        match json!({
            "_": [
                {"s": "<> Hello."},
                {
                    "s": "<A.branching> Pick.\n\n1. Tea\n2. Cake",
                    "1": [{"s": "<A.returning> Tea it is."}],
                    "2": [{
                        "s": "<A.branching> Which cake?\n\n1. Lemon",
                        "1": [{"s": "<A.returning@D> Lemon.", "if": {"A": {"state": 9}}}],
                    }],
                },
            ],
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn choose(drama: &mut Drama<()>, world: &mut World, invocation: &Invocation) -> Vec<String> {
        menu_option(drama, world, invocation)
            .unwrap()
            .iter()
            .map(|s| s.text().to_string())
            .collect()
    }

    fn drama() -> Drama<()> {
        let mut drama = Drama::<()>::default().with_branching();
        drama.branch = Some(Branch {
            shot: 1,
            tables: tables(),
            dialogue_key: "s".into(),
            menu: menu_options("<ol>\n<li id=\"1\"><p>Tea</p></li>\n<li id=\"2\"><p>Cake</p></li>\n</ol>"),
            ..Branch::default()
        });
        drama
    }

    #[test]
    fn menu_options_map_text_and_number() {
        let html = "<blockquote>\n<p>Pick.</p>\n<ol>\n<li id=\"1\"><p style=\"animation-delay: 1.00s\">Black &amp; <em>white</em></p></li>\n<li id=\"2\"><p>Cake</p></li>\n</ol>\n</blockquote>";
        let menu = menu_options(html);
        assert_eq!(menu.len(), 4);
        assert_eq!(menu["Black & white"], "1");
        assert_eq!(menu["1"], "1");
        assert_eq!(menu["Cake"], "2");
        assert!(menu_options("<p>No list here.</p>").is_empty());
    }

    #[test]
    fn follow_path_descends_through_options() {
        let tables = tables();
        assert_eq!(follow_path(&tables, 0, &[]).unwrap()["s"], "<> Hello.");
        let lemon = follow_path(&tables, 1, &keys(&["2", "1"])).unwrap();
        assert_eq!(lemon["s"], "<A.returning@D> Lemon.");
        assert!(follow_path(&tables, 1, &keys(&["3"])).is_none());
        assert!(follow_path(&tables, 0, &keys(&["1"])).is_none());
        assert!(follow_path(&tables, 5, &[]).is_none());
    }

    #[test]
    fn with_branching_registers_handlers() {
        let drama = Drama::<()>::default().with_branching();
        assert_eq!(drama.entity.attribute(TREE_FLAG), Some(false));
        let actions: Vec<&str> = drama.actions_handled().collect();
        assert_eq!(actions, vec!["branching", "returning"]);
        assert!(drama.commands().any(|c| c.name == MENU_COMMAND));
    }

    #[test]
    fn menu_options_become_phrases() {
        let world = World::new();
        let mut drama = drama();
        let options = drama.options(&world);
        assert!(options.contains_key("tea"));
        assert!(options.contains_key("2"));

        let mut plain = Drama::<()>::default().with_branching();
        assert!(plain.options(&world).is_empty());
    }

    #[test]
    fn choosing_an_option_descends() {
        let mut world = World::new();
        let mut drama = drama();
        let invocations = drama.actions("cake", &world);
        assert_eq!(invocations.len(), 1);
        let speech = choose(&mut drama, &mut world, &invocations[0]);
        assert_eq!(speech, vec!["<A.branching> Which cake?\n\n1. Lemon".to_string()]);
        assert_eq!(drama.branch.as_ref().unwrap().keys, keys(&["2"]));
    }

    #[test]
    fn failed_conditions_block_an_option() {
        let mut world = World::new();
        let mut drama = drama();
        if let Some(branch) = drama.branch.as_mut() {
            branch.keys = keys(&["2"]);
            branch.menu = menu_options("<ol>\n<li id=\"1\"><p>Lemon</p></li>\n</ol>");
        }
        let invocations = drama.actions("lemon", &world);
        assert!(choose(&mut drama, &mut world, &invocations[0]).is_empty());
        assert_eq!(drama.branch.as_ref().unwrap().keys, keys(&["2"]));
    }

    #[test]
    fn returning_to_the_drama_respeaks_the_parent() {
        let mut world = World::new();
        let mut drama = drama();
        if let Some(branch) = drama.branch.as_mut() {
            branch.keys = keys(&["2", "1"]);
        }
        let directive = Directive {
            action: "returning".into(),
            entity: None,
            targets: vec![drama.entity.uid],
        };
        let key = NoteKey::new(None, 0, 0);
        on_returning(&mut drama, &mut world, &key, &directive, &Turn::default()).unwrap();
        assert_eq!(drama.branch.as_ref().unwrap().keys, keys(&["2"]));
        assert_eq!(drama.speech.len(), 1);
        assert!(drama.speech[0].text().contains("Which cake?"));
    }

    #[test]
    fn returning_elsewhere_closes_the_branch() {
        let mut world = World::new();
        let mut drama = drama();
        drama.entity.flags.insert(TREE_FLAG.into(), true);
        let directive = Directive {
            action: "returning".into(),
            entity: None,
            targets: Vec::new(),
        };
        let key = NoteKey::new(None, 0, 0);
        on_returning(&mut drama, &mut world, &key, &directive, &Turn::default()).unwrap();
        assert!(drama.branch.is_none());
        assert_eq!(drama.entity.attribute(TREE_FLAG), Some(false));
        assert!(drama.speech.is_empty());
    }

    #[test]
    fn branching_in_a_scene_opens_a_branch() {
        let mut world = World::new();
        let mut drama = Drama::<()>::default().with_branching();
        let scene = Scene::new("", tables());
        let turn = Turn {
            scene: Some(scene),
            speech: vec![Speech::dialogue("<> Aside.")],
            blocks: vec![Block {
                ordinal: 2,
                path: Some("tea.scene.toml".into()),
                html: "<ol>\n<li id=\"1\"><p>Tea</p></li>\n</ol>".into(),
            }],
            dialogue_key: "s".into(),
            ..Turn::default()
        };
        let directive = Directive {
            action: "branching".into(),
            entity: None,
            targets: Vec::new(),
        };
        let key = NoteKey::new(Some("tea.scene.toml"), 2, 0);
        on_branching(&mut drama, &mut world, &key, &directive, &turn).unwrap();

        let branch = drama.branch.as_ref().unwrap();
        assert_eq!(branch.shot, 1);
        assert_eq!(branch.menu["Tea"], "1");
        assert_eq!(branch.text(&keys(&["1"])), Some("<A.returning> Tea it is."));
        assert_eq!(drama.entity.attribute(TREE_FLAG), Some(true));

        let missing = NoteKey::new(None, 7, 0);
        on_branching(&mut drama, &mut world, &missing, &directive, &turn).unwrap();
        assert_eq!(drama.branch.as_ref().unwrap().menu.len(), 2);
    }
}
