//! End-to-end story sessions over scene files on disk.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use fl_core::{CoreResult, Entity, Map, StateKind, World};
use fl_director::{Directive, Loader, NoteKey, cast, specifications};
use fl_drama::{
    Drama, DramaResult, MENU_COMMAND, Selector, StoryBuilder, StoryConfig, TREE_FLAG, Turn,
};
use serde_json::{Value, json};
use tempfile::TempDir;

const FIGHT: &str = r#"
[FIGHTER_1]
state = 1

[FIGHTER_2]
type = "Animal"
state = 1

[WEAPON]
type = "Weapon"
roles = ["FIGHTER_1"]
state = 1

[[_]]
s = '''
<FIGHTER_1>

    Take that!

<WEAPON.attacking@FIGHTER_2:shouts/slapwhack?offer=1>

    _Whack!_

<FIGHTER_2?offer=1>

    Uuurrggh!
'''
"#;

const CONVERSATION: &str = r#"
[ALAN]
type = "Narrator"

[BETH]
type = "Gossiper"

[[_]]
s = '''
<ALAN.testing>

    Hello.
'''

[[_.1]]
s = "Never shown."

[[_]]
s = '''
<ALAN.branching>

    Would you like to know a secret, {BETH.name}?

    1. Yes
    2. No
'''

[[_]]
s = "<ALAN> OK. Conversation over."
"#;

const BRANCHING: &str = r#"
[ALAN]
type = "Narrator"

[BETH]
type = "Gossiper"

[CONVERSATION]
type = "Conversation"

[[_]]
if.CONVERSATION.tree = false
s = '''
<ALAN.branching>

    What shall we talk about, {BETH.name}?

    1. Mention the football
    2. Ask about the weather
'''

[[_.1]]
s = '''
<BETH.branching>

    Never watch it. But I do have two lovely cats.

    1. Ask about Charlie
    2. Ask about Doodles
'''

[[_.1.1]]
s = "<BETH.returning> Charlie is the clever one."

[[_.1.2]]
s = "<BETH.returning@CONVERSATION> Doodles is the pretty one."

[[_.2]]
s = "<BETH.returning> Looks like rain."
"#;

const BOTTLES: &str = r#"
[WALL]
type = "Wall"
state = [1, 2, 3]

[BOTTLE]
type = "Bottle"
state = "Fragility.unbroken"

[[_]]
if.WALL.state = 3
s = "<WALL.breaking@BOTTLE> Three green bottles, hanging on the wall."

[[_]]
if.WALL.state = [1, 2]
s = "<WALL.breaking@BOTTLE> Fewer green bottles, hanging on the wall."
"#;

/// Write scene files into a temp directory.
fn scenes(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, text) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }
    dir
}

// ---------------------------------------------------------------------------
// Cartoon fight
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Fight {
    hits: usize,
}

fn fighters(_: &World) -> CoreResult<Vec<Entity>> {
    Ok(vec![
        Entity::named("Biffy").with_type("Animal").with_state(1),
        Entity::named("Bashy").with_type("Animal").with_state(1),
        Entity::named("Rusty").with_type("Weapon").with_state(1),
    ])
}

fn attacking(
    drama: &mut Drama<Fight>,
    world: &mut World,
    _: &NoteKey,
    directive: &Directive,
    _: &Turn,
) -> DramaResult<()> {
    for id in &directive.targets {
        if let Some(target) = world.get_mut(*id) {
            target.set_state(0);
        }
    }
    drama.data.hits += 1;
    Ok(())
}

fn recast(story: &StoryBuilder) -> usize {
    let scene = &story.assets.scenes[0];
    let drama = story.dramas()[0].as_ref();
    cast(&specifications(scene), &drama.ensemble(&story.world)).len()
}

#[test]
fn cartoon_fight_runs_until_nobody_can_be_hit() {
    let dir = scenes(&[("fight.scene.toml", FIGHT)]);
    let assets = Loader::discover(dir.path()).unwrap();
    let mut story = StoryBuilder::new(StoryConfig::default().with_seed(1))
        .with_assets(assets)
        .with_world(World::new().make(&fighters))
        .with_drama(Drama::new(Fight::default()).with_directive("attacking", attacking));

    assert_eq!(story.assets.scenes.len(), 1);
    let specs = specifications(&story.assets.scenes[0]);
    let ranks: Vec<f64> = specs.iter().map(|(_, s)| s.rank()).collect();
    assert_eq!(ranks.len(), 3);
    for (rank, expected) in ranks.iter().zip([1.0, 2.0, 3.0]) {
        assert!((rank - expected).abs() < f64::EPSILON);
    }

    let turn = story.turn();
    assert_eq!(turn.cast.len(), 3);
    assert_eq!(turn.blocks.len(), 1);
    assert!(turn.blocks[0].html.contains("Whack!"));
    assert!(turn.blocks[0].html.contains("Biffy"));
    assert_eq!(recast(&story), 3);
    assert_eq!(story.world.find_by_name("Biffy").unwrap().state(), 0);

    let turn = story.turn();
    assert_eq!(turn.cast.len(), 3);
    assert!(!turn.blocks.is_empty());
    assert_eq!(story.world.find_by_name("Bashy").unwrap().state(), 0);
    assert_eq!(recast(&story), 2);

    let turn = story.turn();
    assert!(turn.scene.is_none());
    assert!(turn.blocks.is_empty());
    assert_eq!(story.drama::<Fight>().unwrap().data.hits, 2);
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Witness {
    counts: BTreeMap<String, usize>,
}

fn people(_: &World) -> CoreResult<Vec<Entity>> {
    Ok(vec![
        Entity::named("Alan").with_type("Narrator"),
        Entity::named("Beth").with_type("Gossiper"),
    ])
}

fn witness(
    drama: &mut Drama<Witness>,
    _: &mut World,
    _: &NoteKey,
    directive: &Directive,
    _: &Turn,
) -> DramaResult<()> {
    *drama.data.counts.entry(directive.action.clone()).or_default() += 1;
    Ok(())
}

#[test]
fn conversation_directives_reach_their_handlers() {
    let dir = scenes(&[("talk/conversation.scene.toml", CONVERSATION)]);
    let drama = Drama::new(Witness::default())
        .with_type("Conversation")
        .with_directive("testing", witness)
        .with_directive("branching", witness);
    let mut story = StoryBuilder::default()
        .with_assets(Loader::discover(dir.path()).unwrap())
        .with_world(World::new().make(&people))
        .with_drama(drama);

    let turn = story.turn();
    assert_eq!(turn.blocks.len(), 3);
    assert!(turn.blocks[1].html.contains("Beth"));
    assert!(!turn.blocks.iter().any(|b| b.html.contains("Never shown.")));
    assert!(turn.blocks[2].html.contains("Conversation over."));

    for _ in 0..3 {
        story.turn();
    }
    let counts = &story.drama::<Witness>().unwrap().data.counts;
    assert_eq!(counts.get("testing"), Some(&4));
    assert_eq!(counts.get("branching"), Some(&4));
}

#[test]
fn branching_conversation_follows_menu_choices() {
    let dir = scenes(&[("talk/branching.scene.toml", BRANCHING)]);
    let drama = Drama::<()>::default().with_type("Conversation").with_branching();
    let mut story = StoryBuilder::default()
        .with_assets(Loader::discover(dir.path()).unwrap())
        .with_world(World::new().make(&people))
        .with_drama(drama);
    let html = |turn: &Turn| turn.blocks.iter().map(|b| b.html.clone()).collect::<String>();
    let tree = |story: &StoryBuilder| {
        let drama = story.drama::<()>().unwrap();
        (drama.entity.attribute(TREE_FLAG), drama.branch.as_ref().map(|b| b.keys.clone()))
    };

    let turn = story.turn();
    assert!(html(&turn).contains("What shall we talk about, Beth?"));
    assert_eq!(tree(&story), (Some(true), Some(Vec::new())));

    let invocation = story.action("mention the football").unwrap();
    assert_eq!(invocation.command, MENU_COMMAND);
    let turn = story.turn();
    let text = html(&turn);
    assert!(text.contains("two lovely cats"));
    assert!(!text.contains("What shall we talk about"));
    assert_eq!(tree(&story).1, Some(vec!["1".to_string()]));

    story.action("ask about doodles").unwrap();
    assert!(html(&story.turn()).contains("the pretty one"));
    assert_eq!(tree(&story).1, Some(vec!["1".to_string()]));
    assert!(html(&story.turn()).contains("two lovely cats"));

    story.action("1").unwrap();
    let turn = story.turn();
    assert!(html(&turn).contains("the clever one"));
    assert_eq!(turn.blocks.len(), 1);
    assert_eq!(tree(&story), (Some(false), None));

    let turn = story.turn();
    assert!(html(&turn).contains("What shall we talk about"));
    assert_eq!(tree(&story).0, Some(true));
}

#[test]
fn menu_options_need_an_open_branch() {
    let mut story = StoryBuilder::default()
        .with_world(World::new().make(&people))
        .with_drama(Drama::<()>::default().with_branching().with_speech(["<> Hello."]));
    assert!(story.action("1").is_none());
    assert_eq!(story.turn().blocks.len(), 1);
    assert!(story.drama::<()>().unwrap().branch.is_none());
}

// ---------------------------------------------------------------------------
// Speech only
// ---------------------------------------------------------------------------

#[test]
fn knock_knock() {
    let mut story = StoryBuilder::from_speech(["<> Knock, knock.", "<> Who's there?"]);
    assert_eq!(story.turn().blocks.len(), 1);
    assert_eq!(story.turn().blocks.len(), 1);
    let turn = story.turn();
    assert!(turn.blocks.is_empty());
    assert!(story.director.notes().is_empty());
}

#[test]
fn awkward_speech_never_stops_a_turn() {
    let mut story = StoryBuilder::from_speech([
        " <> Hello.\n\u{3000}World.",
        "<3 you",
        "<A> Hello {missing.name}.",
        "\u{a0}\t<>\n\t\u{a0}",
    ]);
    assert!(story.action("\u{0}<>").is_none());

    let turn = story.turn();
    assert_eq!(turn.blocks.len(), 1);
    assert!(turn.blocks[0].html.contains("World."));

    let turn = story.turn();
    assert_eq!(turn.blocks.len(), 1);
    assert!(turn.blocks[0].html.contains("3 you"));
    assert!(!turn.blocks[0].html.contains("<cite"));

    assert!(story.turn().blocks.is_empty());
    story.turn();
    assert!(story.turn().blocks.is_empty());
    assert!(story.director.notes().is_empty());
}

#[test]
fn themes_follow_the_latest_cue() {
    let themes = match json!({
        "a": {"ink": {}},
        "b": {"ink": {"gravity": "blue"}},
        "c": {"ink": {"gravity": "crimson"}},
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };
    let mut story = StoryBuilder::new(StoryConfig::default().with_themes(themes)).with_drama(
        Drama::<()>::default().with_speech([
            "<?theme=b&theme=a> Knock, knock.",
            "<?theme=b&theme=c> Who's there?",
        ]),
    );
    let turn = story.turn();
    assert_eq!(story.theme(&turn)["ink"]["gravity"], "blue");
    let turn = story.turn();
    assert_eq!(story.theme(&turn)["ink"]["gravity"], "crimson");
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

fn fragility() -> StateKind {
    StateKind::from_names("Fragility", ["unbroken", "broken"])
}

fn shelf(_: &World) -> CoreResult<Vec<Entity>> {
    let unbroken = fragility().get("unbroken").unwrap();
    let mut rv = vec![Entity::named("Wall").with_type("Wall").with_state(3)];
    for name in ["Green", "Greener", "Greenest"] {
        rv.push(Entity::named(name).with_type("Bottle").with_state(unbroken.clone()));
    }
    Ok(rv)
}

fn breaking(
    _: &mut Drama<()>,
    world: &mut World,
    _: &NoteKey,
    directive: &Directive,
    _: &Turn,
) -> DramaResult<()> {
    let broken = fragility().get("broken").unwrap();
    for id in &directive.targets {
        if let Some(bottle) = world.get_mut(*id) {
            bottle.set_state(broken.clone());
        }
    }
    if let Some(wall) = directive.entity.and_then(|id| world.get_mut(id)) {
        let left = wall.state() - 1;
        wall.set_state(left);
    }
    Ok(())
}

#[test]
fn bottles_fall_until_none_are_left() {
    let dir = scenes(&[("bottles.scene.toml", BOTTLES)]);
    let mut story = StoryBuilder::default()
        .with_assets(Loader::discover(dir.path()).unwrap())
        .with_world(World::new().make(&shelf))
        .with_drama(Drama::<()>::default().with_directive("breaking", breaking));

    let lines: Vec<String> = (0..5)
        .map(|_| {
            story
                .turn()
                .blocks
                .iter()
                .map(|b| b.html.clone())
                .collect::<String>()
        })
        .collect();
    assert!(lines[0].contains("Three green bottles"));
    assert!(lines[1].contains("Fewer green bottles"));
    assert!(lines[2].contains("Fewer green bottles"));
    assert!(!lines[2].contains("Three"));
    assert!(lines[3].is_empty());
    assert!(lines[4].is_empty());

    assert_eq!(story.world.find_by_name("Wall").unwrap().state(), 0);
    let broken = story
        .world
        .of_type("Bottle")
        .filter(|b| b.get_state("Fragility").is_some_and(|v| v.name() == "broken"))
        .count();
    assert_eq!(broken, 3);
}

// ---------------------------------------------------------------------------
// Residency
// ---------------------------------------------------------------------------

#[test]
fn resident_dramas_read_only_their_scenes() {
    let dir = scenes(&[
        ("ex_10_fight/fight.scene.toml", FIGHT),
        ("ex_11_bottles/bottles.scene.toml", BOTTLES),
    ]);
    let drama = Drama::<()>::default()
        .with_directive("breaking", breaking)
        .with_selector(Selector::new().with_path("ex_11_*/*.scene.toml"));
    let mut story = StoryBuilder::default()
        .with_assets(Loader::discover(dir.path()).unwrap())
        .with_world(World::new().make(&fighters).make(&shelf))
        .with_drama(drama);

    let turn = story.turn();
    let path = turn.scene.and_then(|s| s.path).unwrap();
    assert!(path.ends_with("ex_11_bottles/bottles.scene.toml"));
}

// ---------------------------------------------------------------------------
// Forking
// ---------------------------------------------------------------------------

#[test]
fn forks_share_map_kinds_but_not_entities() {
    let map = Map::new([("hall", vec!["hallway"]), ("kitchen", vec!["kitchen"])])
        .make(|_| Ok(Vec::new()))
        .unwrap();
    let world = World::new().with_map(map).make(&fighters);
    let story = StoryBuilder::from_speech(["<> Hello."]).with_world(world);
    let mut fork = story.fork();

    let (a, b) = (story.world.map.as_ref().unwrap(), fork.world.map.as_ref().unwrap());
    assert!(Arc::ptr_eq(&a.spot, &b.spot));
    assert!(Arc::ptr_eq(&a.exit, &b.exit));

    fork.world.iter_mut().for_each(|e| {
        e.set_state(7);
    });
    assert_eq!(story.world.find_by_name("Biffy").unwrap().state(), 1);
    assert_eq!(fork.turn().blocks.len(), 1);
    assert_eq!(story.drama::<()>().unwrap().speech.len(), 1);
}
