//! Renderer for role-cued dialogue markup.
//!
//! A cue line such as `<WEAPON.attacking@FIGHTER_2:shouts/slapwhack?offer=1#2>`
//! opens a block. The block renders as a `<blockquote>` whose `<cite>` carries
//! the cue's parts as `data-role`, `data-directives`, `data-mode`,
//! `data-parameters` and `data-fragments` attributes. Text after the cue
//! renders as paragraphs, `+` bullet lists and numbered lists.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^<(?P<role>(?:[A-Za-z_][\w-]*)?)(?P<directives>(?:\.\w+(?:@[\w,]+)?)*)(?P<mode>(?::[^?#\s<>]*)?)(?P<parameters>(?:\?[^#\s<>]*)?)(?P<fragments>(?:#[^\s<>]*)?)>",
    )
    .expect("valid regex")
});

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.\s+(.*)$").expect("valid regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

static STRONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w*{])\*([^*{}\s][^*{}]*?)\*").expect("valid regex")
});

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w{])_([^_{}\s][^_{}]*?)_").expect("valid regex")
});

/// Cue parts exposed as `data-*` attributes, in attribute order.
pub const CUE_FIELDS: [&str; 5] = ["role", "directives", "mode", "parameters", "fragments"];

enum Element {
    Para(String),
    Bullets(Vec<String>),
    Numbered(Vec<(String, String)>),
}

/// Render markup text to HTML blocks, one `<blockquote>` per cue.
pub fn render(text: &str) -> String {
    let text = dedent(text);
    let mut blocks: Vec<(Option<Captures<'_>>, Vec<&str>)> = Vec::new();
    for line in text.lines() {
        if let Some(cue) = CUE.captures(line) {
            let end = cue.get(0).map_or(0, |m| m.end());
            blocks.push((Some(cue), vec![&line[end..]]));
        } else if let Some((_, lines)) = blocks.last_mut() {
            lines.push(line);
        } else {
            blocks.push((None, vec![line]));
        }
    }

    let mut out: Vec<String> = Vec::new();
    for (cue, lines) in blocks {
        if cue.is_none() && lines.iter().all(|l| l.trim().is_empty()) {
            continue;
        }
        render_block(cue.as_ref(), &lines, &mut out);
    }

    if out.is_empty() {
        String::new()
    } else {
        format!("{}\n", out.join("\n"))
    }
}

fn render_block(cue: Option<&Captures<'_>>, lines: &[&str], out: &mut Vec<String>) {
    match cue {
        Some(cue) => {
            out.push(format!("<blockquote cite=\"{}\">", escape_attr(&cue[0])));
            let attrs: String = CUE_FIELDS
                .iter()
                .filter_map(|k| {
                    let v = cue.name(k)?.as_str();
                    (!v.is_empty()).then(|| format!(" data-{k}=\"{}\"", escape_attr(v)))
                })
                .collect();
            let role = cue.name("role").map_or("", |m| m.as_str());
            out.push(format!("<cite{attrs}>{}</cite>", escape(role)));
        }
        None => out.push("<blockquote>".to_string()),
    }

    for element in elements(lines) {
        match element {
            Element::Para(text) => out.push(format!("<p>{}</p>", inline(&text))),
            Element::Bullets(items) => {
                out.push("<ul>".to_string());
                for item in items {
                    out.push(format!("<li><p>{}</p></li>", inline(&item)));
                }
                out.push("</ul>".to_string());
            }
            Element::Numbered(items) => {
                out.push("<ol>".to_string());
                for (n, item) in items {
                    out.push(format!("<li id=\"{n}\"><p>{}</p></li>", inline(&item)));
                }
                out.push("</ol>".to_string());
            }
        }
    }
    out.push("</blockquote>".to_string());
}

fn elements(lines: &[&str]) -> Vec<Element> {
    let mut rv: Vec<Element> = Vec::new();
    let mut para: Vec<&str> = Vec::new();

    fn flush(para: &mut Vec<&str>, rv: &mut Vec<Element>) {
        if !para.is_empty() {
            rv.push(Element::Para(para.join(" ")));
            para.clear();
        }
    }

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() {
            flush(&mut para, &mut rv);
        } else if let Some(item) = line.strip_prefix("+ ") {
            flush(&mut para, &mut rv);
            match rv.last_mut() {
                Some(Element::Bullets(items)) => items.push(item.trim().to_string()),
                _ => rv.push(Element::Bullets(vec![item.trim().to_string()])),
            }
        } else if let Some(caps) = NUMBERED.captures(line) {
            flush(&mut para, &mut rv);
            let entry = (caps[1].to_string(), caps[2].trim().to_string());
            match rv.last_mut() {
                Some(Element::Numbered(items)) => items.push(entry),
                _ => rv.push(Element::Numbered(vec![entry])),
            }
        } else {
            para.push(line);
        }
    }
    flush(&mut para, &mut rv);
    rv
}

fn inline(text: &str) -> String {
    let text = escape(text);
    let text = CODE.replace_all(&text, "<code>${1}</code>");
    let text = STRONG.replace_all(&text, "${1}<strong>${2}</strong>");
    EMPHASIS
        .replace_all(&text, "${1}<em>${2}</em>")
        .into_owned()
}

/// Remove the leading spaces and tabs common to every non-blank line.
///
/// Other whitespace is never treated as indentation.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| &l[..l.len() - l.trim_start_matches([' ', '\t']).len()])
        .reduce(common_prefix)
        .unwrap_or_default();
    let mut rv: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            rv.push("");
        } else {
            rv.push(line.strip_prefix(margin).unwrap_or(line));
        }
    }
    let mut rv = rv.join("\n");
    if text.ends_with('\n') {
        rv.push('\n');
    }
    rv
}

// Both arguments are runs of ASCII spaces and tabs.
fn common_prefix<'a>(a: &'a str, b: &'a str) -> &'a str {
    let n = a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count();
    &a[..n]
}

/// Escape text content.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape an attribute value for double-quoted output.
pub fn escape_attr(text: &str) -> String {
    escape(text).replace('"', "&quot;").replace('\'', "&#x27;")
}

/// Reverse [`escape_attr`].
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Drop every tag, keeping text content.
pub fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

/// Non-empty plain-text lines of rendered HTML.
pub fn plain_lines(html: &str) -> Vec<String> {
    html.lines()
        .map(|l| unescape(&strip_tags(l)).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}
