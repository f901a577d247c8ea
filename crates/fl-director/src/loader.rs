//! Discovery and parsing of story assets.
//!
//! Files named `*.scene.toml` are scenes. Any other `.toml` file is a
//! [`Structure`] of plain data. Everything else is media, typed by its
//! extension. Malformed or unreadable TOML never aborts loading: the asset is kept with
//! empty tables and the parser message.

use std::fs;
use std::path::{Path, PathBuf};

use fl_core::SpecTable;
use serde_json::Value;

use crate::error::{DirectorError, DirectorResult};
use crate::scene::Scene;

/// Suffix that marks a scene file.
pub const SCENE_SUFFIX: &str = ".scene.toml";

/// A TOML document that is not a scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    /// Where it was read from.
    pub path: PathBuf,
    /// Parsed tables.
    pub data: SpecTable,
    /// Parser message, if the text was malformed.
    pub error: Option<String>,
}

/// One discovered file.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    /// A scene document.
    Scene(Scene),
    /// A plain TOML document.
    Structure(Structure),
    /// Any other file.
    Media {
        /// Where it was found.
        path: PathBuf,
        /// MIME type guessed from the extension.
        media_type: String,
    },
}

/// Discovered assets grouped by kind, each group sorted by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assets {
    /// Scene documents.
    pub scenes: Vec<Scene>,
    /// Plain TOML documents.
    pub structures: Vec<Structure>,
    /// Other files as `(path, media type)`.
    pub media: Vec<(PathBuf, String)>,
}

impl Assets {
    /// Group a list of assets.
    pub fn new(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut rv = Self::default();
        for asset in assets {
            rv.push(asset);
        }
        rv
    }

    /// Add one asset to its group.
    pub fn push(&mut self, asset: Asset) {
        match asset {
            Asset::Scene(scene) => self.scenes.push(scene),
            Asset::Structure(structure) => self.structures.push(structure),
            Asset::Media { path, media_type } => self.media.push((path, media_type)),
        }
    }

    /// Media of one type.
    pub fn of_type<'a>(&'a self, media_type: &'a str) -> impl Iterator<Item = &'a Path> + 'a {
        self.media
            .iter()
            .filter(move |(_, t)| t == media_type)
            .map(|(p, _)| p.as_path())
    }

    /// Every role specification table of every scene, duplicates removed.
    pub fn spec_tables(&self) -> Vec<SpecTable> {
        let mut rv: Vec<SpecTable> = Vec::new();
        for scene in &self.scenes {
            for (_, table) in scene.roles() {
                if !rv.contains(table) {
                    rv.push(table.clone());
                }
            }
        }
        rv
    }

    /// True if nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty() && self.structures.is_empty() && self.media.is_empty()
    }
}

/// Reads assets from text and from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader;

impl Loader {
    /// Parse TOML text into tables.
    pub fn read_toml(text: &str) -> DirectorResult<SpecTable> {
        match toml::from_str::<Value>(text) {
            Ok(Value::Object(tables)) => Ok(tables),
            Ok(_) => Ok(SpecTable::new()),
            Err(e) => Err(DirectorError::Parse {
                path: String::from("<text>"),
                reason: e.to_string(),
            }),
        }
    }

    /// Parse a scene. Malformed text yields empty tables and the error message.
    pub fn read(text: &str, path: Option<&Path>) -> Scene {
        let (tables, error) = match Self::read_toml(text) {
            Ok(tables) => (tables, None),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "malformed scene");
                (SpecTable::new(), Some(e.to_string()))
            }
        };
        Scene {
            text: text.to_string(),
            tables,
            path: path.map(Path::to_path_buf),
            error,
        }
    }

    /// Load one file as an asset.
    ///
    /// An unreadable scene or structure is kept with empty tables and the
    /// read error, like malformed TOML.
    pub fn load(path: &Path) -> Asset {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_scene = name.ends_with(SCENE_SUFFIX);
        if !is_scene && !name.ends_with(".toml") {
            return Asset::Media {
                path: path.to_path_buf(),
                media_type: media_type(path).to_string(),
            };
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) => {
                let e = DirectorError::Io {
                    path: path.to_path_buf(),
                    source,
                };
                tracing::warn!(path = %path.display(), error = %e, "unreadable asset");
                return if is_scene {
                    Asset::Scene(Scene {
                        path: Some(path.to_path_buf()),
                        error: Some(e.to_string()),
                        ..Scene::default()
                    })
                } else {
                    Asset::Structure(Structure {
                        path: path.to_path_buf(),
                        data: SpecTable::new(),
                        error: Some(e.to_string()),
                    })
                };
            }
        };
        if is_scene {
            return Asset::Scene(Self::read(&text, Some(path)));
        }
        let (data, error) = match Self::read_toml(&text) {
            Ok(data) => (data, None),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed structure");
                (SpecTable::new(), Some(e.to_string()))
            }
        };
        Asset::Structure(Structure {
            path: path.to_path_buf(),
            data,
            error,
        })
    }

    /// Load every file under `dir`, recursively, in path order.
    pub fn discover(dir: &Path) -> DirectorResult<Assets> {
        let mut paths = Vec::new();
        collect(dir, &mut paths)?;
        paths.sort();
        tracing::debug!(dir = %dir.display(), files = paths.len(), "discovered assets");
        Ok(Assets::new(paths.iter().map(|p| Self::load(p))))
    }
}

fn collect(dir: &Path, paths: &mut Vec<PathBuf>) -> DirectorResult<()> {
    let io = |source: std::io::Error| DirectorError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_dir() {
            collect(&path, paths)?;
        } else {
            paths.push(path);
        }
    }
    Ok(())
}

fn media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "js" => "text/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
