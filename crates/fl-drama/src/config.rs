use fl_core::SpecTable;
use fl_director::DirectorConfig;
use serde::Deserialize;

use crate::error::DramaResult;

/// Configuration for command matching.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Minimum similarity for free text to match a command phrase.
    pub cutoff: f64,
    /// A phrase ending with this character keeps its filler words.
    pub preserver: char,
    /// Filler words dropped from phrases and player text.
    pub discard: Vec<String>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cutoff: 0.95,
            preserver: '.',
            discard: ["a", "an", "any", "her", "his", "my", "some", "the", "their"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl PerformanceConfig {
    /// Set the similarity cutoff.
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Set the preserver character.
    pub fn with_preserver(mut self, preserver: char) -> Self {
        self.preserver = preserver;
        self
    }

    /// Replace the filler words.
    pub fn with_discard<S: Into<String>>(mut self, words: impl IntoIterator<Item = S>) -> Self {
        self.discard = words.into_iter().map(Into::into).collect();
        self
    }
}

/// Configuration for a whole story session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Seed for the director's RNG. Overrides `director.seed` when set.
    pub seed: Option<u64>,
    /// Director settings.
    pub director: DirectorConfig,
    /// Command matching settings.
    pub performance: PerformanceConfig,
    /// Named themes. Each may carry an `ink` table of colour settings.
    pub themes: SpecTable,
}

impl StoryConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> DramaResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the director settings.
    pub fn with_director(mut self, director: DirectorConfig) -> Self {
        self.director = director;
        self
    }

    /// Set the command matching settings.
    pub fn with_performance(mut self, performance: PerformanceConfig) -> Self {
        self.performance = performance;
        self
    }

    /// Set the themes.
    pub fn with_themes(mut self, themes: SpecTable) -> Self {
        self.themes = themes;
        self
    }

    /// The director settings with the story seed applied.
    pub fn director_config(&self) -> DirectorConfig {
        match self.seed {
            Some(seed) => self.director.clone().with_seed(seed),
            None => self.director.clone(),
        }
    }
}
