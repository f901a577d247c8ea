use serde::Deserialize;

/// Which of a scene's allowed shots are rendered in one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotPolicy {
    /// Every allowed shot, in scene order.
    #[default]
    All,
    /// Only the first allowed shot.
    First,
}

/// Configuration for a [`Director`](crate::Director).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// RNG seed for name choice.
    pub seed: u64,
    /// Seconds of pause after each paragraph.
    pub pause: f64,
    /// Seconds of display time per word.
    pub dwell: f64,
    /// Initial offer value recorded for cues.
    pub offer: f64,
    /// Shot selection policy.
    pub shots: ShotPolicy,
    /// Key of the markup text field in shot tables.
    pub dialogue_key: String,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            pause: 1.0,
            dwell: 0.3,
            offer: 0.0,
            shots: ShotPolicy::All,
            dialogue_key: "s".to_string(),
        }
    }
}

impl DirectorConfig {
    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the default pause in seconds.
    pub fn with_pause(mut self, pause: f64) -> Self {
        self.pause = pause;
        self
    }

    /// Set the default dwell time per word in seconds.
    pub fn with_dwell(mut self, dwell: f64) -> Self {
        self.dwell = dwell;
        self
    }

    /// Set the initial offer.
    pub fn with_offer(mut self, offer: f64) -> Self {
        self.offer = offer;
        self
    }

    /// Set the shot selection policy.
    pub fn with_shots(mut self, shots: ShotPolicy) -> Self {
        self.shots = shots;
        self
    }

    /// Set the key holding markup text in shot tables.
    pub fn with_dialogue_key(mut self, key: impl Into<String>) -> Self {
        self.dialogue_key = key.into();
        self
    }
}
