//! Exploration settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum cosine similarity between two titles to consider them the same state.
pub const TITLE_SIMILARITY_THRESHOLD: f32 = 0.92;

/// Priority at which an action is taken deterministically instead of sampled.
pub const OBVIOUS_PRIORITY: i32 = 11;

/// Pause between replayed transitions.
pub const REPLAY_DELAY: Duration = Duration::from_secs(1);

/// Back-navigations attempted before falling back to a full replay.
pub const MAX_BACK_STEPS: usize = 10;

/// Settings for one exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub similarity_threshold: f32,
    pub obvious_priority: i32,
    /// Upper bound on loop iterations. `None` explores until exhaustion.
    pub iterations: Option<usize>,
    #[serde(with = "millis")]
    pub replay_delay: Duration,
    pub max_back_steps: usize,
    /// Scheme used to build the root URL from the domain.
    pub scheme: String,
    /// Snapshot written after every iteration when set.
    pub autosave: Option<PathBuf>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: TITLE_SIMILARITY_THRESHOLD,
            obvious_priority: OBVIOUS_PRIORITY,
            iterations: None,
            replay_delay: REPLAY_DELAY,
            max_back_steps: MAX_BACK_STEPS,
            scheme: "http".to_string(),
            autosave: None,
        }
    }
}

impl ExplorerConfig {
    /// Root URL of the domain, where every replay starts.
    pub fn root_url(&self, domain: &str) -> String {
        format!("{}://{}", self.scheme, domain)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
