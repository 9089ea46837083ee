use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Suggestion level ──────────────────────────────────────────────────────────

/// Controls how permissive the insight pipeline is when deciding what to
/// surface from learned memories.
///
/// | Level       | Behaviour                                                  |
/// |-------------|------------------------------------------------------------|
/// | `minimal`   | Only high-confidence, well-evidenced findings; one question at most. |
/// | `standard`  | Balanced thresholds; progress messages when data is thin.  |
/// | `proactive` | Surfaces early hunches; up to three follow-up questions.   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionLevel {
    Minimal,
    #[default]
    Standard,
    Proactive,
}

impl SuggestionLevel {
    /// Minimum (decayed) confidence a memory needs before its finding is shown.
    pub fn confidence_threshold(self) -> f32 {
        match self {
            Self::Minimal => 0.7,
            Self::Standard => 0.5,
            Self::Proactive => 0.3,
        }
    }

    /// Minimum number of logged occurrences before a pattern counts as evidence.
    pub fn min_occurrences(self) -> u32 {
        match self {
            Self::Minimal => 5,
            Self::Standard => 3,
            Self::Proactive => 2,
        }
    }

    /// Maximum number of adaptive questions per response.
    pub fn max_questions(self) -> usize {
        match self {
            Self::Minimal => 1,
            Self::Standard => 2,
            Self::Proactive => 3,
        }
    }

    /// Whether a "needs more data" progress message may be emitted when the
    /// pipeline finds nothing to say.
    pub fn show_needs_more_data(self) -> bool {
        !matches!(self, Self::Minimal)
    }
}

// ── Memory detail level ───────────────────────────────────────────────────────

/// How much per-occurrence history the batch builder attaches to new memories.
///
/// `pattern` keeps only aggregate counts; `detailed` also stores the most
/// recent contributing dates (capped at 20).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryDetail {
    Pattern,
    #[default]
    Detailed,
}

// ── Profile config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub user_name: String,
    /// Known allergies, passed verbatim to the food-safety collaborator.
    pub allergies: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user_name: String::new(),
            allergies: vec![],
        }
    }
}

// ── Memory config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding the event log and memory snapshot.
    /// Overridden at runtime by the `SOMA_DATA_DIR` environment variable.
    pub data_dir: String,
    pub detail: MemoryDetail,
    /// When `true`, incremental learning is skipped entirely: new events are
    /// still logged and insight queries still answered, but no memory is
    /// created or updated.
    pub learning_paused: bool,
    /// Minimum gap between maintenance runs.  Maintenance can always be
    /// forced regardless of this gate.
    pub maintenance_interval_hours: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: ".soma".to_string(),
            detail: MemoryDetail::Detailed,
            learning_paused: false,
            maintenance_interval_hours: 24,
        }
    }
}

// ── Insight config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub suggestion_level: SuggestionLevel,
    /// Hard cap on the total characters of a trimmed response.
    pub response_char_budget: usize,
    /// How many recent events the insight engine scans for trigger candidates.
    pub recent_event_limit: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            suggestion_level: SuggestionLevel::Standard,
            response_char_budget: 600,
            recent_event_limit: 50,
        }
    }
}

// ── Top-level config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SomaConfig {
    pub profile: ProfileConfig,
    pub memory: MemoryConfig,
    pub insight: InsightConfig,
}

impl SomaConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(dir) = env::var("SOMA_DATA_DIR") {
            if !dir.is_empty() {
                config.memory.data_dir = dir;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
