use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum per-occurrence dates kept on a single memory.
pub const RECENT_DATES_CAP: usize = 20;

/// Confidence assigned to a memory seeded by a single incremental observation,
/// before any recompute.
pub const SEED_CONFIDENCE: f32 = 0.3;

// ── Memory kind ───────────────────────────────────────────────────────────────

/// Which environmental dimension a pattern memory was learned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvDimension {
    Pressure,
    MoonPhase,
    Season,
}

impl EnvDimension {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pressure => "barometric pressure",
            Self::MoonPhase => "moon phase",
            Self::Season => "season",
        }
    }
}

/// The contextual factor a pattern memory links to a symptom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFactor {
    Environmental { dimension: EnvDimension, value: String },
    TimeOfDay { bucket: String },
}

/// What a memory asserts.  The context fields live inside the variant so a
/// trigger memory cannot exist without both a trigger and a symptom, a
/// pattern memory cannot exist without its factor, and so on.
///
/// | Kind           | Claim                                                    |
/// |----------------|----------------------------------------------------------|
/// | `Trigger`      | Consuming `trigger` tends to precede `symptom`.          |
/// | `WorkedRemedy` | `resolution` has relieved `symptom` more often than not. |
/// | `FailedRemedy` | `resolution` has not helped `symptom`.                   |
/// | `Pattern`      | `symptom` co-occurs with an environmental factor or time of day. |
/// | `Correlation`  | `left` and `right` symptoms tend to appear together.     |
/// | `Preference`   | A user-stated note about `subject`.                      |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryKind {
    Trigger {
        trigger: String,
        symptom: String,
    },
    WorkedRemedy {
        resolution: String,
        symptom: String,
        resolution_time: Option<String>,
    },
    FailedRemedy {
        resolution: String,
        symptom: String,
    },
    Pattern {
        symptom: String,
        factor: PatternFactor,
    },
    Correlation {
        left: String,
        right: String,
    },
    Preference {
        subject: String,
        note: String,
    },
}

impl MemoryKind {
    /// The symptom this memory is about, when it has exactly one.
    pub fn symptom(&self) -> Option<&str> {
        match self {
            Self::Trigger { symptom, .. }
            | Self::WorkedRemedy { symptom, .. }
            | Self::FailedRemedy { symptom, .. }
            | Self::Pattern { symptom, .. } => Some(symptom),
            Self::Correlation { .. } | Self::Preference { .. } => None,
        }
    }

    /// Success/failure counters are only meaningful for remedy kinds.
    pub fn is_remedy(&self) -> bool {
        matches!(self, Self::WorkedRemedy { .. } | Self::FailedRemedy { .. })
    }

    /// Case-insensitive match against a (trigger, symptom) pair.
    pub fn matches_trigger(&self, trigger: &str, symptom: &str) -> bool {
        match self {
            Self::Trigger { trigger: t, symptom: s } => {
                t.eq_ignore_ascii_case(trigger) && s.eq_ignore_ascii_case(symptom)
            }
            _ => false,
        }
    }

    /// Case-insensitive match against a (treatment, symptom) pair.
    pub fn matches_remedy(&self, resolution: &str, symptom: &str) -> bool {
        match self {
            Self::WorkedRemedy { resolution: r, symptom: s, .. }
            | Self::FailedRemedy { resolution: r, symptom: s } => {
                r.eq_ignore_ascii_case(resolution) && s.eq_ignore_ascii_case(symptom)
            }
            _ => false,
        }
    }

    /// Match against an environmental (dimension, value, symptom) triple.
    pub fn matches_environment(&self, dimension: EnvDimension, value: &str, symptom: &str) -> bool {
        match self {
            Self::Pattern {
                symptom: s,
                factor: PatternFactor::Environmental { dimension: d, value: v },
            } => *d == dimension && v.eq_ignore_ascii_case(value) && s.eq_ignore_ascii_case(symptom),
            _ => false,
        }
    }

    /// Whether two kinds describe the same learned association, compared
    /// case-insensitively on their key fields.  Used when a batch rebuild
    /// reconciles against records the incremental updater already seeded.
    pub fn same_association(&self, other: &MemoryKind) -> bool {
        match other {
            Self::Trigger { trigger, symptom } => self.matches_trigger(trigger, symptom),
            Self::WorkedRemedy { resolution, symptom, .. }
            | Self::FailedRemedy { resolution, symptom } => {
                self.matches_remedy(resolution, symptom)
            }
            Self::Pattern {
                symptom,
                factor: PatternFactor::Environmental { dimension, value },
            } => self.matches_environment(*dimension, value, symptom),
            Self::Pattern { symptom, factor: PatternFactor::TimeOfDay { bucket } } => {
                matches!(
                    self,
                    Self::Pattern { symptom: s, factor: PatternFactor::TimeOfDay { bucket: b } }
                        if s.eq_ignore_ascii_case(symptom) && b.eq_ignore_ascii_case(bucket)
                )
            }
            Self::Correlation { left, right } => matches!(
                self,
                Self::Correlation { left: l, right: r }
                    if l.eq_ignore_ascii_case(left) && r.eq_ignore_ascii_case(right)
            ),
            Self::Preference { subject, .. } => matches!(
                self,
                Self::Preference { subject: s, .. } if s.eq_ignore_ascii_case(subject)
            ),
        }
    }

    /// Kebab-case slug used for stats and log lines.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Trigger { .. } => "trigger",
            Self::WorkedRemedy { .. } => "worked-remedy",
            Self::FailedRemedy { .. } => "failed-remedy",
            Self::Pattern { .. } => "pattern",
            Self::Correlation { .. } => "correlation",
            Self::Preference { .. } => "preference",
        }
    }
}

// ── Bounded date history ──────────────────────────────────────────────────────

/// Ring buffer of the most recent contributing dates, capped at
/// [`RECENT_DATES_CAP`].  Appending past the cap evicts the oldest entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentDates {
    dates: VecDeque<DateTime<Utc>>,
}

impl RecentDates {
    pub fn push(&mut self, date: DateTime<Utc>) {
        if self.dates.len() == RECENT_DATES_CAP {
            self.dates.pop_front();
        }
        self.dates.push_back(date);
    }

    /// Build from an ordered sequence, keeping only the most recent
    /// [`RECENT_DATES_CAP`] entries.
    pub fn from_ordered<I: IntoIterator<Item = DateTime<Utc>>>(dates: I) -> Self {
        let mut out = Self::default();
        for date in dates {
            out.push(date);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.dates.iter()
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.dates.back().copied()
    }
}

// ── User feedback ─────────────────────────────────────────────────────────────

/// User reaction to a surfaced memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Helped,
    DidntHelp,
    NotSureYet,
    NotRelevant,
}

// ── Memory record ─────────────────────────────────────────────────────────────

/// One learned, confidence-scored association.  Never deleted; retired via
/// `is_active = false` so the health audit can still see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: MemoryKind,
    pub occurrence_count: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub last_occurrence: DateTime<Utc>,
    #[serde(default)]
    pub recent_dates: RecentDates,
    /// Heuristic trust score, always clamped to `[0, 1]`.
    pub confidence: f32,
    pub user_confirmed: bool,
    pub user_denied: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub last_shown: Option<DateTime<Utc>>,
    pub consecutive_ignores: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Seed a memory from a single observation at `occurred`, recorded at `now`.
    pub fn seed(kind: MemoryKind, occurred: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            occurrence_count: 1,
            success_count: 0,
            failure_count: 0,
            last_occurrence: occurred,
            recent_dates: RecentDates::default(),
            confidence: SEED_CONFIDENCE,
            user_confirmed: false,
            user_denied: false,
            is_active: true,
            created_at: now,
            last_updated: now,
            last_shown: None,
            consecutive_ignores: 0,
            cooldown_until: None,
        }
    }

    /// First 8 characters of the UUID, used as a compact display identifier.
    pub fn id_short(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}
