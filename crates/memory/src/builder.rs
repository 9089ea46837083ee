//! Batch correlation pass: replay the whole event history and materialize
//! memories for every pattern that clears its evidence threshold.
//!
//! Four pattern classes are tallied independently: food→symptom triggers
//! (24 h trailing window), treatment effectiveness, environmental
//! co-occurrence (pressure / moon phase / season), and time-of-day buckets.
//! Day-part and seasonal claims are noisy, so they use stricter thresholds
//! than the general minimum of two occurrences.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use soma_config::MemoryDetail;
use tracing::info;
use uuid::Uuid;

use crate::confidence::tier_confidence;
use crate::event::Event;
use crate::schema::{EnvDimension, MemoryKind, MemoryRecord, PatternFactor, RecentDates};

/// Trailing window within which a food is a candidate cause for a symptom.
pub const CORRELATION_WINDOW_HOURS: i64 = 24;

/// General evidence floor: a pattern seen fewer times than this is noise.
pub const MIN_OCCURRENCES: u32 = 2;

/// Stricter floor for day-part claims.
pub const MIN_TIME_OF_DAY_OCCURRENCES: u32 = MIN_OCCURRENCES + 1;

/// Stricter floor for seasonal claims.
pub const MIN_SEASON_OCCURRENCES: u32 = MIN_OCCURRENCES + 2;

/// Lunar patterns are treated as weaker evidence than the tier table implies.
const MOON_CONFIDENCE_DISCOUNT: f32 = 0.8;

/// Pressure readings in this category carry no signal.
const PRESSURE_BASELINE: &str = "Normal";

#[derive(Debug, Default)]
struct PairTally {
    /// First-seen display casing for the factor and the symptom.
    factor_label: String,
    symptom_label: String,
    count: u32,
    dates: Vec<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct RemedyTally {
    treatment_label: String,
    symptom_label: String,
    successes: u32,
    failures: u32,
    dates: Vec<DateTime<Utc>>,
}

/// Batch memory builder.  Pure over its inputs: same history and same `now`
/// produce the same set of counts and confidences.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBuilder {
    detail: MemoryDetail,
}

impl MemoryBuilder {
    pub fn new(detail: MemoryDetail) -> Self {
        Self { detail }
    }

    /// Run all four pattern passes over a chronologically-sorted history.
    pub fn build(&self, events: &[Event], now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let mut records = Vec::new();
        records.extend(self.build_triggers(events, now));
        records.extend(self.build_treatments(events, now));
        records.extend(self.build_environment(events, now));
        records.extend(self.build_time_of_day(events, now));
        info!(
            events = events.len(),
            memories = records.len(),
            "batch correlation pass complete"
        );
        records
    }

    // ── Trigger correlation ───────────────────────────────────────────────

    fn build_triggers(&self, events: &[Event], now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let window = Duration::hours(CORRELATION_WINDOW_HOURS);
        let mut tallies: BTreeMap<(String, String), PairTally> = BTreeMap::new();

        for (i, event) in events.iter().enumerate() {
            if event.symptoms.is_empty() {
                continue;
            }

            // Candidate foods: anything eaten in the trailing window, plus the
            // event's own food field.  Deduplicated so one food counts once
            // per symptom event.
            let mut candidates: Vec<&str> = Vec::new();
            for prior in events[..i].iter().rev() {
                if event.occurred_at - prior.occurred_at > window {
                    break;
                }
                if let Some(food) = prior.food_item.as_deref() {
                    if !candidates.iter().any(|c| c.eq_ignore_ascii_case(food)) {
                        candidates.push(food);
                    }
                }
            }
            if let Some(food) = event.food_item.as_deref() {
                if !candidates.iter().any(|c| c.eq_ignore_ascii_case(food)) {
                    candidates.push(food);
                }
            }

            for food in candidates {
                for symptom in &event.symptoms {
                    let key = (food.to_lowercase(), symptom.to_lowercase());
                    let tally = tallies.entry(key).or_default();
                    if tally.count == 0 {
                        tally.factor_label = food.to_string();
                        tally.symptom_label = symptom.clone();
                    }
                    tally.count += 1;
                    tally.dates.push(event.occurred_at);
                }
            }
        }

        tallies
            .into_values()
            .filter(|t| t.count >= MIN_OCCURRENCES)
            .map(|t| {
                let kind = MemoryKind::Trigger {
                    trigger: t.factor_label,
                    symptom: t.symptom_label,
                };
                self.materialize(kind, t.count, tier_confidence(t.count), 0, 0, &t.dates, now)
            })
            .collect()
    }

    // ── Treatment effectiveness ───────────────────────────────────────────

    fn build_treatments(&self, events: &[Event], now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let mut tallies: BTreeMap<(String, String), RemedyTally> = BTreeMap::new();

        for event in events {
            for treatment in &event.treatments {
                for symptom in &event.symptoms {
                    let key = (treatment.name.to_lowercase(), symptom.to_lowercase());
                    let tally = tallies.entry(key).or_default();
                    if tally.successes + tally.failures == 0 {
                        tally.treatment_label = treatment.name.clone();
                        tally.symptom_label = symptom.clone();
                    }
                    if treatment.is_success() {
                        tally.successes += 1;
                    } else {
                        tally.failures += 1;
                    }
                    tally.dates.push(event.occurred_at);
                }
            }
        }

        tallies
            .into_values()
            .filter(|t| t.successes + t.failures >= MIN_OCCURRENCES)
            .map(|t| {
                let total = t.successes + t.failures;
                let kind = if t.successes > t.failures {
                    MemoryKind::WorkedRemedy {
                        resolution: t.treatment_label,
                        symptom: t.symptom_label,
                        resolution_time: None,
                    }
                } else {
                    MemoryKind::FailedRemedy {
                        resolution: t.treatment_label,
                        symptom: t.symptom_label,
                    }
                };
                self.materialize(
                    kind,
                    total,
                    tier_confidence(total),
                    t.successes,
                    t.failures,
                    &t.dates,
                    now,
                )
            })
            .collect()
    }

    // ── Environmental patterns ────────────────────────────────────────────

    fn build_environment(&self, events: &[Event], now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let mut tallies: BTreeMap<(EnvDimension, String, String), PairTally> = BTreeMap::new();

        for event in events {
            if event.symptoms.is_empty() {
                continue;
            }
            let mut factors: Vec<(EnvDimension, &str)> = Vec::new();
            if let Some(pressure) = event.environment.pressure.as_deref() {
                if !pressure.eq_ignore_ascii_case(PRESSURE_BASELINE) {
                    factors.push((EnvDimension::Pressure, pressure));
                }
            }
            if let Some(moon) = event.environment.moon_phase.as_deref() {
                factors.push((EnvDimension::MoonPhase, moon));
            }
            if let Some(season) = event.environment.season.as_deref() {
                factors.push((EnvDimension::Season, season));
            }

            for (dimension, value) in factors {
                for symptom in &event.symptoms {
                    let key = (dimension, value.to_lowercase(), symptom.to_lowercase());
                    let tally = tallies.entry(key).or_default();
                    if tally.count == 0 {
                        tally.factor_label = value.to_string();
                        tally.symptom_label = symptom.clone();
                    }
                    tally.count += 1;
                    tally.dates.push(event.occurred_at);
                }
            }
        }

        tallies
            .into_iter()
            .filter(|((dimension, _, _), t)| {
                let minimum = match dimension {
                    EnvDimension::Season => MIN_SEASON_OCCURRENCES,
                    _ => MIN_OCCURRENCES,
                };
                t.count >= minimum
            })
            .map(|((dimension, _, _), t)| {
                let mut confidence = tier_confidence(t.count);
                if dimension == EnvDimension::MoonPhase {
                    confidence *= MOON_CONFIDENCE_DISCOUNT;
                }
                let kind = MemoryKind::Pattern {
                    symptom: t.symptom_label,
                    factor: PatternFactor::Environmental {
                        dimension,
                        value: t.factor_label,
                    },
                };
                self.materialize(kind, t.count, confidence, 0, 0, &t.dates, now)
            })
            .collect()
    }

    // ── Time-of-day patterns ──────────────────────────────────────────────

    fn build_time_of_day(&self, events: &[Event], now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let mut tallies: BTreeMap<(String, String), PairTally> = BTreeMap::new();

        for event in events {
            let bucket = event.time_of_day();
            for symptom in &event.symptoms {
                let key = (bucket.to_string(), symptom.to_lowercase());
                let tally = tallies.entry(key).or_default();
                if tally.count == 0 {
                    tally.factor_label = bucket.to_string();
                    tally.symptom_label = symptom.clone();
                }
                tally.count += 1;
                tally.dates.push(event.occurred_at);
            }
        }

        tallies
            .into_values()
            .filter(|t| t.count >= MIN_TIME_OF_DAY_OCCURRENCES)
            .map(|t| {
                let kind = MemoryKind::Pattern {
                    symptom: t.symptom_label,
                    factor: PatternFactor::TimeOfDay { bucket: t.factor_label },
                };
                self.materialize(kind, t.count, tier_confidence(t.count), 0, 0, &t.dates, now)
            })
            .collect()
    }

    // ── Materialization ───────────────────────────────────────────────────

    fn materialize(
        &self,
        kind: MemoryKind,
        occurrences: u32,
        confidence: f32,
        successes: u32,
        failures: u32,
        dates: &[DateTime<Utc>],
        now: DateTime<Utc>,
    ) -> MemoryRecord {
        let last_occurrence = dates.iter().max().copied().unwrap_or(now);
        let recent_dates = match self.detail {
            MemoryDetail::Detailed => RecentDates::from_ordered(dates.iter().copied()),
            MemoryDetail::Pattern => RecentDates::default(),
        };
        MemoryRecord {
            id: Uuid::new_v4(),
            kind,
            occurrence_count: occurrences,
            success_count: successes,
            failure_count: failures,
            last_occurrence,
            recent_dates,
            confidence: confidence.clamp(0.0, 1.0),
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
}
