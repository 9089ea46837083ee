//! Incremental, single-event learning: find-or-create-and-update.
//!
//! Unlike the batch builder, a single logged event is enough to seed a new
//! memory — the user already vouched for the correlation once by logging it.
//! Seeds start at [`SEED_CONFIDENCE`] with one occurrence, below the batch
//! materialization threshold.  Time-of-day patterns are deliberately
//! batch-only so one late night does not become a "Night pattern".

use chrono::{DateTime, Utc};
use soma_config::MemoryDetail;
use tracing::debug;

use crate::event::Event;
use crate::schema::{EnvDimension, MemoryKind, MemoryRecord, PatternFactor, SEED_CONFIDENCE};
use crate::store::MemoryStore;

/// What one incremental pass did, for logging and CLI display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub updated: usize,
    pub created: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryUpdater {
    detail: MemoryDetail,
}

impl MemoryUpdater {
    pub fn new(detail: MemoryDetail) -> Self {
        Self { detail }
    }

    /// Fold one new event into the store.
    pub fn apply<S: MemoryStore>(
        &self,
        store: &mut S,
        event: &Event,
        now: DateTime<Utc>,
    ) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        self.apply_triggers(store, event, now, &mut summary);
        self.apply_treatments(store, event, now, &mut summary);
        self.apply_environment(store, event, now, &mut summary);
        debug!(
            event = %event.id,
            updated = summary.updated,
            created = summary.created,
            "incremental memory update"
        );
        summary
    }

    fn seed_record(
        &self,
        kind: MemoryKind,
        event: &Event,
        now: DateTime<Utc>,
    ) -> MemoryRecord {
        let mut record = MemoryRecord::seed(kind, event.occurred_at, now);
        debug_assert_eq!(record.confidence, SEED_CONFIDENCE);
        if self.detail == MemoryDetail::Detailed {
            record.recent_dates.push(event.occurred_at);
        }
        record
    }

    fn apply_triggers<S: MemoryStore>(
        &self,
        store: &mut S,
        event: &Event,
        now: DateTime<Utc>,
        summary: &mut UpdateSummary,
    ) {
        let Some(food) = event.food_item.as_deref() else {
            return;
        };
        for symptom in &event.symptoms {
            match store.find_active_mut(&|r| r.kind.matches_trigger(food, symptom)) {
                Some(record) => {
                    record.record_occurrence(event.occurred_at, now);
                    summary.updated += 1;
                }
                None => {
                    let kind = MemoryKind::Trigger {
                        trigger: food.to_string(),
                        symptom: symptom.clone(),
                    };
                    store.create(self.seed_record(kind, event, now));
                    summary.created += 1;
                }
            }
        }
    }

    fn apply_treatments<S: MemoryStore>(
        &self,
        store: &mut S,
        event: &Event,
        now: DateTime<Utc>,
        summary: &mut UpdateSummary,
    ) {
        for treatment in &event.treatments {
            for symptom in &event.symptoms {
                let found =
                    store.find_active_mut(&|r| r.kind.matches_remedy(&treatment.name, symptom));
                match found {
                    Some(record) => {
                        record.record_occurrence(event.occurred_at, now);
                        if treatment.is_success() {
                            record.record_success(now);
                        } else {
                            record.record_failure(now);
                        }
                        summary.updated += 1;
                    }
                    None => {
                        let kind = if treatment.is_success() {
                            MemoryKind::WorkedRemedy {
                                resolution: treatment.name.clone(),
                                symptom: symptom.clone(),
                                resolution_time: None,
                            }
                        } else {
                            MemoryKind::FailedRemedy {
                                resolution: treatment.name.clone(),
                                symptom: symptom.clone(),
                            }
                        };
                        let mut record = self.seed_record(kind, event, now);
                        if treatment.is_success() {
                            record.record_success(now);
                        } else {
                            record.record_failure(now);
                        }
                        store.create(record);
                        summary.created += 1;
                    }
                }
            }
        }
    }

    fn apply_environment<S: MemoryStore>(
        &self,
        store: &mut S,
        event: &Event,
        now: DateTime<Utc>,
        summary: &mut UpdateSummary,
    ) {
        let mut factors: Vec<(EnvDimension, &str)> = Vec::new();
        if let Some(pressure) = event.environment.pressure.as_deref() {
            if !pressure.eq_ignore_ascii_case("Normal") {
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
                let found = store
                    .find_active_mut(&|r| r.kind.matches_environment(dimension, value, symptom));
                match found {
                    Some(record) => {
                        record.record_occurrence(event.occurred_at, now);
                        summary.updated += 1;
                    }
                    None => {
                        let kind = MemoryKind::Pattern {
                            symptom: symptom.clone(),
                            factor: PatternFactor::Environmental {
                                dimension,
                                value: value.to_string(),
                            },
                        };
                        store.create(self.seed_record(kind, event, now));
                        summary.created += 1;
                    }
                }
            }
        }
    }
}
