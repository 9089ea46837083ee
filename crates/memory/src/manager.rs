use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::builder::MemoryBuilder;
use crate::event::Event;
use crate::schema::{Feedback, MemoryKind, MemoryRecord};
use crate::store::{InMemoryStore, MemoryStore};
use crate::updater::{MemoryUpdater, UpdateSummary};

/// Per-kind record counts for stats displays and log lines.
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub total: usize,
    pub active: usize,
    pub triggers: usize,
    pub worked_remedies: usize,
    pub failed_remedies: usize,
    pub patterns: usize,
    pub correlations: usize,
    pub preferences: usize,
}

/// What a maintenance pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Records whose confidence was NaN or out of `[0, 1]`, reset to 0.5.
    pub repaired_confidence: usize,
    /// Expired cooldown windows cleared.
    pub cooldowns_cleared: usize,
}

/// Serialized manager state: the record set plus the maintenance stamp.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    last_maintenance: Option<DateTime<Utc>>,
    records: Vec<MemoryRecord>,
}

/// Owns the memory store and the two pieces of cross-cutting state the core
/// needs: the learning-pause flag and the maintenance gate.  Single-writer by
/// design; readers take consistent snapshots at the storage boundary.
#[derive(Debug, Default)]
pub struct MemoryManager {
    store: InMemoryStore,
    learning_paused: bool,
    last_maintenance: Option<DateTime<Utc>>,
}

impl MemoryManager {
    pub fn from_store(store: InMemoryStore) -> Self {
        Self { store, learning_paused: false, last_maintenance: None }
    }

    /// Load a snapshot written by [`MemoryManager::save_to`].  A missing file
    /// yields an empty manager.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        let manager = Self {
            store: InMemoryStore::from_records(snapshot.records),
            learning_paused: false,
            last_maintenance: snapshot.last_maintenance,
        };
        info!(
            records = manager.store.len(),
            path = %path.display(),
            "memory snapshot loaded"
        );
        Ok(manager)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = Snapshot {
            last_maintenance: self.last_maintenance,
            records: self.store.all().to_vec(),
        };
        let rendered = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut InMemoryStore {
        &mut self.store
    }

    // ── Learning pause ─────────────────────────────────────────────────────

    /// While paused, insight queries keep working but observe_event is a no-op.
    /// A decoupling, not a lock: reads continue while writes are skipped.
    pub fn set_learning_paused(&mut self, paused: bool) {
        self.learning_paused = paused;
    }

    pub fn learning_paused(&self) -> bool {
        self.learning_paused
    }

    // ── Learning entry points ──────────────────────────────────────────────

    /// Fold one event into memory, unless learning is paused.
    pub fn observe_event(
        &mut self,
        updater: &MemoryUpdater,
        event: &Event,
        now: DateTime<Utc>,
    ) -> Option<UpdateSummary> {
        if self.learning_paused {
            debug!(event = %event.id, "learning paused — event logged but not learned from");
            return None;
        }
        Some(updater.apply(&mut self.store, event, now))
    }

    /// Rerun the batch builder over the full history, reconciling with
    /// whatever the incremental updater already seeded: an existing active
    /// record for the same association is overwritten with the batch counts
    /// and confidence rather than duplicated.
    pub fn rebuild_from_history(
        &mut self,
        builder: &MemoryBuilder,
        events: &[Event],
        now: DateTime<Utc>,
    ) -> usize {
        let built = builder.build(events, now);
        let total = built.len();
        let mut replaced = 0usize;
        for record in built {
            let existing = self
                .store
                .find_active_mut(&|r| r.kind.same_association(&record.kind));
            match existing {
                Some(slot) => {
                    slot.kind = record.kind;
                    slot.occurrence_count = record.occurrence_count;
                    slot.success_count = record.success_count;
                    slot.failure_count = record.failure_count;
                    slot.last_occurrence = record.last_occurrence;
                    slot.recent_dates = record.recent_dates;
                    slot.confidence = record.confidence;
                    slot.last_updated = now;
                    replaced += 1;
                }
                None => {
                    self.store.create(record);
                }
            }
        }
        info!(built = total, reconciled = replaced, "batch rebuild applied");
        total
    }

    // ── Feedback and display state ─────────────────────────────────────────

    pub fn record_feedback(&mut self, id: Uuid, feedback: Feedback, now: DateTime<Utc>) -> bool {
        match self.store.get_mut(id) {
            Some(record) => {
                record.apply_feedback(feedback, now);
                true
            }
            None => false,
        }
    }

    pub fn mark_shown(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        match self.store.get_mut(id) {
            Some(record) => {
                record.record_shown(now);
                true
            }
            None => false,
        }
    }

    pub fn mark_ignored(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        match self.store.get_mut(id) {
            Some(record) => {
                record.record_ignored(now);
                true
            }
            None => false,
        }
    }

    // ── Maintenance ────────────────────────────────────────────────────────

    /// Idempotent health pass: repair invalid confidence values and clear
    /// expired cooldowns.  Gated to at most once per `interval_hours` unless
    /// `force` is set; returns `None` when the gate holds it back.
    pub fn run_maintenance(
        &mut self,
        interval_hours: u64,
        force: bool,
        now: DateTime<Utc>,
    ) -> Option<MaintenanceReport> {
        if !force {
            if let Some(last) = self.last_maintenance {
                if now - last < Duration::hours(interval_hours as i64) {
                    debug!(
                        last_run = %last,
                        "maintenance skipped — ran within the minimum interval"
                    );
                    return None;
                }
            }
        }

        let mut report = MaintenanceReport::default();
        for id in self.store.all().iter().map(|r| r.id).collect::<Vec<_>>() {
            let Some(record) = self.store.get_mut(id) else { continue };

            // Invalid confidence is a data-health condition, not an error:
            // auto-correct by resetting to the neutral midpoint.
            if !record.confidence.is_finite() || !(0.0..=1.0).contains(&record.confidence) {
                record.confidence = 0.5;
                record.last_updated = now;
                report.repaired_confidence += 1;
            }

            if record.cooldown_until.is_some_and(|until| until <= now) {
                record.cooldown_until = None;
                record.last_updated = now;
                report.cooldowns_cleared += 1;
            }
        }

        self.last_maintenance = Some(now);
        info!(
            repaired = report.repaired_confidence,
            cooldowns_cleared = report.cooldowns_cleared,
            forced = force,
            "maintenance pass complete"
        );
        Some(report)
    }

    pub fn last_maintenance(&self) -> Option<DateTime<Utc>> {
        self.last_maintenance
    }

    // ── Stats ──────────────────────────────────────────────────────────────

    pub fn stats(&self) -> MemoryStats {
        let mut s = MemoryStats { total: self.store.len(), ..Default::default() };
        for record in self.store.all() {
            if record.is_active {
                s.active += 1;
            }
            match record.kind {
                MemoryKind::Trigger { .. } => s.triggers += 1,
                MemoryKind::WorkedRemedy { .. } => s.worked_remedies += 1,
                MemoryKind::FailedRemedy { .. } => s.failed_remedies += 1,
                MemoryKind::Pattern { .. } => s.patterns += 1,
                MemoryKind::Correlation { .. } => s.correlations += 1,
                MemoryKind::Preference { .. } => s.preferences += 1,
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use soma_config::MemoryDetail;

    use crate::builder::MemoryBuilder;
    use crate::event::Event;
    use crate::schema::Feedback;
    use crate::store::MemoryStore;
    use crate::updater::MemoryUpdater;

    use super::MemoryManager;

    fn food_event(food: &str, symptom: &str) -> Event {
        let mut e = Event::new(Utc::now());
        e.food_item = Some(food.to_string());
        e.symptoms = vec![symptom.to_string()];
        e.severity = 2;
        e
    }

    #[test]
    fn paused_learning_skips_updates_but_not_queries() {
        let mut manager = MemoryManager::default();
        let updater = MemoryUpdater::new(MemoryDetail::Detailed);
        let now = Utc::now();

        manager.observe_event(&updater, &food_event("wine", "headache"), now);
        manager.set_learning_paused(true);
        let skipped = manager.observe_event(&updater, &food_event("cheese", "headache"), now);

        assert!(skipped.is_none());
        assert_eq!(manager.store().all().len(), 1);
        // Reads still work while paused.
        assert_eq!(manager.store().active().len(), 1);
    }

    #[test]
    fn maintenance_gate_holds_within_the_interval_unless_forced() {
        let mut manager = MemoryManager::default();
        let now = Utc::now();

        assert!(manager.run_maintenance(24, false, now).is_some());
        assert!(manager.run_maintenance(24, false, now + Duration::hours(2)).is_none());
        assert!(manager.run_maintenance(24, true, now + Duration::hours(2)).is_some());
        assert!(manager.run_maintenance(24, false, now + Duration::hours(30)).is_some());
    }

    #[test]
    fn maintenance_repairs_invalid_confidence_and_expired_cooldowns() {
        let mut manager = MemoryManager::default();
        let updater = MemoryUpdater::new(MemoryDetail::Detailed);
        let now = Utc::now();
        manager.observe_event(&updater, &food_event("wine", "headache"), now);
        manager.observe_event(&updater, &food_event("cheese", "nausea"), now);

        {
            let record = manager.store_mut().find_active_mut(&|_| true).unwrap();
            record.confidence = f32::NAN;
        }
        {
            let record = manager
                .store_mut()
                .find_active_mut(&|r| r.kind.matches_trigger("cheese", "nausea"))
                .unwrap();
            record.cooldown_until = Some(now - Duration::hours(1));
        }

        let report = manager.run_maintenance(24, false, now).unwrap();
        assert_eq!(report.repaired_confidence, 1);
        assert_eq!(report.cooldowns_cleared, 1);
        assert!(manager.store().all().iter().all(|r| (0.0..=1.0).contains(&r.confidence)));

        // Idempotent: a forced second pass finds nothing to repair.
        let second = manager.run_maintenance(24, true, now).unwrap();
        assert_eq!(second.repaired_confidence, 0);
        assert_eq!(second.cooldowns_cleared, 0);
    }

    #[test]
    fn rebuild_reconciles_with_incrementally_seeded_records() {
        let mut manager = MemoryManager::default();
        let updater = MemoryUpdater::new(MemoryDetail::Detailed);
        let now = Utc::now();

        // Seed incrementally, then replay a history where the same pair
        // occurred three times.
        let mut events = Vec::new();
        for i in 0..3 {
            let mut e = food_event("wine", "headache");
            e.occurred_at = now - Duration::days(10 - i);
            events.push(e);
        }
        manager.observe_event(&updater, &events[2], now);
        assert_eq!(manager.store().all().len(), 1);

        let builder = MemoryBuilder::new(MemoryDetail::Detailed);
        manager.rebuild_from_history(&builder, &events, now);

        assert_eq!(manager.store().all().len(), 1, "no duplicate for the same pair");
        let record = &manager.store().all()[0];
        assert_eq!(record.occurrence_count, 3);
        assert_eq!(record.confidence, 0.4);
    }

    #[test]
    fn snapshot_round_trip_preserves_maintenance_stamp() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("memory.json");
        let now = Utc::now();

        let mut manager = MemoryManager::default();
        let updater = MemoryUpdater::new(MemoryDetail::Detailed);
        manager.observe_event(&updater, &food_event("wine", "headache"), now);
        manager.run_maintenance(24, false, now);
        manager.save_to(&path)?;

        let loaded = MemoryManager::load_from(&path)?;
        assert_eq!(loaded.store().all().len(), 1);
        assert_eq!(loaded.last_maintenance(), manager.last_maintenance());
        Ok(())
    }

    #[test]
    fn feedback_routes_to_the_right_record() {
        let mut manager = MemoryManager::default();
        let updater = MemoryUpdater::new(MemoryDetail::Detailed);
        let now = Utc::now();
        manager.observe_event(&updater, &food_event("wine", "headache"), now);
        let id = manager.store().all()[0].id;

        assert!(manager.record_feedback(id, Feedback::Helped, now));
        assert!(manager.store().all()[0].user_confirmed);
        assert!(!manager.record_feedback(uuid::Uuid::new_v4(), Feedback::Helped, now));
    }

    #[test]
    fn repeated_ignores_push_a_memory_into_cooldown() {
        let mut manager = MemoryManager::default();
        let updater = MemoryUpdater::new(MemoryDetail::Detailed);
        let now = Utc::now();
        manager.observe_event(&updater, &food_event("wine", "headache"), now);
        let id = manager.store().all()[0].id;

        for _ in 0..3 {
            assert!(manager.mark_ignored(id, now));
        }
        let record = &manager.store().all()[0];
        assert_eq!(record.consecutive_ignores, 3);
        assert!(record.is_in_cooldown(now));

        assert!(!manager.mark_ignored(uuid::Uuid::new_v4(), now));
    }

    #[test]
    fn stats_count_per_kind() {
        let mut manager = MemoryManager::default();
        let updater = MemoryUpdater::new(MemoryDetail::Detailed);
        let now = Utc::now();
        manager.observe_event(&updater, &food_event("wine", "headache"), now);

        let mut with_treatment = Event::new(now);
        with_treatment.symptoms = vec!["migraine".to_string()];
        with_treatment.treatments =
            vec![crate::event::TreatmentUse { name: "rest".to_string(), effectiveness: 9 }];
        manager.observe_event(&updater, &with_treatment, now);

        let stats = manager.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.triggers, 1);
        assert_eq!(stats.worked_remedies, 1);
        assert_eq!(stats.active, 2);
    }
}
