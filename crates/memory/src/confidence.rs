//! Confidence scoring and time decay for [`MemoryRecord`].
//!
//! Scoring model (deterministic, clamped to `[0, 1]`):
//! ```text
//! confidence = 0.3 (base)
//!            + occurrence bonus   (≥10 → 0.3, ≥5 → 0.2, ≥3 → 0.1)
//!            + effectiveness bonus (remedy kinds: ratio ≥0.7 → 0.3, ≥0.5 → 0.15)
//!            + user feedback      (confirmed → +0.1, denied → −0.2)
//! ```
//! Decay halves nothing abruptly: `decayed = max(0.15, c · e^(−days/180))`.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::schema::{Feedback, MemoryRecord};

/// Decayed confidence never falls below this floor.
pub const DECAY_FLOOR: f32 = 0.15;

/// Exponential decay time constant, in days.
pub const DECAY_DAYS: f32 = 180.0;

/// A memory with no occurrence in this many days is stale.
pub const STALE_AFTER_DAYS: f32 = 180.0;

/// A memory with an occurrence within this many days has recent data.
pub const RECENT_WITHIN_DAYS: f32 = 90.0;

/// Extra penalty applied on "not relevant" feedback, on top of the denial term.
const NOT_RELEVANT_PENALTY: f32 = 0.25;

/// "Not relevant" feedback retires the memory when confidence ends up at or
/// below this value.
const NOT_RELEVANT_DEACTIVATION_CEILING: f32 = 0.2;

/// Occurrence-tier confidence used by the batch builder when materializing a
/// record from tallied co-occurrences.
pub fn tier_confidence(occurrences: u32) -> f32 {
    match occurrences {
        0..=1 => 0.2,
        2..=4 => 0.4,
        5..=9 => 0.6,
        10..=19 => 0.8,
        _ => 0.9,
    }
}

impl MemoryRecord {
    /// Ratio of successes to total trials; `0.5` when there are no trials yet.
    pub fn success_ratio(&self) -> f32 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.5
        } else {
            self.success_count as f32 / total as f32
        }
    }

    /// Recompute `confidence` from counts and user feedback.
    pub fn recompute_confidence(&mut self) {
        let mut score = 0.3_f32;

        score += match self.occurrence_count {
            n if n >= 10 => 0.3,
            n if n >= 5 => 0.2,
            n if n >= 3 => 0.1,
            _ => 0.0,
        };

        if self.kind.is_remedy() {
            let ratio = self.success_ratio();
            if ratio >= 0.7 {
                score += 0.3;
            } else if ratio >= 0.5 {
                score += 0.15;
            }
        }

        if self.user_confirmed {
            score += 0.1;
        }
        if self.user_denied {
            score -= 0.2;
        }

        self.confidence = score.clamp(0.0, 1.0);
    }

    /// Record one more supporting occurrence at `occurred`, stamping
    /// `last_updated = now`.
    pub fn record_occurrence(&mut self, occurred: DateTime<Utc>, now: DateTime<Utc>) {
        self.occurrence_count += 1;
        self.last_occurrence = occurred;
        self.recent_dates.push(occurred);
        self.recompute_confidence();
        self.last_updated = now;
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.success_count += 1;
        self.recompute_confidence();
        self.last_updated = now;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failure_count += 1;
        self.recompute_confidence();
        self.last_updated = now;
    }

    /// Explicit user confirmation: clears any denial and nudges confidence up.
    pub fn confirm_by_user(&mut self, now: DateTime<Utc>) {
        self.user_confirmed = true;
        self.user_denied = false;
        self.confidence = (self.confidence + 0.1).min(1.0);
        self.last_updated = now;
    }

    /// Explicit user denial: clears any confirmation and pushes confidence down.
    pub fn deny_by_user(&mut self, now: DateTime<Utc>) {
        self.user_denied = true;
        self.user_confirmed = false;
        self.confidence = (self.confidence - 0.2).max(0.0);
        self.last_updated = now;
    }

    /// Apply one piece of user feedback to this memory.
    ///
    /// `Helped` reinforces and clears any cooldown; `DidntHelp` counts a
    /// failure and an ignore; `NotSureYet` is a no-op; `NotRelevant` denies,
    /// applies an extra penalty, and retires the memory when the resulting
    /// confidence is at or below 0.2.
    pub fn apply_feedback(&mut self, feedback: Feedback, now: DateTime<Utc>) {
        match feedback {
            Feedback::Helped => {
                self.record_success(now);
                self.confirm_by_user(now);
                self.reset_cooldown();
            }
            Feedback::DidntHelp => {
                self.record_failure(now);
                self.record_ignored(now);
            }
            Feedback::NotSureYet => {}
            Feedback::NotRelevant => {
                self.deny_by_user(now);
                self.confidence = (self.confidence - NOT_RELEVANT_PENALTY).max(0.0);
                self.record_ignored(now);
                if self.confidence <= NOT_RELEVANT_DEACTIVATION_CEILING {
                    self.is_active = false;
                    debug!(
                        id = %self.id_short(),
                        kind = self.kind.slug(),
                        confidence = self.confidence,
                        "memory retired after not-relevant feedback"
                    );
                }
            }
        }
    }

    /// Fractional days since the last supporting occurrence (never negative).
    pub fn days_since_last_occurrence(&self, now: DateTime<Utc>) -> f32 {
        let secs = (now - self.last_occurrence).num_seconds().max(0) as f32;
        secs / 86_400.0
    }

    /// Confidence discounted by elapsed time since the last occurrence,
    /// floored at [`DECAY_FLOOR`] so old memories fade but never vanish.
    pub fn decayed_confidence(&self, now: DateTime<Utc>) -> f32 {
        let days = self.days_since_last_occurrence(now);
        (self.confidence * (-days / DECAY_DAYS).exp()).max(DECAY_FLOOR)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.days_since_last_occurrence(now) > STALE_AFTER_DAYS
    }

    pub fn has_recent_data(&self, now: DateTime<Utc>) -> bool {
        self.days_since_last_occurrence(now) <= RECENT_WITHIN_DAYS
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::schema::{Feedback, MemoryKind, MemoryRecord};

    use super::tier_confidence;

    fn trigger(now: chrono::DateTime<Utc>) -> MemoryRecord {
        MemoryRecord::seed(
            MemoryKind::Trigger {
                trigger: "wine".to_string(),
                symptom: "headache".to_string(),
            },
            now,
            now,
        )
    }

    fn remedy(now: chrono::DateTime<Utc>) -> MemoryRecord {
        MemoryRecord::seed(
            MemoryKind::WorkedRemedy {
                resolution: "magnesium".to_string(),
                symptom: "migraine".to_string(),
                resolution_time: None,
            },
            now,
            now,
        )
    }

    #[test]
    fn tier_table_matches_occurrence_bands() {
        assert_eq!(tier_confidence(1), 0.2);
        assert_eq!(tier_confidence(2), 0.4);
        assert_eq!(tier_confidence(4), 0.4);
        assert_eq!(tier_confidence(5), 0.6);
        assert_eq!(tier_confidence(9), 0.6);
        assert_eq!(tier_confidence(10), 0.8);
        assert_eq!(tier_confidence(19), 0.8);
        assert_eq!(tier_confidence(20), 0.9);
        assert_eq!(tier_confidence(100), 0.9);
    }

    #[test]
    fn effective_remedy_scores_point_eight() {
        // 6 successes / 1 failure: ratio ≈ 0.857.  Base 0.3 + occurrence
        // (≥5 → 0.2) + effectiveness (≥0.7 → 0.3) = 0.8.
        let now = Utc::now();
        let mut rec = remedy(now);
        rec.occurrence_count = 7;
        rec.success_count = 6;
        rec.failure_count = 1;
        rec.recompute_confidence();
        assert!((rec.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn remedy_with_no_trials_gets_the_middling_ratio_bonus() {
        let now = Utc::now();
        let mut rec = remedy(now);
        rec.occurrence_count = 1;
        rec.recompute_confidence();
        // Ratio defaults to 0.5 → +0.15 on top of base 0.3.
        assert!((rec.confidence - 0.45).abs() < 1e-6);
        assert_eq!(rec.success_ratio(), 0.5);
    }

    #[test]
    fn confidence_is_always_clamped() {
        let now = Utc::now();
        let mut rec = remedy(now);
        rec.occurrence_count = 50;
        rec.success_count = 50;
        rec.user_confirmed = true;
        rec.recompute_confidence();
        assert!(rec.confidence <= 1.0);

        let mut low = trigger(now);
        low.user_denied = true;
        low.recompute_confidence();
        assert!(low.confidence >= 0.0);
    }

    #[test]
    fn record_occurrence_updates_count_dates_and_stamp() {
        let start = Utc::now();
        let later = start + Duration::hours(5);
        let mut rec = trigger(start);
        rec.record_occurrence(later, later);
        assert_eq!(rec.occurrence_count, 2);
        assert_eq!(rec.last_occurrence, later);
        assert_eq!(rec.recent_dates.latest(), Some(later));
        assert_eq!(rec.last_updated, later);
    }

    #[test]
    fn confirm_and_deny_are_mutually_exclusive() {
        let now = Utc::now();
        let mut rec = trigger(now);
        rec.confirm_by_user(now);
        assert!(rec.user_confirmed && !rec.user_denied);
        rec.deny_by_user(now);
        assert!(rec.user_denied && !rec.user_confirmed);
    }

    #[test]
    fn decay_floors_at_point_fifteen() {
        // confidence 0.8 at 360 days: 0.8·e^(−2) ≈ 0.108 → floored to 0.15.
        let now = Utc::now();
        let mut rec = trigger(now - Duration::days(360));
        rec.confidence = 0.8;
        let decayed = rec.decayed_confidence(now);
        assert!((decayed - 0.15).abs() < 1e-6);
        assert!(rec.is_stale(now));
        assert!(!rec.has_recent_data(now));
    }

    #[test]
    fn decayed_confidence_never_exceeds_raw_confidence() {
        let now = Utc::now();
        let mut rec = trigger(now - Duration::days(30));
        rec.confidence = 0.9;
        let decayed = rec.decayed_confidence(now);
        assert!(decayed <= rec.confidence);
        assert!(decayed >= 0.15);
    }

    #[test]
    fn helped_feedback_reinforces_and_clears_cooldown() {
        let now = Utc::now();
        let mut rec = remedy(now);
        rec.consecutive_ignores = 4;
        rec.cooldown_until = Some(now + Duration::hours(48));
        rec.apply_feedback(Feedback::Helped, now);
        assert_eq!(rec.success_count, 1);
        assert!(rec.user_confirmed);
        assert_eq!(rec.consecutive_ignores, 0);
        assert!(rec.cooldown_until.is_none());
    }

    #[test]
    fn not_sure_yet_changes_nothing() {
        let now = Utc::now();
        let mut rec = trigger(now);
        let before = rec.clone();
        rec.apply_feedback(Feedback::NotSureYet, now);
        assert_eq!(rec, before);
    }

    #[test]
    fn not_relevant_retires_low_confidence_memories() {
        let now = Utc::now();
        let mut rec = trigger(now);
        // Seed confidence 0.3: deny (−0.2) then penalty (−0.25) → 0.0 ≤ 0.2.
        rec.apply_feedback(Feedback::NotRelevant, now);
        assert!(!rec.is_active);
        assert!(rec.user_denied);
        assert_eq!(rec.consecutive_ignores, 1);
    }

    #[test]
    fn not_relevant_keeps_well_evidenced_memories_active() {
        let now = Utc::now();
        let mut rec = trigger(now);
        rec.occurrence_count = 12;
        rec.user_confirmed = true;
        rec.recompute_confidence();
        // 0.3 + 0.3 + 0.1 = 0.7; deny → 0.5, penalty → 0.25 > 0.2.
        rec.apply_feedback(Feedback::NotRelevant, now);
        assert!(rec.is_active);
        assert!((rec.confidence - 0.25).abs() < 1e-6);
    }
}
