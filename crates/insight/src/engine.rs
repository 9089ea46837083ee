//! The insight pipeline.
//!
//! Nine stages over [new event + active memories + recent history], each
//! filtered by the configured suggestion level's confidence threshold,
//! except food-safety and escalation warnings which always surface.
//! The engine is pure over its inputs; show/ignore bookkeeping happens in
//! the memory manager using the `memory_id`s attached to the output.

use chrono::{DateTime, Duration, Utc};
use soma_config::SuggestionLevel;
use soma_memory::{Event, MemoryKind, MemoryRecord, PatternFactor};
use tracing::debug;
use uuid::Uuid;

use crate::escalation::{self, EscalationRule};
use crate::questions::adaptive_questions;
use crate::response::{
    ConfidenceLevel, Observation, Response, Suggestion, Warning, WarningSeverity,
};
use crate::safety::{AllergyListSafety, FoodSafetyCheck, SafetyStatus};
use crate::screening::screening_mentions;
use crate::windows::{max_window_hours, window_hours_for};

/// Absolute floor for what-worked suggestions, applied on top of the level's
/// own threshold whenever that is lower.
const SUGGESTION_MIN_CONFIDENCE: f32 = 0.4;

/// Top remedies surfaced per symptom.
const SUGGESTIONS_PER_SYMPTOM: usize = 2;

/// Effectiveness percentage is only quoted once a remedy has this many trials.
const EFFECTIVENESS_MIN_TRIALS: u32 = 3;

/// The generic needs-more-data message fires when every matching memory has
/// decayed below this.
const NEEDS_MORE_DATA_CONFIDENCE: f32 = 0.5;

pub struct InsightEngine {
    level: SuggestionLevel,
    allergies: Vec<String>,
    safety: Box<dyn FoodSafetyCheck>,
    escalation_rules: Vec<EscalationRule>,
}

impl InsightEngine {
    pub fn new(level: SuggestionLevel, allergies: Vec<String>) -> Self {
        Self {
            level,
            allergies,
            safety: Box::new(AllergyListSafety),
            escalation_rules: escalation::default_rules(),
        }
    }

    pub fn with_safety(mut self, safety: Box<dyn FoodSafetyCheck>) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_escalation_rules(mut self, rules: Vec<EscalationRule>) -> Self {
        self.escalation_rules = rules;
        self
    }

    /// Run the full pipeline for `event` against the active memory set and
    /// the recent event history, as of `now`.
    pub fn generate(
        &self,
        event: &Event,
        memories: &[&MemoryRecord],
        recent: &[Event],
        now: DateTime<Utc>,
    ) -> Response {
        let threshold = self.level.confidence_threshold();
        let mut response = Response::default();

        self.environmental_observations(event, memories, now, threshold, &mut response);
        self.what_worked(event, memories, now, threshold, &mut response);
        self.trigger_detection(event, memories, recent, now, threshold, &mut response);
        self.food_safety(event, memories, &mut response);
        response.questions = adaptive_questions(event, memories, self.level.max_questions());
        response
            .warnings
            .extend(escalation::evaluate(&self.escalation_rules, event, recent, now));
        self.pattern_observations(event, memories, now, threshold, &mut response);
        // Screening mentions are appended after the fallback gate: an
        // opportunistic mention alone is not a finding and must not suppress
        // the progress message.
        self.needs_more_data(event, memories, now, &mut response);
        for mention in screening_mentions(event, self.level) {
            response.observations.push(Observation {
                text: mention,
                confidence: ConfidenceLevel::Low,
                memory_id: None,
            });
        }

        debug!(
            observations = response.observations.len(),
            suggestions = response.suggestions.len(),
            warnings = response.warnings.len(),
            questions = response.questions.len(),
            "insight pipeline complete"
        );
        response
    }

    /// A memory is usable when it is active, not stale, and not suppressed
    /// by cooldown or a recent showing.
    fn usable(record: &MemoryRecord, now: DateTime<Utc>) -> bool {
        record.is_active && !record.is_stale(now) && !record.should_suppress(now)
    }

    // ── Stage 1: environmental observations ──────────────────────────────────

    fn environmental_observations(
        &self,
        event: &Event,
        memories: &[&MemoryRecord],
        now: DateTime<Utc>,
        threshold: f32,
        response: &mut Response,
    ) {
        let env = &event.environment;
        let conditions = [
            env.pressure.as_deref().map(|v| (soma_memory::EnvDimension::Pressure, v)),
            env.moon_phase.as_deref().map(|v| (soma_memory::EnvDimension::MoonPhase, v)),
            env.season.as_deref().map(|v| (soma_memory::EnvDimension::Season, v)),
        ];

        let mut pressure_covered = false;
        for (dimension, value) in conditions.into_iter().flatten() {
            for symptom in &event.symptoms {
                for record in memories {
                    if !record.kind.matches_environment(dimension, value, symptom)
                        || !Self::usable(record, now)
                    {
                        continue;
                    }
                    let score = record.decayed_confidence(now);
                    if score < threshold {
                        continue;
                    }
                    if dimension == soma_memory::EnvDimension::Pressure {
                        pressure_covered = true;
                    }
                    response.observations.push(Observation {
                        text: format!(
                            "Your {} has lined up with {} \"{}\" {} times before.",
                            symptom.to_lowercase(),
                            dimension.label(),
                            value,
                            record.occurrence_count
                        ),
                        confidence: ConfidenceLevel::from_score(score),
                        memory_id: Some(record.id),
                    });
                }
            }
        }

        // Falling or low pressure gets a generic mention even with no memory.
        if !pressure_covered {
            if let Some(pressure) = env.pressure.as_deref() {
                if pressure.eq_ignore_ascii_case("Low") || pressure.eq_ignore_ascii_case("Falling")
                {
                    response.observations.push(Observation {
                        text: format!(
                            "Barometric pressure is {} today; some people notice symptoms when it drops.",
                            pressure.to_lowercase()
                        ),
                        confidence: ConfidenceLevel::Low,
                        memory_id: None,
                    });
                }
            }
        }
    }

    // ── Stage 2: what-worked suggestions ─────────────────────────────────────

    fn what_worked(
        &self,
        event: &Event,
        memories: &[&MemoryRecord],
        now: DateTime<Utc>,
        threshold: f32,
        response: &mut Response,
    ) {
        let floor = threshold.max(SUGGESTION_MIN_CONFIDENCE);
        for symptom in &event.symptoms {
            let mut remedies: Vec<&&MemoryRecord> = memories
                .iter()
                .filter(|r| {
                    matches!(&r.kind, MemoryKind::WorkedRemedy { symptom: s, .. }
                        if s.eq_ignore_ascii_case(symptom))
                        && r.decayed_confidence(now) >= floor
                        && Self::usable(r, now)
                })
                .collect();
            remedies.sort_by(|a, b| {
                b.success_ratio()
                    .partial_cmp(&a.success_ratio())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            for record in remedies.into_iter().take(SUGGESTIONS_PER_SYMPTOM) {
                let MemoryKind::WorkedRemedy { resolution, resolution_time, .. } = &record.kind
                else {
                    continue;
                };
                let mut text = format!(
                    "{resolution} has helped your {} before",
                    symptom.to_lowercase()
                );
                if let Some(time) = resolution_time {
                    text.push_str(&format!(", usually within {time}"));
                }
                let trials = record.success_count + record.failure_count;
                if trials >= EFFECTIVENESS_MIN_TRIALS {
                    text.push_str(&format!(
                        " ({:.0}% effective)",
                        record.success_ratio() * 100.0
                    ));
                }
                text.push('.');
                response.suggestions.push(Suggestion {
                    text,
                    effectiveness: Some(record.success_ratio()),
                    memory_id: Some(record.id),
                });
            }
        }
    }

    // ── Stage 3: trigger detection ───────────────────────────────────────────

    fn trigger_detection(
        &self,
        event: &Event,
        memories: &[&MemoryRecord],
        recent: &[Event],
        now: DateTime<Utc>,
        threshold: f32,
        response: &mut Response,
    ) {
        if event.symptoms.is_empty() {
            return;
        }

        // Gather food candidates under the widest symptom window, then
        // re-check each against the specific symptom's own window.
        let scan = Duration::hours(max_window_hours(event.symptoms.iter().map(String::as_str)));
        let mut candidates: Vec<(&str, Duration)> = recent
            .iter()
            .filter_map(|e| {
                let gap = event.occurred_at - e.occurred_at;
                let food = e.food_item.as_deref()?;
                (gap >= Duration::zero() && gap <= scan).then_some((food, gap))
            })
            .collect();
        if let Some(food) = event.food_item.as_deref() {
            candidates.push((food, Duration::zero()));
        }

        let mut cited: Vec<Uuid> = vec![];
        for symptom in &event.symptoms {
            let window = Duration::hours(window_hours_for(symptom));
            for (food, gap) in &candidates {
                if *gap > window {
                    continue;
                }
                for record in memories {
                    if !record.kind.matches_trigger(food, symptom)
                        || !Self::usable(record, now)
                        || cited.contains(&record.id)
                    {
                        continue;
                    }
                    let score = record.decayed_confidence(now);
                    if score < threshold {
                        continue;
                    }
                    cited.push(record.id);
                    let hours = gap.num_hours();
                    let timing = if hours == 0 {
                        "logged with this event".to_string()
                    } else {
                        format!("logged {hours}h before this")
                    };
                    response.observations.push(Observation {
                        text: format!(
                            "{food} has preceded your {} {} times before ({timing}).",
                            symptom.to_lowercase(),
                            record.occurrence_count
                        ),
                        confidence: ConfidenceLevel::from_score(score),
                        memory_id: Some(record.id),
                    });
                }
            }
        }
    }

    // ── Stage 4: food-safety warnings (always surfaced) ──────────────────────

    fn food_safety(&self, event: &Event, memories: &[&MemoryRecord], response: &mut Response) {
        let Some(food) = event.food_item.as_deref() else {
            return;
        };
        let triggers: Vec<&MemoryRecord> = memories
            .iter()
            .copied()
            .filter(|r| matches!(r.kind, MemoryKind::Trigger { .. }) && r.is_active)
            .collect();
        let result = self.safety.check_food(food, &self.allergies, &triggers);

        let severity = match result.status {
            SafetyStatus::Safe => return,
            SafetyStatus::Caution => WarningSeverity::Caution,
            SafetyStatus::Avoid => WarningSeverity::Alert,
        };
        let mut text = result.explanation;
        for note in &result.notes {
            text.push_str(&format!(" {note}."));
        }
        response.warnings.push(Warning {
            text,
            severity,
            action_required: result.status == SafetyStatus::Avoid,
        });
    }

    // ── Stage 8: time-of-day and correlation observations ────────────────────

    fn pattern_observations(
        &self,
        event: &Event,
        memories: &[&MemoryRecord],
        now: DateTime<Utc>,
        threshold: f32,
        response: &mut Response,
    ) {
        let bucket = event.time_of_day();
        for record in memories {
            if !Self::usable(record, now) {
                continue;
            }
            let score = record.decayed_confidence(now);
            if score < threshold {
                continue;
            }
            match &record.kind {
                MemoryKind::Pattern {
                    symptom,
                    factor: PatternFactor::TimeOfDay { bucket: b },
                } if b.eq_ignore_ascii_case(bucket)
                    && event.symptoms.iter().any(|s| s.eq_ignore_ascii_case(symptom)) =>
                {
                    response.observations.push(Observation {
                        text: format!(
                            "Your {} tends to show up in the {} ({} logged).",
                            symptom.to_lowercase(),
                            bucket.to_lowercase(),
                            record.occurrence_count
                        ),
                        confidence: ConfidenceLevel::from_score(score),
                        memory_id: Some(record.id),
                    });
                }
                MemoryKind::Correlation { left, right } => {
                    let hit = event.symptoms.iter().any(|s| {
                        s.eq_ignore_ascii_case(left) || s.eq_ignore_ascii_case(right)
                    });
                    if hit {
                        response.observations.push(Observation {
                            text: format!(
                                "{} and {} have appeared together {} times in your logs.",
                                left, right, record.occurrence_count
                            ),
                            confidence: ConfidenceLevel::from_score(score),
                            memory_id: Some(record.id),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    // ── Stage 9: needs-more-data fallback ────────────────────────────────────

    fn needs_more_data(
        &self,
        event: &Event,
        memories: &[&MemoryRecord],
        now: DateTime<Utc>,
        response: &mut Response,
    ) {
        if !self.level.show_needs_more_data()
            || !response.observations.is_empty()
            || !response.suggestions.is_empty()
        {
            return;
        }

        let min = self.level.min_occurrences();
        for symptom in &event.symptoms {
            let logged = memories
                .iter()
                .filter(|r| r.kind.symptom().is_some_and(|s| s.eq_ignore_ascii_case(symptom)))
                .map(|r| r.occurrence_count)
                .max()
                .unwrap_or(1);
            if logged < min {
                response.needs_more_data = Some(format!(
                    "Still learning about your {}: {logged} of ~{min} logs so far.",
                    symptom.to_lowercase()
                ));
                return;
            }
        }

        let all_faded = memories
            .iter()
            .filter(|r| {
                r.kind
                    .symptom()
                    .is_some_and(|s| event.symptoms.iter().any(|x| x.eq_ignore_ascii_case(s)))
            })
            .all(|r| r.decayed_confidence(now) < NEEDS_MORE_DATA_CONFIDENCE);
        if all_faded && !event.symptoms.is_empty() {
            response.needs_more_data = Some(
                "Not enough recent data to say anything confident yet; keep logging.".to_string(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use soma_memory::{EnvDimension, EnvironmentSnapshot, Event, MemoryKind, MemoryRecord};

    use super::*;

    fn symptom_event(at: chrono::DateTime<Utc>, symptoms: &[&str]) -> Event {
        let mut e = Event::new(at);
        e.symptoms = symptoms.iter().map(|s| s.to_string()).collect();
        e.severity = 2;
        e
    }

    fn food_event(at: chrono::DateTime<Utc>, food: &str) -> Event {
        let mut e = Event::new(at);
        e.food_item = Some(food.to_string());
        e
    }

    fn trigger_memory(
        trigger: &str,
        symptom: &str,
        confidence: f32,
        last: chrono::DateTime<Utc>,
    ) -> MemoryRecord {
        let mut rec = MemoryRecord::seed(
            MemoryKind::Trigger { trigger: trigger.to_string(), symptom: symptom.to_string() },
            last,
            last,
        );
        rec.confidence = confidence;
        rec.occurrence_count = 4;
        rec
    }

    #[test]
    fn trigger_within_the_headache_window_is_observed_as_medium() {
        // Wine 46h before a headache: inside the 48h headache window.
        let now = Utc::now();
        let event = symptom_event(now, &["Headache"]);
        let wine = food_event(now - Duration::hours(46), "wine");
        let memory = trigger_memory("wine", "headache", 0.6, now - Duration::days(3));

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let response = engine.generate(&event, &[&memory], &[wine], now);

        let hit = response
            .observations
            .iter()
            .find(|o| o.memory_id == Some(memory.id))
            .expect("trigger observation");
        assert_eq!(hit.confidence, ConfidenceLevel::Medium);
        assert!(hit.text.contains("wine"));
    }

    #[test]
    fn trigger_outside_the_window_is_ignored() {
        // Same setup at 50h: outside every window for these symptoms.
        let now = Utc::now();
        let event = symptom_event(now, &["Headache", "bloating"]);
        let wine = food_event(now - Duration::hours(50), "wine");
        let memory = trigger_memory("wine", "headache", 0.6, now - Duration::days(3));

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let response = engine.generate(&event, &[&memory], &[wine], now);
        assert!(response.observations.iter().all(|o| o.memory_id != Some(memory.id)));
    }

    #[test]
    fn per_symptom_windows_apply_within_one_scan() {
        // 30h-old food: candidate under the 48h headache window, but the GI
        // symptom's own 24h window rejects it.
        let now = Utc::now();
        let event = symptom_event(now, &["headache", "bloating"]);
        let cheese = food_event(now - Duration::hours(30), "cheese");
        let head = trigger_memory("cheese", "headache", 0.6, now - Duration::days(2));
        let gut = trigger_memory("cheese", "bloating", 0.6, now - Duration::days(2));

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let response = engine.generate(&event, &[&head, &gut], &[cheese], now);

        assert!(response.observations.iter().any(|o| o.memory_id == Some(head.id)));
        assert!(response.observations.iter().all(|o| o.memory_id != Some(gut.id)));
    }

    #[test]
    fn stale_memories_are_skipped() {
        let now = Utc::now();
        let event = symptom_event(now, &["headache"]);
        let wine = food_event(now - Duration::hours(2), "wine");
        let memory = trigger_memory("wine", "headache", 0.9, now - Duration::days(200));

        let engine = InsightEngine::new(SuggestionLevel::Proactive, vec![]);
        let response = engine.generate(&event, &[&memory], &[wine], now);
        assert!(response.observations.iter().all(|o| o.memory_id != Some(memory.id)));
    }

    #[test]
    fn safety_warning_surfaces_even_at_minimal_level() {
        let now = Utc::now();
        let mut event = symptom_event(now, &[]);
        event.food_item = Some("peanut sauce".to_string());

        let engine = InsightEngine::new(SuggestionLevel::Minimal, vec!["peanut".to_string()]);
        let response = engine.generate(&event, &[], &[], now);

        assert_eq!(response.warnings.len(), 1);
        assert_eq!(response.warnings[0].severity, WarningSeverity::Alert);
        assert!(response.warnings[0].action_required);
    }

    #[test]
    fn what_worked_ranks_by_success_ratio_and_quotes_effectiveness() {
        let now = Utc::now();
        let event = symptom_event(now, &["migraine"]);

        let mut strong = MemoryRecord::seed(
            MemoryKind::WorkedRemedy {
                resolution: "magnesium".to_string(),
                symptom: "migraine".to_string(),
                resolution_time: Some("2 hours".to_string()),
            },
            now - Duration::days(5),
            now - Duration::days(5),
        );
        strong.occurrence_count = 6;
        strong.success_count = 5;
        strong.failure_count = 1;
        strong.recompute_confidence();

        let mut weak = MemoryRecord::seed(
            MemoryKind::WorkedRemedy {
                resolution: "dark room".to_string(),
                symptom: "migraine".to_string(),
                resolution_time: None,
            },
            now - Duration::days(5),
            now - Duration::days(5),
        );
        weak.occurrence_count = 4;
        weak.success_count = 2;
        weak.failure_count = 2;
        weak.recompute_confidence();

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let response = engine.generate(&event, &[&weak, &strong], &[], now);

        assert_eq!(response.suggestions.len(), 2);
        assert!(response.suggestions[0].text.starts_with("magnesium"));
        assert!(response.suggestions[0].text.contains("2 hours"));
        assert!(response.suggestions[0].text.contains("83% effective"));
    }

    #[test]
    fn falling_pressure_gets_a_generic_observation_without_a_memory() {
        let now = Utc::now();
        let mut event = symptom_event(now, &["headache"]);
        event.environment =
            EnvironmentSnapshot { pressure: Some("Falling".to_string()), ..Default::default() };

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let response = engine.generate(&event, &[], &[], now);

        let generic = response
            .observations
            .iter()
            .find(|o| o.text.contains("pressure"))
            .expect("pressure fallback");
        assert_eq!(generic.confidence, ConfidenceLevel::Low);
        assert!(generic.memory_id.is_none());
    }

    #[test]
    fn matching_pressure_pattern_cites_the_occurrence_count() {
        let now = Utc::now();
        let mut event = symptom_event(now, &["migraine"]);
        event.environment =
            EnvironmentSnapshot { pressure: Some("Falling".to_string()), ..Default::default() };

        let mut pattern = MemoryRecord::seed(
            MemoryKind::Pattern {
                symptom: "migraine".to_string(),
                factor: soma_memory::PatternFactor::Environmental {
                    dimension: EnvDimension::Pressure,
                    value: "Falling".to_string(),
                },
            },
            now - Duration::days(4),
            now - Duration::days(4),
        );
        pattern.occurrence_count = 6;
        pattern.confidence = 0.6;

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let response = engine.generate(&event, &[&pattern], &[], now);

        let hit = response
            .observations
            .iter()
            .find(|o| o.memory_id == Some(pattern.id))
            .expect("pattern observation");
        assert!(hit.text.contains("6 times"));
    }

    #[test]
    fn needs_more_data_progress_message_below_min_occurrences() {
        let now = Utc::now();
        let event = symptom_event(now, &["bloating"]);
        let memory = trigger_memory("cheese", "bloating", 0.2, now - Duration::days(1));

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let mut low = memory.clone();
        low.occurrence_count = 2;
        let response = engine.generate(&event, &[&low], &[], now);

        let message = response.needs_more_data.expect("progress message");
        assert!(message.contains("2 of ~3"));
    }

    #[test]
    fn screening_mention_alone_does_not_suppress_the_progress_message() {
        // Two fatigue logs at Standard (minimum three): the thyroid screening
        // mention shows up, and the progress message still fires alongside it.
        let now = Utc::now();
        let event = symptom_event(now, &["fatigue"]);
        let mut memory = trigger_memory("coffee", "fatigue", 0.2, now - Duration::days(1));
        memory.occurrence_count = 2;

        let engine = InsightEngine::new(SuggestionLevel::Standard, vec![]);
        let response = engine.generate(&event, &[&memory], &[], now);

        assert!(response.observations.iter().any(|o| o.text.contains("thyroid")));
        let message = response.needs_more_data.expect("progress message");
        assert!(message.contains("2 of ~3"));
    }

    #[test]
    fn middling_remedy_is_held_back_at_minimal_level() {
        let now = Utc::now();
        let event = symptom_event(now, &["migraine"]);
        let mut remedy = MemoryRecord::seed(
            MemoryKind::WorkedRemedy {
                resolution: "magnesium".to_string(),
                symptom: "migraine".to_string(),
                resolution_time: None,
            },
            now - Duration::days(2),
            now - Duration::days(2),
        );
        remedy.occurrence_count = 2;
        remedy.confidence = 0.45;

        let minimal = InsightEngine::new(SuggestionLevel::Minimal, vec![]);
        let response = minimal.generate(&event, &[&remedy], &[], now);
        assert!(response.suggestions.is_empty(), "0.45 is under the minimal 0.7 threshold");

        let proactive = InsightEngine::new(SuggestionLevel::Proactive, vec![]);
        let response = proactive.generate(&event, &[&remedy], &[], now);
        assert_eq!(response.suggestions.len(), 1);
    }

    #[test]
    fn minimal_level_never_shows_needs_more_data() {
        let now = Utc::now();
        let event = symptom_event(now, &["bloating"]);
        let engine = InsightEngine::new(SuggestionLevel::Minimal, vec![]);
        let response = engine.generate(&event, &[], &[], now);
        assert!(response.needs_more_data.is_none());
    }

    #[test]
    fn suppressed_memory_is_not_surfaced() {
        let now = Utc::now();
        let event = symptom_event(now, &["headache"]);
        let wine = food_event(now - Duration::hours(2), "wine");
        let mut memory = trigger_memory("wine", "headache", 0.8, now - Duration::days(1));
        memory.cooldown_until = Some(now + Duration::hours(12));

        let engine = InsightEngine::new(SuggestionLevel::Proactive, vec![]);
        let response = engine.generate(&event, &[&memory], &[wine], now);
        assert!(response.observations.iter().all(|o| o.memory_id != Some(memory.id)));
    }
}
