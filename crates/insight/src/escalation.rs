//! Clinical escalation rules.
//!
//! A rule fires when the combined [current event + recent history] shows at
//! least `occurrence_threshold` matching events of at least
//! `severity_threshold` inside the last `window_days`.  Escalation warnings
//! bypass the suggestion-level confidence filter entirely.

use chrono::{DateTime, Duration, Utc};
use soma_memory::Event;
use tracing::debug;

use crate::response::{Warning, WarningSeverity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Informational,
    Recommended,
    Important,
    Urgent,
}

impl Urgency {
    /// Map urgency onto the response's warning severity and whether the
    /// warning is flagged action-required.
    pub fn presentation(self) -> (WarningSeverity, bool) {
        match self {
            Self::Informational => (WarningSeverity::Info, false),
            Self::Recommended => (WarningSeverity::Caution, false),
            Self::Important => (WarningSeverity::Caution, true),
            Self::Urgent => (WarningSeverity::Alert, true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationRule {
    /// Substring matched case-insensitively against each logged symptom.
    pub symptom_filter: String,
    pub occurrence_threshold: u32,
    pub severity_threshold: u8,
    pub window_days: i64,
    pub message: String,
    pub urgency: Urgency,
}

impl EscalationRule {
    fn matches(&self, event: &Event) -> bool {
        event.severity >= self.severity_threshold
            && event
                .symptoms
                .iter()
                .any(|s| s.to_lowercase().contains(&self.symptom_filter.to_lowercase()))
    }
}

/// Built-in rule table; callers can extend or replace it.
pub fn default_rules() -> Vec<EscalationRule> {
    vec![
        EscalationRule {
            symptom_filter: "headache".to_string(),
            occurrence_threshold: 4,
            severity_threshold: 4,
            window_days: 7,
            message: "Four or more severe headaches this week. Worth discussing with your doctor."
                .to_string(),
            urgency: Urgency::Important,
        },
        EscalationRule {
            symptom_filter: "chest".to_string(),
            occurrence_threshold: 1,
            severity_threshold: 3,
            window_days: 1,
            message: "Chest symptoms at this severity warrant prompt medical attention.".to_string(),
            urgency: Urgency::Urgent,
        },
        EscalationRule {
            symptom_filter: "fatigue".to_string(),
            occurrence_threshold: 5,
            severity_threshold: 3,
            window_days: 14,
            message: "Persistent significant fatigue over two weeks. Consider a checkup.".to_string(),
            urgency: Urgency::Recommended,
        },
        EscalationRule {
            symptom_filter: "dizz".to_string(),
            occurrence_threshold: 3,
            severity_threshold: 3,
            window_days: 7,
            message: "Recurring dizziness this week. Mentioning it to a clinician is sensible."
                .to_string(),
            urgency: Urgency::Recommended,
        },
    ]
}

/// Evaluate `rules` against the current event plus recent history, as of
/// `now`.  Each rule yields at most one warning.
pub fn evaluate(
    rules: &[EscalationRule],
    event: &Event,
    recent: &[Event],
    now: DateTime<Utc>,
) -> Vec<Warning> {
    let mut warnings = vec![];
    for rule in rules {
        let cutoff = now - Duration::days(rule.window_days);
        let count = std::iter::once(event)
            .chain(recent.iter())
            .filter(|e| e.occurred_at >= cutoff && rule.matches(e))
            .count() as u32;
        if count >= rule.occurrence_threshold {
            let (severity, action_required) = rule.urgency.presentation();
            debug!(filter = %rule.symptom_filter, count, "escalation rule fired");
            warnings.push(Warning { text: rule.message.clone(), severity, action_required });
        }
    }
    warnings
}
