//! Food-safety collaborator seam.
//!
//! The engine only consumes the [`FoodSafetyCheck`] trait; richer
//! cross-reactivity databases can be plugged in behind it.  The bundled
//! [`AllergyListSafety`] covers the two checks the engine always needs:
//! declared allergies and high-confidence learned triggers.

use soma_memory::MemoryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyStatus {
    Safe,
    Caution,
    Avoid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyResult {
    pub status: SafetyStatus,
    pub explanation: String,
    pub notes: Vec<String>,
}

impl SafetyResult {
    pub fn safe() -> Self {
        Self { status: SafetyStatus::Safe, explanation: String::new(), notes: vec![] }
    }
}

pub trait FoodSafetyCheck {
    fn check_food(
        &self,
        food: &str,
        allergies: &[String],
        learned_triggers: &[&MemoryRecord],
    ) -> SafetyResult;
}

/// Learned triggers at or above this raw confidence escalate a food to
/// `Caution` even when it is not a declared allergen.
const TRIGGER_CAUTION_CONFIDENCE: f32 = 0.6;

/// Substring matching against the allergy list plus learned triggers.
#[derive(Debug, Default)]
pub struct AllergyListSafety;

impl FoodSafetyCheck for AllergyListSafety {
    fn check_food(
        &self,
        food: &str,
        allergies: &[String],
        learned_triggers: &[&MemoryRecord],
    ) -> SafetyResult {
        let food_lower = food.to_lowercase();

        if let Some(hit) = allergies.iter().find(|a| {
            let a = a.to_lowercase();
            food_lower.contains(&a) || a.contains(&food_lower)
        }) {
            return SafetyResult {
                status: SafetyStatus::Avoid,
                explanation: format!("{food} matches your declared allergy to {hit}"),
                notes: vec![],
            };
        }

        let mut notes = vec![];
        for record in learned_triggers {
            if let soma_memory::MemoryKind::Trigger { trigger, symptom } = &record.kind {
                if trigger.eq_ignore_ascii_case(food) && record.confidence >= TRIGGER_CAUTION_CONFIDENCE {
                    notes.push(format!(
                        "linked to {symptom} in {} of your logs",
                        record.occurrence_count
                    ));
                }
            }
        }
        if !notes.is_empty() {
            return SafetyResult {
                status: SafetyStatus::Caution,
                explanation: format!("{food} has a learned association with your symptoms"),
                notes,
            };
        }

        SafetyResult::safe()
    }
}
