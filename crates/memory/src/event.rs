use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One treatment taken during an event, with the user's 1–10 effectiveness
/// rating.  Ratings above [`EFFECTIVENESS_SUCCESS_FLOOR`] count as a success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentUse {
    pub name: String,
    pub effectiveness: u8,
}

/// Effectiveness ratings strictly above this value count as a success.
pub const EFFECTIVENESS_SUCCESS_FLOOR: u8 = 5;

impl TreatmentUse {
    pub fn is_success(&self) -> bool {
        self.effectiveness > EFFECTIVENESS_SUCCESS_FLOOR
    }
}

/// Environmental conditions captured alongside an event.  All fields are
/// optional; absent values simply contribute no pattern evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSnapshot {
    /// Pressure category, e.g. "Low", "Falling", "Normal", "High".
    pub pressure: Option<String>,
    pub moon_phase: Option<String>,
    pub season: Option<String>,
}

/// One logged life-event: symptoms, what was eaten, conditions, treatments.
/// Read-only input to the builders and the insight engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub food_item: Option<String>,
    /// Symptom severity, 1 (mild) to 5 (severe).
    pub severity: u8,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub environment: EnvironmentSnapshot,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub treatments: Vec<TreatmentUse>,
}

impl Event {
    pub fn new(occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at,
            symptoms: vec![],
            food_item: None,
            severity: 1,
            category: None,
            environment: EnvironmentSnapshot::default(),
            notes: None,
            treatments: vec![],
        }
    }

    /// The day-part bucket this event falls into.
    pub fn time_of_day(&self) -> &'static str {
        time_of_day_bucket(self.occurred_at.hour())
    }
}

/// Bucket an hour of day: Morning [5,12), Afternoon [12,17), Evening [17,21),
/// Night otherwise.
pub fn time_of_day_bucket(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Morning",
        12..=16 => "Afternoon",
        17..=20 => "Evening",
        _ => "Night",
    }
}
