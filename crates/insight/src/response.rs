use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse trust label attached to an observation, derived from the backing
/// memory's decayed confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Info,
    Caution,
    Alert,
}

/// A pattern or trigger the engine noticed about the current event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub text: String,
    pub confidence: ConfidenceLevel,
    /// Backing memory, when one exists, so feedback can be routed to it.
    pub memory_id: Option<Uuid>,
}

/// An actionable "this has worked before" item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    /// Success ratio of the backing remedy memory; ranking key when trimming.
    pub effectiveness: Option<f32>,
    pub memory_id: Option<Uuid>,
}

/// Safety-critical content.  Never filtered by suggestion level and never
/// dropped for length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub text: String,
    pub severity: WarningSeverity,
    pub action_required: bool,
}

/// Structured output of one insight pass.  Valid and complete on its own;
/// any downstream prose polishing is cosmetic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub observations: Vec<Observation>,
    pub suggestions: Vec<Suggestion>,
    pub warnings: Vec<Warning>,
    pub questions: Vec<String>,
    pub needs_more_data: Option<String>,
}

impl Response {
    /// Total characters across every text field, the quantity the trimmer
    /// holds under budget.
    pub fn total_chars(&self) -> usize {
        self.observations.iter().map(|o| o.text.chars().count()).sum::<usize>()
            + self.suggestions.iter().map(|s| s.text.chars().count()).sum::<usize>()
            + self.warnings.iter().map(|w| w.text.chars().count()).sum::<usize>()
            + self.questions.iter().map(|q| q.chars().count()).sum::<usize>()
            + self.needs_more_data.as_ref().map_or(0, |m| m.chars().count())
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
            && self.suggestions.is_empty()
            && self.warnings.is_empty()
            && self.questions.is_empty()
            && self.needs_more_data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_level_bands() {
        assert_eq!(ConfidenceLevel::from_score(0.2), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.4), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.6), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::High);
    }

    #[test]
    fn total_chars_counts_every_field() {
        let response = Response {
            observations: vec![Observation {
                text: "abc".to_string(),
                confidence: ConfidenceLevel::Medium,
                memory_id: None,
            }],
            suggestions: vec![Suggestion {
                text: "defg".to_string(),
                effectiveness: None,
                memory_id: None,
            }],
            warnings: vec![Warning {
                text: "hi".to_string(),
                severity: WarningSeverity::Caution,
                action_required: false,
            }],
            questions: vec!["jk".to_string()],
            needs_more_data: Some("lmnop".to_string()),
        };
        assert_eq!(response.total_chars(), 3 + 4 + 2 + 2 + 5);
        assert!(!response.is_empty());
    }
}
