//! Response length control.
//!
//! Two layers: per-category count caps, then a total character budget.
//! Warnings carry safety content and are never dropped for length.

use tracing::debug;

use crate::response::{ConfidenceLevel, Response};

pub const MAX_WARNINGS: usize = 2;
pub const MAX_OBSERVATIONS: usize = 3;
pub const MAX_SUGGESTIONS: usize = 2;
pub const MAX_QUESTIONS: usize = 2;

pub struct ResponseTrimmer {
    char_budget: usize,
}

impl ResponseTrimmer {
    pub fn new(char_budget: usize) -> Self {
        Self { char_budget }
    }

    /// Trim `response` in place to the category caps and character budget.
    pub fn trim(&self, response: &mut Response) {
        response.warnings.truncate(MAX_WARNINGS);

        // Highest-confidence observations and most-effective suggestions
        // survive; questions keep their original order.
        response.observations.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        response.observations.truncate(MAX_OBSERVATIONS);
        response.suggestions.sort_by(|a, b| {
            b.effectiveness
                .unwrap_or(0.0)
                .partial_cmp(&a.effectiveness.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        response.suggestions.truncate(MAX_SUGGESTIONS);
        response.questions.truncate(MAX_QUESTIONS);

        if response.total_chars() <= self.char_budget {
            return;
        }

        if response.observations.len() > 1 {
            response.observations.retain(|o| o.confidence != ConfidenceLevel::Low);
        }
        if response.total_chars() > self.char_budget {
            response.questions.clear();
        }
        while response.total_chars() > self.char_budget && !response.suggestions.is_empty() {
            response.suggestions.pop();
        }
        while response.total_chars() > self.char_budget && !response.observations.is_empty() {
            response.observations.pop();
        }
        if response.total_chars() > self.char_budget {
            response.needs_more_data = None;
        }

        debug!(chars = response.total_chars(), budget = self.char_budget, "response trimmed");
    }
}
