//! Adaptive follow-up questions.
//!
//! Keyword rules only; the cap comes from the configured suggestion level.

use soma_memory::{Event, MemoryKind, MemoryRecord};

struct QuestionRule {
    keywords: &'static [&'static str],
    question: &'static str,
}

const RULES: &[QuestionRule] = &[
    QuestionRule {
        keywords: &["fatigue", "tired", "exhaust", "energy", "headache", "fog"],
        question: "How has your sleep been the last few nights?",
    },
    QuestionRule {
        keywords: &["headache", "migraine", "stomach", "nausea", "tension"],
        question: "Has this been a higher-stress period than usual?",
    },
    QuestionRule {
        keywords: &["headache", "dizz", "cramp", "fatigue"],
        question: "Have you been drinking enough water today?",
    },
    QuestionRule {
        keywords: &["migraine", "joint", "fatigue", "mood"],
        question: "Are you still taking your usual supplements?",
    },
];

/// Build up to `max_questions` prompts for this event.  Correlation memories
/// add a paired-symptom question ahead of the keyword rules.
pub fn adaptive_questions(
    event: &Event,
    memories: &[&MemoryRecord],
    max_questions: usize,
) -> Vec<String> {
    let mut questions: Vec<String> = vec![];

    for record in memories {
        if let MemoryKind::Correlation { left, right } = &record.kind {
            let other = if event.symptoms.iter().any(|s| s.eq_ignore_ascii_case(left)) {
                Some(right)
            } else if event.symptoms.iter().any(|s| s.eq_ignore_ascii_case(right)) {
                Some(left)
            } else {
                None
            };
            if let Some(other) = other {
                questions.push(format!("Any {} today? It often shows up alongside this.", other.to_lowercase()));
            }
        }
    }

    let lower: Vec<String> = event.symptoms.iter().map(|s| s.to_lowercase()).collect();
    for rule in RULES {
        let hit = lower.iter().any(|s| rule.keywords.iter().any(|k| s.contains(k)));
        if hit && !questions.iter().any(|q| q == rule.question) {
            questions.push(rule.question.to_string());
        }
    }

    questions.truncate(max_questions);
    questions
}
