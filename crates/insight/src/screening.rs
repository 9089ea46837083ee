//! Opportunistic screening mentions, keyed on symptom keywords.  Suppressed
//! entirely at the Minimal suggestion level.

use soma_config::SuggestionLevel;
use soma_memory::Event;

struct ScreeningRule {
    keywords: &'static [&'static str],
    text: &'static str,
}

const RULES: &[ScreeningRule] = &[
    ScreeningRule {
        keywords: &["fatigue", "tired", "exhaust", "energy"],
        text: "Ongoing fatigue can be worth a thyroid, B12 and iron panel if you haven't had one recently.",
    },
    ScreeningRule {
        keywords: &["headache", "migraine"],
        text: "If it's been a while since your blood pressure was checked, recurring headaches are a good prompt.",
    },
];

pub fn screening_mentions(event: &Event, level: SuggestionLevel) -> Vec<String> {
    if level == SuggestionLevel::Minimal {
        return vec![];
    }
    let lower: Vec<String> = event.symptoms.iter().map(|s| s.to_lowercase()).collect();
    RULES
        .iter()
        .filter(|rule| lower.iter().any(|s| rule.keywords.iter().any(|k| s.contains(k))))
        .map(|rule| rule.text.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use soma_memory::Event;

    use super::*;

    fn event(symptom: &str) -> Event {
        let mut e = Event::new(Utc::now());
        e.symptoms = vec![symptom.to_string()];
        e
    }

    #[test]
    fn fatigue_mentions_thyroid_panel() {
        let mentions = screening_mentions(&event("constant fatigue"), SuggestionLevel::Standard);
        assert_eq!(mentions.len(), 1);
        assert!(mentions[0].contains("thyroid"));
    }

    #[test]
    fn minimal_level_suppresses_everything() {
        assert!(screening_mentions(&event("fatigue"), SuggestionLevel::Minimal).is_empty());
    }

    #[test]
    fn unrelated_symptoms_match_nothing() {
        assert!(screening_mentions(&event("rash"), SuggestionLevel::Proactive).is_empty());
    }
}
