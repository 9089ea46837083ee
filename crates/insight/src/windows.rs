//! Adaptive trigger-scan windows.
//!
//! Different symptom families have different plausible food-to-onset lags,
//! so the trigger stage widens or narrows its lookback per symptom instead
//! of using one flat window.
//!
//! | Category      | Window |
//! |---------------|--------|
//! | GI            | 24 h   |
//! | Headache      | 48 h   |
//! | Skin          | 72 h   |
//! | Joint/muscle  | 48 h   |
//! | Fatigue       | 48 h   |
//! | Mental/mood   | 36 h   |
//! | Other         | 24 h   |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymptomCategory {
    Gastrointestinal,
    Headache,
    Skin,
    JointMuscle,
    Fatigue,
    MentalMood,
    Other,
}

impl SymptomCategory {
    /// Classify a free-text symptom by keyword.
    pub fn classify(symptom: &str) -> Self {
        let lower = symptom.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["bloat", "nausea", "stomach", "diarrhea", "constipation", "cramp", "reflux", "gas", "indigestion"]) {
            Self::Gastrointestinal
        } else if has(&["headache", "migraine", "head pain"]) {
            Self::Headache
        } else if has(&["rash", "hive", "itch", "eczema", "skin", "flush"]) {
            Self::Skin
        } else if has(&["joint", "muscle", "ache", "stiff", "arthralgia"]) {
            Self::JointMuscle
        } else if has(&["fatigue", "tired", "exhaust", "energy", "letharg"]) {
            Self::Fatigue
        } else if has(&["anxiety", "anxious", "mood", "depress", "irritab", "brain fog", "foggy"]) {
            Self::MentalMood
        } else {
            Self::Other
        }
    }

    /// Trailing lookback for candidate trigger foods, in hours.
    pub fn window_hours(self) -> i64 {
        match self {
            Self::Gastrointestinal => 24,
            Self::Headache => 48,
            Self::Skin => 72,
            Self::JointMuscle => 48,
            Self::Fatigue => 48,
            Self::MentalMood => 36,
            Self::Other => 24,
        }
    }
}

/// Window for one symptom string.
pub fn window_hours_for(symptom: &str) -> i64 {
    SymptomCategory::classify(symptom).window_hours()
}

/// The widest window across a set of symptoms; used to gather scan
/// candidates before each is re-checked against its own symptom's window.
pub fn max_window_hours<'a, I: IntoIterator<Item = &'a str>>(symptoms: I) -> i64 {
    symptoms
        .into_iter()
        .map(window_hours_for)
        .max()
        .unwrap_or(SymptomCategory::Other.window_hours())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_classification_covers_the_families() {
        assert_eq!(SymptomCategory::classify("Bloating"), SymptomCategory::Gastrointestinal);
        assert_eq!(SymptomCategory::classify("migraine"), SymptomCategory::Headache);
        assert_eq!(SymptomCategory::classify("hives on arms"), SymptomCategory::Skin);
        assert_eq!(SymptomCategory::classify("knee joint pain"), SymptomCategory::JointMuscle);
        assert_eq!(SymptomCategory::classify("low energy"), SymptomCategory::Fatigue);
        assert_eq!(SymptomCategory::classify("brain fog"), SymptomCategory::MentalMood);
        assert_eq!(SymptomCategory::classify("dizziness"), SymptomCategory::Other);
    }

    #[test]
    fn windows_match_the_documented_table() {
        assert_eq!(window_hours_for("nausea"), 24);
        assert_eq!(window_hours_for("Headache"), 48);
        assert_eq!(window_hours_for("rash"), 72);
        assert_eq!(window_hours_for("muscle ache"), 48);
        assert_eq!(window_hours_for("fatigue"), 48);
        assert_eq!(window_hours_for("anxiety"), 36);
        assert_eq!(window_hours_for("tinnitus"), 24);
    }

    #[test]
    fn max_window_takes_the_widest_symptom() {
        assert_eq!(max_window_hours(["bloating", "headache"].into_iter()), 48);
        assert_eq!(max_window_hours(["bloating", "rash"].into_iter()), 72);
        assert_eq!(max_window_hours(std::iter::empty()), 24);
    }
}
