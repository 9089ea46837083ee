pub mod engine;
pub mod escalation;
pub mod notify;
pub mod polish;
pub mod questions;
pub mod response;
pub mod safety;
pub mod screening;
pub mod trimmer;
pub mod windows;

pub use engine::InsightEngine;
pub use escalation::{EscalationRule, Urgency};
pub use notify::{LogSink, NotificationSink};
pub use polish::{PolishFacts, ResponsePolisher};
pub use response::{ConfidenceLevel, Observation, Response, Suggestion, Warning, WarningSeverity};
pub use safety::{AllergyListSafety, FoodSafetyCheck, SafetyResult, SafetyStatus};
pub use trimmer::ResponseTrimmer;
pub use windows::SymptomCategory;
