pub mod builder;
pub mod confidence;
pub mod cooldown;
pub mod event;
pub mod event_log;
pub mod manager;
pub mod schema;
pub mod store;
pub mod updater;

pub use builder::MemoryBuilder;
pub use event::{EnvironmentSnapshot, Event, TreatmentUse};
pub use event_log::EventLog;
pub use manager::{MaintenanceReport, MemoryManager, MemoryStats};
pub use schema::{EnvDimension, Feedback, MemoryKind, MemoryRecord, PatternFactor, RecentDates};
pub use store::{InMemoryStore, MemoryStore};
pub use updater::{MemoryUpdater, UpdateSummary};
