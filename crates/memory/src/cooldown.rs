//! Suppression state machine for surfaced memories.
//!
//! A memory moves `Active → Shown → Ignored → InCooldown` as the user keeps
//! scrolling past its suggestion.  Three consecutive ignores start an
//! exponential backoff (24 h doubling per further ignore, capped at 14 days);
//! positive feedback resets everything via [`MemoryRecord::reset_cooldown`].

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::schema::MemoryRecord;

/// Consecutive ignores required before a cooldown starts.
pub const COOLDOWN_IGNORE_THRESHOLD: u32 = 3;

/// Base cooldown length once the ignore threshold is reached.
const BASE_COOLDOWN_HOURS: i64 = 24;

/// Cap on the doubling exponent, so the backoff stops growing after three
/// doublings (24 h → 48 h → 96 h → 192 h).
const MAX_DOUBLINGS: u32 = 3;

/// Absolute ceiling on any cooldown: 14 days.
pub const MAX_COOLDOWN_HOURS: i64 = 14 * 24;

/// A suggestion shown within this window is not shown again.
const RESHOW_GAP_HOURS: i64 = 4;

impl MemoryRecord {
    /// Mark this memory as having been surfaced to the user.
    pub fn record_shown(&mut self, now: DateTime<Utc>) {
        self.last_shown = Some(now);
        self.last_updated = now;
    }

    /// Mark a surfaced suggestion as ignored.  Once the ignore streak reaches
    /// [`COOLDOWN_IGNORE_THRESHOLD`] a cooldown is applied immediately.
    pub fn record_ignored(&mut self, now: DateTime<Utc>) {
        self.consecutive_ignores += 1;
        self.last_updated = now;
        if self.consecutive_ignores >= COOLDOWN_IGNORE_THRESHOLD {
            self.apply_cooldown(now);
        }
    }

    /// Start (or extend) the suppression window.  Duration is monotonically
    /// non-decreasing in the ignore streak and capped at
    /// [`MAX_COOLDOWN_HOURS`].
    pub fn apply_cooldown(&mut self, now: DateTime<Utc>) {
        let hours = cooldown_hours(self.consecutive_ignores);
        self.cooldown_until = Some(now + Duration::hours(hours));
        self.last_updated = now;
        debug!(
            id = %self.id_short(),
            kind = self.kind.slug(),
            ignores = self.consecutive_ignores,
            hours,
            "memory entered cooldown"
        );
    }

    /// Clear the ignore streak and any pending cooldown.
    pub fn reset_cooldown(&mut self) {
        self.consecutive_ignores = 0;
        self.cooldown_until = None;
    }

    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// Whether this memory should be withheld from the current response:
    /// either cooling down, or shown within the last four hours.
    pub fn should_suppress(&self, now: DateTime<Utc>) -> bool {
        if self.is_in_cooldown(now) {
            return true;
        }
        self.last_shown
            .is_some_and(|shown| now - shown < Duration::hours(RESHOW_GAP_HOURS))
    }
}

/// Cooldown length in hours for a given ignore streak.
fn cooldown_hours(consecutive_ignores: u32) -> i64 {
    let doublings = consecutive_ignores
        .saturating_sub(COOLDOWN_IGNORE_THRESHOLD)
        .min(MAX_DOUBLINGS);
    (BASE_COOLDOWN_HOURS << doublings).min(MAX_COOLDOWN_HOURS)
}
