// src/ingest/cursor.rs
//! In-memory ingestion cursor (no disk persistence).
//!
//! The effective cursor survives restarts only through the stored delegations:
//! on start it is recomputed from the latest stored timestamp.

use chrono::{DateTime, Duration, Timelike, Utc};

/// Watermark: fetch delegations at or after `since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    since: DateTime<Utc>,
}

impl Cursor {
    pub fn new(since: DateTime<Utc>) -> Self {
        Self { since }
    }

    /// Cursor positioned right after an already stored timestamp.
    pub fn resume_after(latest: DateTime<Utc>) -> Self {
        Self {
            since: step_past(latest),
        }
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Empty window: nothing new at the source as of `now`.
    pub fn advance_to(&mut self, now: DateTime<Utc>) {
        self.since = now;
    }

    /// Batch stored: move past its most recent timestamp.
    pub fn advance_past(&mut self, latest: DateTime<Utc>) {
        self.since = step_past(latest);
    }
}

// TzKT timestamps are truncated to the second, so `latest + 1s` cannot skip
// an event. A sub-second timestamp breaks that assumption; re-fetch the
// boundary instead and let the idempotent append drop the duplicates.
fn step_past(latest: DateTime<Utc>) -> DateTime<Utc> {
    if latest.nanosecond() != 0 {
        return latest;
    }
    latest + Duration::seconds(1)
}
