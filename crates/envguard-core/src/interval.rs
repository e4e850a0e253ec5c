//! Half-open time windows and the overlap test every detector is built on.
//!
//! Two windows overlap when `a.start < b.end && a.end > b.start`. Windows that
//! only touch (one ends exactly when the other starts) do NOT overlap. A window
//! with `start >= end` is empty and overlaps nothing, not even itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returns true when `[a_start, a_end)` and `[b_start, b_end)` intersect.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    if a_start >= a_end || b_start >= b_end {
        return false;
    }
    a_start < b_end && a_end > b_start
}

/// A `[start, end)` time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when `start < end`. Callers creating bookings or refreshes enforce
    /// this; the overlap test itself never requires it.
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// The shared part of two windows, or `None` when they do not overlap.
    pub fn intersection(&self, other: &Self) -> Option<Overlap> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Some(Overlap {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        })
    }
}

/// The intersection of two overlapping windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}
