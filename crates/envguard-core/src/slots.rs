//! Alternative slot suggestion.
//!
//! Walks the open bookings on a resource in start order with a cursor that
//! begins at "now". Each gap between the cursor and the next booking's start
//! that fits the requested duration yields one slot anchored at the cursor;
//! the cursor then jumps past the booking. The gap after the last booking,
//! up to the lookahead horizon, is checked the same way.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::finder::overlapping_bookings_in;
use crate::interval::TimeWindow;
use crate::model::{BookingStatus, ResourceRef};
use crate::store::{self, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub entity: ResourceRef,
    pub duration_minutes: i64,
    /// Falls back to the configured lookahead.
    pub lookahead_days: Option<i64>,
}

/// A free window of exactly the requested duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Longest lookahead a slot search may scan.
pub const MAX_LOOKAHEAD_DAYS: i64 = 366;

/// Suggest free slots on `request.entity`, starting from the clock's now.
pub fn suggest_slots(store: &Store, clock: &dyn Clock, request: &SlotRequest) -> Result<Vec<Slot>> {
    if request.duration_minutes <= 0 {
        return Err(Error::InvalidInput("slot duration must be positive".into()));
    }
    let config = store.config();
    let lookahead_days = request.lookahead_days.unwrap_or(config.slot_lookahead_days);
    if lookahead_days <= 0 {
        return Err(Error::InvalidInput("lookahead must be positive".into()));
    }
    if lookahead_days > MAX_LOOKAHEAD_DAYS {
        return Err(Error::InvalidInput(format!(
            "lookahead may not exceed {MAX_LOOKAHEAD_DAYS} days"
        )));
    }
    if request.duration_minutes > lookahead_days * 24 * 60 {
        return Err(Error::InvalidInput(format!(
            "slot duration does not fit in a {lookahead_days}-day lookahead"
        )));
    }
    store::require_resource(store.conn(), &request.entity)?;

    let now = clock.now();
    let end = TimeDelta::try_days(lookahead_days)
        .and_then(|lookahead| now.checked_add_signed(lookahead))
        .ok_or_else(|| {
            Error::InvalidInput("lookahead runs past the supported date range".into())
        })?;
    let horizon = TimeWindow::new(now, end);
    let busy: Vec<TimeWindow> = overlapping_bookings_in(
        store.conn(),
        &request.entity,
        horizon,
        BookingStatus::OPEN,
        None,
    )?
    .into_iter()
    .map(|hit| hit.booking.window())
    .collect();

    let slots = scan_free_slots(
        &busy,
        horizon,
        request.duration_minutes,
        config.max_suggested_slots,
    );
    tracing::debug!(
        entity = %request.entity,
        busy = busy.len(),
        slots = slots.len(),
        "suggested slots"
    );
    Ok(slots)
}

/// Free slots of `duration_minutes` inside `horizon`, avoiding every window in
/// `busy`. At most `max_slots`, in chronological order. Slots never extend past
/// the horizon end. A duration chrono cannot represent fits nowhere.
pub fn scan_free_slots(
    busy: &[TimeWindow],
    horizon: TimeWindow,
    duration_minutes: i64,
    max_slots: usize,
) -> Vec<Slot> {
    let Some(duration) = TimeDelta::try_minutes(duration_minutes) else {
        return Vec::new();
    };
    let mut sorted: Vec<TimeWindow> = busy.to_vec();
    sorted.sort_by_key(|window| (window.start, window.end));

    let mut slots = Vec::new();
    let mut search_start = horizon.start;

    for window in &sorted {
        if slots.len() >= max_slots {
            return slots;
        }
        if window.start.min(horizon.end) - search_start >= duration {
            slots.push(Slot {
                start: search_start,
                end: search_start + duration,
                duration_minutes,
            });
        }
        search_start = search_start.max(window.end);
    }

    if slots.len() < max_slots && horizon.end - search_start >= duration {
        slots.push(Slot {
            start: search_start,
            end: search_start + duration,
            duration_minutes,
        });
    }

    slots
}
