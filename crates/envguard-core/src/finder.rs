//! Resource conflict finder.
//!
//! Given a resource and a candidate window, finds the bookings (or refresh
//! intents) on that resource's affected scope whose windows overlap it. The
//! scope is the resource, its ancestors and everything it contains, so a
//! check against an environment sees bookings on each of its instances.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval::{Overlap, TimeWindow};
use crate::model::{Booking, BookingStatus, RefreshIntent, RefreshStatus, ResourceRef};
use crate::store::{self, Store};

/// A booking that overlaps the candidate window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapResult {
    pub booking: Booking,
    /// The member of the affected scope the booking was found on.
    pub matched_resource: ResourceRef,
    pub overlap: Overlap,
}

/// A refresh intent that overlaps the candidate window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOverlap {
    pub intent: RefreshIntent,
    pub refresh_window: TimeWindow,
    pub matched_resource: ResourceRef,
    pub overlap: Overlap,
}

/// Bookings in one of `statuses` that overlap `window` on `resource`'s scope.
///
/// Each booking appears once, even when it holds several scope members.
/// Results are ordered by booking start.
pub fn find_overlapping_bookings(
    store: &Store,
    resource: &ResourceRef,
    window: TimeWindow,
    statuses: &[BookingStatus],
    exclude_booking_id: Option<&str>,
) -> Result<Vec<OverlapResult>> {
    overlapping_bookings_in(store.conn(), resource, window, statuses, exclude_booking_id)
}

/// Refresh intents in one of `statuses` that overlap `window` on `resource`'s scope.
pub fn find_overlapping_refreshes(
    store: &Store,
    resource: &ResourceRef,
    window: TimeWindow,
    statuses: &[RefreshStatus],
) -> Result<Vec<RefreshOverlap>> {
    overlapping_refreshes_in(store.conn(), resource, window, statuses)
}

pub(crate) fn overlapping_bookings_in(
    conn: &Connection,
    resource: &ResourceRef,
    window: TimeWindow,
    statuses: &[BookingStatus],
    exclude_booking_id: Option<&str>,
) -> Result<Vec<OverlapResult>> {
    let scope = resource.affected_scope(conn)?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for member in &scope {
        for id in store::overlapping_booking_ids(conn, member, window)? {
            if exclude_booking_id == Some(id.as_str()) || !seen.insert(id.clone()) {
                continue;
            }
            let Some(booking) = store::get_booking(conn, &id)? else {
                continue;
            };
            if !statuses.contains(&booking.status) {
                continue;
            }
            let Some(overlap) = window.intersection(&booking.window()) else {
                continue;
            };
            out.push(OverlapResult {
                booking,
                matched_resource: member.clone(),
                overlap,
            });
        }
    }

    out.sort_by(|a, b| (a.booking.start, &a.booking.id).cmp(&(b.booking.start, &b.booking.id)));
    tracing::debug!(
        resource = %resource,
        scope = scope.len(),
        matches = out.len(),
        "searched overlapping bookings"
    );
    Ok(out)
}

pub(crate) fn overlapping_refreshes_in(
    conn: &Connection,
    resource: &ResourceRef,
    window: TimeWindow,
    statuses: &[RefreshStatus],
) -> Result<Vec<RefreshOverlap>> {
    let scope = resource.affected_scope(conn)?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for member in &scope {
        for (intent, refresh_window) in store::overlapping_refreshes(conn, member, window)? {
            if !statuses.contains(&intent.status) || !seen.insert(intent.id.clone()) {
                continue;
            }
            let Some(overlap) = window.intersection(&refresh_window) else {
                continue;
            };
            out.push(RefreshOverlap {
                intent,
                refresh_window,
                matched_resource: member.clone(),
                overlap,
            });
        }
    }

    out.sort_by(|a, b| {
        (a.refresh_window.start, &a.intent.id).cmp(&(b.refresh_window.start, &b.intent.id))
    });
    tracing::debug!(
        resource = %resource,
        scope = scope.len(),
        matches = out.len(),
        "searched overlapping refreshes"
    );
    Ok(out)
}
