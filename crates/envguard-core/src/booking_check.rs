//! Booking-side conflict checks.
//!
//! Both checks are advisory reads. The only gate they expose is
//! [`RefreshWarning::require_acknowledgement`]: a booking that overlaps a
//! destructive refresh must be explicitly acknowledged by its requester.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::finder::{overlapping_bookings_in, overlapping_refreshes_in};
use crate::interval::{Overlap, TimeWindow};
use crate::model::{
    new_id, text_enum, Booking, BookingStatus, ImpactType, NewBooking, RefreshStatus,
    ResourceRef, Severity,
};
use crate::severity::classify_for_new_booking;
use crate::store::{self, Store};

text_enum! {
    pub enum WarningLevel {
        None => "NONE",
        Medium => "MEDIUM",
        High => "HIGH",
    }
    unknown = |value| Error::UnknownStatus { kind: "warning level", value };
}

/// Another booking sharing time with the candidate on one requested resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingOverlap {
    /// The candidate's resource the overlap was found on.
    pub resource: ResourceRef,
    pub conflicting_booking: Booking,
    pub overlap: Overlap,
}

/// Candidate booking window for [`check_refreshes_for_booking`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindowQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub environment_instance_ids: Vec<String>,
}

/// A committed refresh overlapping the candidate booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConflictInfo {
    pub refresh_intent_id: String,
    pub title: String,
    pub entity: ResourceRef,
    /// The requested instance the refresh was found through.
    pub environment_instance_id: String,
    pub refresh_window: TimeWindow,
    pub overlap: Overlap,
    pub status: RefreshStatus,
    pub impact_type: ImpactType,
    pub impact_description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshWarning {
    pub has_conflicts: bool,
    pub has_destructive_refresh: bool,
    pub refresh_conflicts: Vec<RefreshConflictInfo>,
    pub warning_level: WarningLevel,
    pub suggested_action: Option<String>,
}

impl RefreshWarning {
    fn from_conflicts(refresh_conflicts: Vec<RefreshConflictInfo>) -> Self {
        let has_destructive_refresh = refresh_conflicts
            .iter()
            .any(|info| info.impact_type.is_destructive());
        let warning_level = if has_destructive_refresh {
            WarningLevel::High
        } else if refresh_conflicts.is_empty() {
            WarningLevel::None
        } else {
            WarningLevel::Medium
        };
        let suggested_action = match warning_level {
            WarningLevel::High => Some(
                "Choose a window outside the destructive refresh, or acknowledge that data or \
                 availability will be lost"
                    .to_string(),
            ),
            WarningLevel::Medium => Some(
                "A non-destructive refresh overlaps this window; the booking can proceed".to_string(),
            ),
            WarningLevel::None => None,
        };
        Self {
            has_conflicts: !refresh_conflicts.is_empty(),
            has_destructive_refresh,
            refresh_conflicts,
            warning_level,
            suggested_action,
        }
    }

    /// Fail with `AcknowledgementRequired` when a destructive refresh overlaps
    /// and the requester has not acknowledged it.
    pub fn require_acknowledgement(&self, acknowledged: bool) -> Result<()> {
        if self.has_destructive_refresh && !acknowledged {
            return Err(Error::AcknowledgementRequired);
        }
        Ok(())
    }
}

/// Outcome of [`create_booking`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub booking: Booking,
    pub overlaps: Vec<BookingOverlap>,
    pub refresh_warning: RefreshWarning,
}

/// Other open bookings overlapping `window` on any of `resources`.
pub fn check_conflicts_for_booking(
    store: &Store,
    resources: &[ResourceRef],
    window: TimeWindow,
    exclude_booking_id: Option<&str>,
) -> Result<Vec<BookingOverlap>> {
    booking_overlaps_in(store.conn(), resources, window, exclude_booking_id)
}

fn booking_overlaps_in(
    conn: &Connection,
    resources: &[ResourceRef],
    window: TimeWindow,
    exclude_booking_id: Option<&str>,
) -> Result<Vec<BookingOverlap>> {
    let mut out = Vec::new();
    for resource in resources {
        store::require_resource(conn, resource)?;
        let hits =
            overlapping_bookings_in(conn, resource, window, BookingStatus::OPEN, exclude_booking_id)?;
        out.extend(hits.into_iter().map(|hit| BookingOverlap {
            resource: resource.clone(),
            conflicting_booking: hit.booking,
            overlap: hit.overlap,
        }));
    }
    Ok(out)
}

/// Committed refreshes (APPROVED, SCHEDULED, IN_PROGRESS) overlapping a
/// candidate booking on the given instances or their environments.
pub fn check_refreshes_for_booking(
    store: &Store,
    query: &BookingWindowQuery,
) -> Result<RefreshWarning> {
    refresh_warning_in(
        store.conn(),
        TimeWindow::new(query.start, query.end),
        &query.environment_instance_ids,
    )
}

fn refresh_warning_in(
    conn: &Connection,
    window: TimeWindow,
    instance_ids: &[String],
) -> Result<RefreshWarning> {
    if !window.is_valid() {
        return Err(Error::InvalidInput(
            "booking start must be before its end".into(),
        ));
    }

    let mut seen = HashSet::new();
    let mut conflicts = Vec::new();
    for instance_id in instance_ids {
        let instance = ResourceRef::instance(instance_id.as_str());
        store::require_resource(conn, &instance)?;
        for hit in overlapping_refreshes_in(conn, &instance, window, RefreshStatus::COMMITTED)? {
            if !seen.insert(hit.intent.id.clone()) {
                continue;
            }
            let intent = hit.intent;
            conflicts.push(RefreshConflictInfo {
                severity: classify_for_new_booking(&intent.impact_type),
                impact_description: intent.impact_type.description(),
                refresh_intent_id: intent.id,
                title: intent.title,
                entity: intent.entity,
                environment_instance_id: instance_id.clone(),
                refresh_window: hit.refresh_window,
                overlap: hit.overlap,
                status: intent.status,
                impact_type: intent.impact_type,
            });
        }
    }

    let warning = RefreshWarning::from_conflicts(conflicts);
    tracing::debug!(
        instances = instance_ids.len(),
        refreshes = warning.refresh_conflicts.len(),
        warning_level = %warning.warning_level,
        "refresh check for booking"
    );
    Ok(warning)
}

/// Create a booking with its conflict checks.
///
/// The booking-vs-booking check and the insert run in one write transaction,
/// so two requests for the same window cannot both miss each other. Each
/// requested resource that overlaps another booking is marked
/// `PotentialConflict` and linked to it. When a destructive refresh overlaps,
/// `acknowledged_destructive_refresh` must be set or nothing is written.
pub fn create_booking(
    store: &mut Store,
    new: NewBooking,
    acknowledged_destructive_refresh: bool,
) -> Result<BookingCreated> {
    new.validate()?;
    let booking = new.into_booking(new_id());
    let window = booking.window();

    let tx = store.transaction()?;

    let instance_ids = store::instances_booked_by(&tx, &booking.resources)?;
    let refresh_warning = refresh_warning_in(&tx, window, &instance_ids)?;
    refresh_warning.require_acknowledgement(acknowledged_destructive_refresh)?;

    let overlaps = booking_overlaps_in(&tx, &booking.resources, window, None)?;
    store::insert_booking(&tx, &booking)?;
    for overlap in &overlaps {
        store::mark_resource_conflict(
            &tx,
            &booking.id,
            &overlap.resource,
            &overlap.conflicting_booking.id,
        )?;
    }
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        overlaps = overlaps.len(),
        warning_level = %refresh_warning.warning_level,
        "booking created"
    );
    Ok(BookingCreated {
        booking,
        overlaps,
        refresh_warning,
    })
}
