//! Conflict record manager: storing, resolving and reading conflict rows.
//!
//! At most one row exists per (refresh intent, booking) pair. Storing a new
//! conflict set replaces the intent's rows inside one transaction, so a failed
//! store leaves the previous set intact.

use serde::{Deserialize, Serialize};

use crate::audit::{ActivityEvent, ActivityLog};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interval::TimeWindow;
use crate::model::{
    Booking, BookingStatus, Conflict, ImpactType, NewConflict, RefreshIntent, RefreshStatus,
    ResolutionStatus, ResourceKind, ResourceRef, Severity,
};
use crate::store::{self, Store};

/// Narrowing for [`get_unresolved_conflicts`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictFilter {
    /// Kind of entity the refresh targets.
    pub entity_type: Option<ResourceKind>,
    pub severity: Option<Severity>,
    /// Group owning the booking.
    pub owning_group_id: Option<String>,
}

/// An unresolved conflict with the context needed to act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictView {
    pub conflict: Conflict,
    pub booking_title: String,
    pub booking_owner_id: String,
    pub owning_group_id: Option<String>,
    pub booking_status: BookingStatus,
    pub booking_window: TimeWindow,
    pub refresh_title: String,
    pub refresh_entity: ResourceRef,
    pub refresh_status: RefreshStatus,
    pub impact_type: ImpactType,
}

/// A conflict with its full booking and refresh intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDetails {
    pub conflict: Conflict,
    pub booking: Booking,
    pub refresh_intent: RefreshIntent,
}

/// Replace the stored conflicts of `refresh_intent_id` with `conflicts`.
///
/// Returns the number of rows the intent holds afterwards.
pub fn store_conflicts(
    store: &mut Store,
    clock: &dyn Clock,
    refresh_intent_id: &str,
    conflicts: &[NewConflict],
) -> Result<usize> {
    let preserve = store.config().preserve_resolutions;
    let tx = store.transaction()?;
    if store::get_refresh(&tx, refresh_intent_id)?.is_none() {
        return Err(Error::not_found("refresh intent", refresh_intent_id));
    }
    let count = store::replace_conflicts(&tx, refresh_intent_id, conflicts, clock.now(), preserve)?;
    tx.commit()?;

    tracing::info!(refresh_intent_id, count, "stored conflicts");
    Ok(count)
}

/// Record a resolver's decision on one conflict.
///
/// `Unresolved` is not a decision and is rejected with `InvalidResolution`.
pub fn resolve_conflict(
    store: &mut Store,
    clock: &dyn Clock,
    activity: &dyn ActivityLog,
    conflict_id: &str,
    resolution: ResolutionStatus,
    resolver_id: &str,
    notes: Option<&str>,
) -> Result<Conflict> {
    if !ResolutionStatus::RESOLVER_CHOICES.contains(&resolution) {
        return Err(Error::InvalidResolution(resolution.to_string()));
    }
    if resolver_id.trim().is_empty() {
        return Err(Error::InvalidInput("resolver id must not be empty".into()));
    }

    let tx = store.transaction()?;
    store::update_resolution(&tx, conflict_id, resolution, resolver_id, notes, clock.now())?;
    let conflict = store::get_conflict(&tx, conflict_id)?
        .ok_or_else(|| Error::not_found("conflict", conflict_id))?;
    tx.commit()?;

    activity.record(&ActivityEvent::ConflictResolved {
        conflict_id: conflict.id.clone(),
        refresh_intent_id: conflict.refresh_intent_id.clone(),
        booking_id: conflict.booking_id.clone(),
        resolution,
        resolver_id: resolver_id.to_string(),
    });
    Ok(conflict)
}

/// Unresolved conflicts, most severe first.
pub fn get_unresolved_conflicts(store: &Store, filter: &ConflictFilter) -> Result<Vec<ConflictView>> {
    store::unresolved_views(store.conn(), filter)
}

/// Every stored conflict of one refresh intent, regardless of resolution.
pub fn conflicts_for_refresh(store: &Store, refresh_intent_id: &str) -> Result<Vec<Conflict>> {
    store::conflicts_for_intent(store.conn(), refresh_intent_id)
}

pub fn get_conflict_details(store: &Store, conflict_id: &str) -> Result<ConflictDetails> {
    let conflict = store::get_conflict(store.conn(), conflict_id)?
        .ok_or_else(|| Error::not_found("conflict", conflict_id))?;
    let booking = store::get_booking(store.conn(), &conflict.booking_id)?
        .ok_or_else(|| Error::not_found("booking", conflict.booking_id.clone()))?;
    let refresh_intent = store.require_refresh_intent(&conflict.refresh_intent_id)?;
    Ok(ConflictDetails {
        conflict,
        booking,
        refresh_intent,
    })
}
