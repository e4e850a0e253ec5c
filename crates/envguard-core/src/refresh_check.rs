//! Refresh-side conflict check.
//!
//! Finds confirmed (Approved or Active) bookings that overlap a refresh
//! window, classifies each overlap, and folds the severities into the
//! intent's aggregate conflict flag. A MAJOR flag means the intent cannot be
//! approved without an explicit override.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::audit::{ActivityEvent, ActivityLog};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::finder::overlapping_bookings_in;
use crate::interval::{Overlap, TimeWindow};
use crate::model::{
    new_id, BookingPriority, BookingStatus, ConflictFlag, ConflictType, ImpactType,
    NewConflict, NewRefreshIntent, RefreshChange, RefreshIntent, ResourceRef, Severity,
};
use crate::severity::classify;
use crate::store::{self, Store};

/// A refresh window to test against existing bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCheckRequest {
    pub entity: ResourceRef,
    pub planned_start: DateTime<Utc>,
    pub planned_end: Option<DateTime<Utc>>,
    pub impact_type: ImpactType,
    pub estimated_downtime_minutes: Option<i64>,
    /// Set when checking an intent that already exists.
    pub refresh_intent_id: Option<String>,
}

impl RefreshCheckRequest {
    pub fn for_intent(intent: &RefreshIntent) -> Self {
        Self {
            entity: intent.entity.clone(),
            planned_start: intent.planned_start,
            planned_end: intent.planned_end,
            impact_type: intent.impact_type.clone(),
            estimated_downtime_minutes: intent.estimated_downtime_minutes,
            refresh_intent_id: Some(intent.id.clone()),
        }
    }

    pub fn window(&self, config: &EngineConfig) -> Result<TimeWindow> {
        crate::model::refresh_window(
            self.planned_start,
            self.planned_end,
            self.estimated_downtime_minutes,
            config.default_downtime_minutes,
        )
    }
}

/// One booking the refresh would disrupt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedConflict {
    pub booking_id: String,
    pub booking_title: String,
    pub owner_id: String,
    pub owning_group_id: Option<String>,
    pub booking_status: BookingStatus,
    pub booking_priority: BookingPriority,
    pub is_critical: bool,
    pub matched_resource: ResourceRef,
    pub overlap: Overlap,
    pub severity: Severity,
}

impl DetectedConflict {
    pub fn to_new_conflict(&self) -> NewConflict {
        NewConflict {
            booking_id: self.booking_id.clone(),
            conflict_type: ConflictType::Overlap,
            severity: self.severity,
            overlap: self.overlap,
            booking_is_critical: self.is_critical,
            booking_priority: self.booking_priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub refresh_intent_id: Option<String>,
    pub refresh_window: TimeWindow,
    pub conflicts: Vec<DetectedConflict>,
    pub conflict_flag: ConflictFlag,
    pub requires_force_approval: bool,
    /// Owning groups of the conflicting bookings, deduplicated and sorted.
    pub impacted_group_ids: Vec<String>,
}

impl ConflictResult {
    pub fn new_conflicts(&self) -> Vec<NewConflict> {
        self.conflicts
            .iter()
            .map(DetectedConflict::to_new_conflict)
            .collect()
    }
}

/// Explicit approval of a refresh despite a MAJOR conflict flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceOverride {
    pub approver_id: String,
    pub reason: String,
}

/// Check a refresh window against confirmed bookings. Read only.
pub fn check_conflicts_for_refresh(
    store: &Store,
    request: &RefreshCheckRequest,
) -> Result<ConflictResult> {
    check_in(store.conn(), store.config(), request)
}

fn check_in(
    conn: &Connection,
    config: &EngineConfig,
    request: &RefreshCheckRequest,
) -> Result<ConflictResult> {
    store::require_resource(conn, &request.entity)?;
    let window = request.window(config)?;
    if !window.is_valid() {
        return Err(Error::InvalidInput(
            "refresh window must end after it starts".into(),
        ));
    }

    let hits = overlapping_bookings_in(conn, &request.entity, window, BookingStatus::CONFIRMED, None)?;

    let conflicts: Vec<DetectedConflict> = hits
        .into_iter()
        .map(|hit| {
            let booking = hit.booking;
            let severity = classify(
                &request.impact_type,
                booking.status,
                booking.priority,
                booking.is_critical,
            );
            DetectedConflict {
                booking_id: booking.id,
                booking_title: booking.title,
                owner_id: booking.owner_id,
                owning_group_id: booking.owning_group_id,
                booking_status: booking.status,
                booking_priority: booking.priority,
                is_critical: booking.is_critical,
                matched_resource: hit.matched_resource,
                overlap: hit.overlap,
                severity,
            }
        })
        .collect();

    let conflict_flag = ConflictFlag::from_severities(conflicts.iter().map(|c| c.severity));
    let impacted_group_ids: BTreeSet<String> = conflicts
        .iter()
        .filter_map(|c| c.owning_group_id.clone())
        .collect();

    tracing::debug!(
        entity = %request.entity,
        impact_type = %request.impact_type,
        conflicts = conflicts.len(),
        conflict_flag = %conflict_flag,
        "refresh conflict check"
    );

    Ok(ConflictResult {
        refresh_intent_id: request.refresh_intent_id.clone(),
        refresh_window: window,
        conflicts,
        conflict_flag,
        requires_force_approval: conflict_flag.requires_force_approval(),
        impacted_group_ids: impacted_group_ids.into_iter().collect(),
    })
}

/// Detect, store and flag inside an open transaction.
fn revalidate_in(
    conn: &Connection,
    config: &EngineConfig,
    now: DateTime<Utc>,
    intent: &RefreshIntent,
) -> Result<ConflictResult> {
    let result = check_in(conn, config, &RefreshCheckRequest::for_intent(intent))?;
    store::replace_conflicts(
        conn,
        &intent.id,
        &result.new_conflicts(),
        now,
        config.preserve_resolutions,
    )?;
    store::set_conflict_flag(conn, &intent.id, result.conflict_flag)?;
    Ok(result)
}

/// Re-run detection for a stored intent, replace its conflict rows and update
/// its aggregate flag, all in one transaction.
pub fn revalidate_conflicts(
    store: &mut Store,
    clock: &dyn Clock,
    activity: &dyn ActivityLog,
    refresh_intent_id: &str,
) -> Result<ConflictResult> {
    let config = store.config().clone();
    let tx = store.transaction()?;
    let intent = store::get_refresh(&tx, refresh_intent_id)?
        .ok_or_else(|| Error::not_found("refresh intent", refresh_intent_id))?;
    let result = revalidate_in(&tx, &config, clock.now(), &intent)?;
    tx.commit()?;

    record_recompute(activity, refresh_intent_id, &result);
    Ok(result)
}

/// Insert a refresh intent together with its initial conflict snapshot.
pub fn create_refresh_intent(
    store: &mut Store,
    clock: &dyn Clock,
    activity: &dyn ActivityLog,
    new: NewRefreshIntent,
) -> Result<(RefreshIntent, ConflictResult)> {
    new.validate()?;
    let config = store.config().clone();
    let mut intent = new.into_intent(new_id());

    let tx = store.transaction()?;
    store::require_resource(&tx, &intent.entity)?;
    store::insert_refresh(&tx, &intent, intent.window(config.default_downtime_minutes)?)?;
    let result = revalidate_in(&tx, &config, clock.now(), &intent)?;
    tx.commit()?;

    intent.conflict_flag = result.conflict_flag;
    record_recompute(activity, &intent.id, &result);
    Ok((intent, result))
}

/// Move or re-scope a refresh intent and recompute its conflicts.
pub fn reschedule_refresh(
    store: &mut Store,
    clock: &dyn Clock,
    activity: &dyn ActivityLog,
    refresh_intent_id: &str,
    change: &RefreshChange,
) -> Result<(RefreshIntent, ConflictResult)> {
    if change.is_empty() {
        return Err(Error::InvalidInput("no refresh fields to change".into()));
    }
    let config = store.config().clone();

    let tx = store.transaction()?;
    let mut intent = store::get_refresh(&tx, refresh_intent_id)?
        .ok_or_else(|| Error::not_found("refresh intent", refresh_intent_id))?;
    change.apply_to(&mut intent)?;
    store::update_refresh_timing(&tx, &intent, intent.window(config.default_downtime_minutes)?)?;
    let result = revalidate_in(&tx, &config, clock.now(), &intent)?;
    tx.commit()?;

    intent.conflict_flag = result.conflict_flag;
    record_recompute(activity, refresh_intent_id, &result);
    Ok((intent, result))
}

/// Gate for moving an intent to APPROVED.
///
/// A MAJOR-flagged intent passes only with an override, which is reported to
/// `activity`.
pub fn ensure_approvable(
    intent: &RefreshIntent,
    force: Option<&ForceOverride>,
    activity: &dyn ActivityLog,
) -> Result<()> {
    if !intent.conflict_flag.requires_force_approval() {
        return Ok(());
    }
    let Some(force) = force else {
        tracing::info!(refresh_intent_id = %intent.id, "approval blocked by MAJOR conflict flag");
        return Err(Error::ForceApprovalRequired(intent.id.clone()));
    };
    if force.approver_id.trim().is_empty() || force.reason.trim().is_empty() {
        return Err(Error::InvalidInput(
            "an override needs an approver and a reason".into(),
        ));
    }
    activity.record(&ActivityEvent::ForceApprovalOverride {
        refresh_intent_id: intent.id.clone(),
        approver_id: force.approver_id.clone(),
        reason: force.reason.clone(),
    });
    Ok(())
}

fn record_recompute(activity: &dyn ActivityLog, refresh_intent_id: &str, result: &ConflictResult) {
    tracing::info!(
        refresh_intent_id,
        conflicts = result.conflicts.len(),
        conflict_flag = %result.conflict_flag,
        "refresh conflicts revalidated"
    );
    activity.record(&ActivityEvent::ConflictsRecomputed {
        refresh_intent_id: refresh_intent_id.to_string(),
        conflict_count: result.conflicts.len(),
        conflict_flag: result.conflict_flag,
    });
}
