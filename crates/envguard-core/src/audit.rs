//! Activity reporting for conflict resolution and approval overrides.

use serde::{Deserialize, Serialize};

use crate::model::{ConflictFlag, ResolutionStatus};

/// A discrete, reportable action taken on conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActivityEvent {
    ConflictsRecomputed {
        refresh_intent_id: String,
        conflict_count: usize,
        conflict_flag: ConflictFlag,
    },
    ConflictResolved {
        conflict_id: String,
        refresh_intent_id: String,
        booking_id: String,
        resolution: ResolutionStatus,
        resolver_id: String,
    },
    ForceApprovalOverride {
        refresh_intent_id: String,
        approver_id: String,
        reason: String,
    },
}

/// Sink for [`ActivityEvent`]s. Storage and format belong to the implementor.
pub trait ActivityLog {
    fn record(&self, event: &ActivityEvent);
}

/// Writes activity as structured `tracing` events under `envguard::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn record(&self, event: &ActivityEvent) {
        match event {
            ActivityEvent::ConflictsRecomputed {
                refresh_intent_id,
                conflict_count,
                conflict_flag,
            } => tracing::info!(
                target: "envguard::audit",
                refresh_intent_id = %refresh_intent_id,
                conflict_count,
                conflict_flag = %conflict_flag,
                "conflicts recomputed"
            ),
            ActivityEvent::ConflictResolved {
                conflict_id,
                refresh_intent_id,
                booking_id,
                resolution,
                resolver_id,
            } => tracing::info!(
                target: "envguard::audit",
                conflict_id = %conflict_id,
                refresh_intent_id = %refresh_intent_id,
                booking_id = %booking_id,
                resolution = %resolution,
                resolver_id = %resolver_id,
                "conflict resolved"
            ),
            ActivityEvent::ForceApprovalOverride {
                refresh_intent_id,
                approver_id,
                reason,
            } => tracing::info!(
                target: "envguard::audit",
                refresh_intent_id = %refresh_intent_id,
                approver_id = %approver_id,
                reason = %reason,
                "force approval override"
            ),
        }
    }
}
