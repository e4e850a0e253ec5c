//! Hand-off of newly detected conflicts to a notification dispatcher.
//!
//! Delivery is the dispatcher's business. A failed hand-off is logged and the
//! conflict stays unnotified, so a later run picks it up again; it never
//! undoes the stored conflict set.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::model::Conflict;
use crate::store::{self, Store};

pub type DispatchResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives one conflict at a time for delivery to the people involved.
pub trait NotificationDispatcher {
    fn dispatch(&self, conflict: &Conflict) -> DispatchResult;
}

/// Dispatcher that only logs; useful where no delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn dispatch(&self, conflict: &Conflict) -> DispatchResult {
        tracing::info!(
            conflict_id = %conflict.id,
            refresh_intent_id = %conflict.refresh_intent_id,
            booking_id = %conflict.booking_id,
            severity = %conflict.severity,
            "conflict notification"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub dispatched: usize,
    pub failed: usize,
}

/// Dispatch every not-yet-notified conflict of `refresh_intent_id` and mark
/// the ones that were handed off.
pub fn notify_conflicts(
    store: &Store,
    clock: &dyn Clock,
    refresh_intent_id: &str,
    dispatcher: &dyn NotificationDispatcher,
) -> Result<NotificationSummary> {
    store.require_refresh_intent(refresh_intent_id)?;
    let mut summary = NotificationSummary::default();

    for conflict in store::unnotified_conflicts(store.conn(), refresh_intent_id)? {
        match dispatcher.dispatch(&conflict) {
            Ok(()) => {
                store::mark_notified(store.conn(), &conflict.id, clock.now())?;
                summary.dispatched += 1;
            }
            Err(err) => {
                tracing::warn!(
                    conflict_id = %conflict.id,
                    error = %err,
                    "conflict notification failed"
                );
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
