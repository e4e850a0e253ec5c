//! Shared fixtures for envguard-core integration tests.

#![allow(dead_code)]

use std::cell::RefCell;

use chrono::{DateTime, TimeZone, Utc};
use envguard_core::model::{
    BookingPriority, BookingStatus, ImpactType, NewBooking, NewRefreshIntent, RefreshStatus,
    ResourceRef,
};
use envguard_core::{ActivityEvent, ActivityLog, Store};

/// 2026-03-16 at the given UTC time.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 16, hour, minute, 0).unwrap()
}

/// Day offset from 2026-03-16 at the given UTC time.
pub fn day_at(day_offset: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 16 + day_offset, hour, minute, 0)
        .unwrap()
}

/// Store with two environments:
///
/// - `env-1` with instances `inst-x` (components `comp-app`, `comp-db`) and `inst-y`
/// - `env-2` with instance `inst-z`
pub fn store_with_inventory() -> Store {
    let store = Store::open_in_memory().unwrap();
    seed_inventory(&store);
    store
}

pub fn seed_inventory(store: &Store) {
    store.add_environment("env-1", "Integration").unwrap();
    store.add_instance("inst-x", "env-1", "INT-X").unwrap();
    store.add_instance("inst-y", "env-1", "INT-Y").unwrap();
    store.add_component("comp-app", "inst-x", "app server").unwrap();
    store.add_component("comp-db", "inst-x", "database").unwrap();
    store.add_environment("env-2", "Performance").unwrap();
    store.add_instance("inst-z", "env-2", "PERF-Z").unwrap();
}

pub fn new_booking(
    resource: ResourceRef,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: BookingStatus,
    priority: BookingPriority,
) -> NewBooking {
    NewBooking {
        title: format!("booking on {resource}"),
        resources: vec![resource],
        start,
        end,
        status,
        priority,
        is_critical: false,
        owner_id: "owner-1".to_string(),
        owning_group_id: Some("team-a".to_string()),
    }
}

pub fn new_refresh(
    entity: ResourceRef,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    impact_type: ImpactType,
    status: RefreshStatus,
) -> NewRefreshIntent {
    NewRefreshIntent {
        title: format!("{impact_type} on {entity}"),
        entity,
        planned_start: start,
        planned_end: end,
        estimated_downtime_minutes: None,
        impact_type,
        status,
        requested_by: Some("ops".to_string()),
    }
}

/// Activity log that keeps every event for inspection.
#[derive(Default)]
pub struct RecordingLog {
    pub events: RefCell<Vec<ActivityEvent>>,
}

impl ActivityLog for RecordingLog {
    fn record(&self, event: &ActivityEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
