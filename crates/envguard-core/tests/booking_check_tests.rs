//! Tests for the booking-side checks and booking creation.

mod common;

use common::{at, new_booking, new_refresh, store_with_inventory};
use envguard_core::model::{
    BookingPriority, BookingStatus, ImpactType, RefreshStatus, ResourceConflictStatus, ResourceRef,
    Severity,
};
use envguard_core::{
    check_conflicts_for_booking, check_refreshes_for_booking, create_booking,
    create_refresh_intent, BookingWindowQuery, Error, FixedClock, Store, TimeWindow,
    TracingActivityLog, WarningLevel,
};
use pretty_assertions::assert_eq;

fn plan_refresh(
    store: &mut Store,
    entity: ResourceRef,
    start: (u32, u32),
    end: (u32, u32),
    impact_type: ImpactType,
    status: RefreshStatus,
) -> String {
    create_refresh_intent(
        store,
        &FixedClock(at(7, 0)),
        &TracingActivityLog,
        new_refresh(
            entity,
            at(start.0, start.1),
            Some(at(end.0, end.1)),
            impact_type,
            status,
        ),
    )
    .unwrap()
    .0
    .id
}

fn query(start: (u32, u32), end: (u32, u32), instances: &[&str]) -> BookingWindowQuery {
    BookingWindowQuery {
        start: at(start.0, start.1),
        end: at(end.0, end.1),
        environment_instance_ids: instances.iter().map(|id| id.to_string()).collect(),
    }
}

// ── Refresh warnings ────────────────────────────────────────────────────────

#[test]
fn read_only_refresh_gives_advisory_warning() {
    let mut store = store_with_inventory();
    let refresh_id = plan_refresh(
        &mut store,
        ResourceRef::instance("inst-x"),
        (10, 0),
        (10, 30),
        ImpactType::ReadOnly,
        RefreshStatus::Scheduled,
    );

    let warning = check_refreshes_for_booking(&store, &query((9, 0), (11, 0), &["inst-x"])).unwrap();

    assert!(warning.has_conflicts);
    assert!(!warning.has_destructive_refresh);
    assert_eq!(warning.warning_level, WarningLevel::Medium);
    assert_eq!(warning.refresh_conflicts.len(), 1);
    let info = &warning.refresh_conflicts[0];
    assert_eq!(info.refresh_intent_id, refresh_id);
    assert_eq!(info.severity, Severity::Low);
    assert_eq!(info.environment_instance_id, "inst-x");
    assert_eq!(info.impact_description, "Environment will be read-only");
    assert_eq!(info.overlap.duration_minutes, 30);
    warning.require_acknowledgement(false).unwrap();

    let created = create_booking(
        &mut store,
        new_booking(
            ResourceRef::instance("inst-x"),
            at(9, 0),
            at(11, 0),
            BookingStatus::Requested,
            BookingPriority::Normal,
        ),
        false,
    )
    .unwrap();
    assert_eq!(created.refresh_warning.warning_level, WarningLevel::Medium);
    assert!(store.get_booking(&created.booking.id).unwrap().is_some());
}

#[test]
fn destructive_refresh_requires_acknowledgement() {
    let mut store = store_with_inventory();
    plan_refresh(
        &mut store,
        ResourceRef::environment("env-1"),
        (10, 0),
        (12, 0),
        ImpactType::DataOverwrite,
        RefreshStatus::Approved,
    );

    let warning = check_refreshes_for_booking(&store, &query((11, 0), (13, 0), &["inst-y"])).unwrap();
    assert!(warning.has_destructive_refresh);
    assert_eq!(warning.warning_level, WarningLevel::High);
    assert_eq!(warning.refresh_conflicts[0].severity, Severity::High);
    assert!(warning.suggested_action.is_some());
    assert!(matches!(
        warning.require_acknowledgement(false),
        Err(Error::AcknowledgementRequired)
    ));

    let candidate = new_booking(
        ResourceRef::instance("inst-y"),
        at(11, 0),
        at(13, 0),
        BookingStatus::Requested,
        BookingPriority::Normal,
    );
    let err = create_booking(&mut store, candidate.clone(), false).unwrap_err();
    assert!(matches!(err, Error::AcknowledgementRequired));
    assert!(check_conflicts_for_booking(
        &store,
        &[ResourceRef::instance("inst-y")],
        TimeWindow::new(at(0, 0), at(23, 0)),
        None,
    )
    .unwrap()
    .is_empty());

    let created = create_booking(&mut store, candidate, true).unwrap();
    assert_eq!(created.refresh_warning.warning_level, WarningLevel::High);
}

#[test]
fn uncommitted_and_finished_refreshes_are_ignored() {
    let mut store = store_with_inventory();
    for status in [
        RefreshStatus::Draft,
        RefreshStatus::Requested,
        RefreshStatus::Completed,
        RefreshStatus::Cancelled,
    ] {
        plan_refresh(
            &mut store,
            ResourceRef::instance("inst-x"),
            (10, 0),
            (11, 0),
            ImpactType::DowntimeRequired,
            status,
        );
    }

    let warning = check_refreshes_for_booking(&store, &query((9, 0), (12, 0), &["inst-x"])).unwrap();

    assert!(!warning.has_conflicts);
    assert_eq!(warning.warning_level, WarningLevel::None);
    assert_eq!(warning.suggested_action, None);
}

#[test]
fn refresh_reached_through_two_instances_is_listed_once() {
    let mut store = store_with_inventory();
    plan_refresh(
        &mut store,
        ResourceRef::environment("env-1"),
        (10, 0),
        (11, 0),
        ImpactType::ConfigChange,
        RefreshStatus::InProgress,
    );

    let warning =
        check_refreshes_for_booking(&store, &query((10, 0), (11, 0), &["inst-x", "inst-y"])).unwrap();

    assert_eq!(warning.refresh_conflicts.len(), 1);
    assert_eq!(warning.refresh_conflicts[0].environment_instance_id, "inst-x");
}

#[test]
fn invalid_booking_query_is_rejected() {
    let store = store_with_inventory();
    assert!(matches!(
        check_refreshes_for_booking(&store, &query((11, 0), (10, 0), &["inst-x"])),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        check_refreshes_for_booking(&store, &query((10, 0), (11, 0), &["inst-q"])),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn booked_instances_expand_and_deduplicate() {
    let store = store_with_inventory();
    let resources = [
        ResourceRef::component("comp-db"),
        ResourceRef::environment("env-1"),
        ResourceRef::instance("inst-x"),
    ];
    assert_eq!(
        store.instances_booked_by(&resources).unwrap(),
        vec!["inst-x".to_string(), "inst-y".to_string()]
    );
    assert!(matches!(
        store.instances_booked_by(&[ResourceRef::instance("inst-missing")]),
        Err(Error::NotFound { .. })
    ));
}

// ── Booking overlaps ────────────────────────────────────────────────────────

#[test]
fn overlapping_bookings_are_reported_per_resource() {
    let mut store = store_with_inventory();
    let existing = store
        .insert_booking(new_booking(
            ResourceRef::component("comp-app"),
            at(10, 0),
            at(12, 0),
            BookingStatus::PendingApproval,
            BookingPriority::Normal,
        ))
        .unwrap();

    let overlaps = check_conflicts_for_booking(
        &store,
        &[ResourceRef::instance("inst-x"), ResourceRef::instance("inst-y")],
        TimeWindow::new(at(11, 0), at(13, 0)),
        None,
    )
    .unwrap();

    assert_eq!(overlaps.len(), 1);
    assert_eq!(overlaps[0].resource, ResourceRef::instance("inst-x"));
    assert_eq!(overlaps[0].conflicting_booking.id, existing.id);
    assert_eq!(overlaps[0].overlap.duration_minutes, 60);

    let updating_itself = check_conflicts_for_booking(
        &store,
        &[ResourceRef::component("comp-app")],
        TimeWindow::new(at(11, 0), at(13, 0)),
        Some(&existing.id),
    )
    .unwrap();
    assert!(updating_itself.is_empty());
}

#[test]
fn create_booking_marks_conflicting_resources() {
    let mut store = store_with_inventory();
    let existing = store
        .insert_booking(new_booking(
            ResourceRef::instance("inst-x"),
            at(10, 0),
            at(12, 0),
            BookingStatus::Approved,
            BookingPriority::Normal,
        ))
        .unwrap();

    let mut candidate = new_booking(
        ResourceRef::instance("inst-x"),
        at(11, 0),
        at(13, 0),
        BookingStatus::Requested,
        BookingPriority::High,
    );
    candidate.resources.push(ResourceRef::instance("inst-y"));
    let created = create_booking(&mut store, candidate, false).unwrap();

    assert_eq!(created.overlaps.len(), 1);
    let rows = store.booking_resources(&created.booking.id).unwrap();
    assert_eq!(rows.len(), 2);
    let on_x = rows
        .iter()
        .find(|row| row.resource == ResourceRef::instance("inst-x"))
        .unwrap();
    assert_eq!(on_x.conflict_status, ResourceConflictStatus::PotentialConflict);
    assert_eq!(on_x.conflicting_booking_id.as_deref(), Some(existing.id.as_str()));
    let on_y = rows
        .iter()
        .find(|row| row.resource == ResourceRef::instance("inst-y"))
        .unwrap();
    assert_eq!(on_y.conflict_status, ResourceConflictStatus::NoConflict);
    assert_eq!(on_y.conflicting_booking_id, None);
}

#[test]
fn create_booking_validates_input() {
    let mut store = store_with_inventory();

    let reversed = new_booking(
        ResourceRef::instance("inst-x"),
        at(12, 0),
        at(11, 0),
        BookingStatus::Requested,
        BookingPriority::Normal,
    );
    assert!(matches!(
        create_booking(&mut store, reversed, false),
        Err(Error::InvalidInput(_))
    ));

    let mut no_resources = new_booking(
        ResourceRef::instance("inst-x"),
        at(11, 0),
        at(12, 0),
        BookingStatus::Requested,
        BookingPriority::Normal,
    );
    no_resources.resources.clear();
    assert!(matches!(
        create_booking(&mut store, no_resources, false),
        Err(Error::InvalidInput(_))
    ));

    let unknown = new_booking(
        ResourceRef::component("comp-nope"),
        at(11, 0),
        at(12, 0),
        BookingStatus::Requested,
        BookingPriority::Normal,
    );
    assert!(matches!(
        create_booking(&mut store, unknown, false),
        Err(Error::NotFound { .. })
    ));
}
