//! Tests for the refresh-side conflict check, revalidation and the approval gate.

mod common;

use common::{at, new_booking, new_refresh, store_with_inventory, RecordingLog};
use envguard_core::model::{
    BookingPriority, BookingStatus, ConflictFlag, ImpactType, RefreshChange, RefreshStatus,
    ResourceRef, Severity, MAX_DOWNTIME_MINUTES,
};
use envguard_core::records::conflicts_for_refresh;
use envguard_core::{
    check_conflicts_for_refresh, create_refresh_intent, ensure_approvable, reschedule_refresh,
    revalidate_conflicts, ActivityEvent, Error, FixedClock, ForceOverride, RefreshCheckRequest,
    Store, TracingActivityLog,
};
use pretty_assertions::assert_eq;

fn request(
    entity: ResourceRef,
    start: (u32, u32),
    end: Option<(u32, u32)>,
    impact_type: ImpactType,
) -> RefreshCheckRequest {
    RefreshCheckRequest {
        entity,
        planned_start: at(start.0, start.1),
        planned_end: end.map(|(h, m)| at(h, m)),
        impact_type,
        estimated_downtime_minutes: None,
        refresh_intent_id: None,
    }
}

fn book(
    store: &mut Store,
    resource: ResourceRef,
    start: (u32, u32),
    end: (u32, u32),
    status: BookingStatus,
    priority: BookingPriority,
) -> String {
    store
        .insert_booking(new_booking(
            resource,
            at(start.0, start.1),
            at(end.0, end.1),
            status,
            priority,
        ))
        .unwrap()
        .id
}

// ── Scenario ────────────────────────────────────────────────────────────────

#[test]
fn active_critical_booking_blocks_data_overwrite() {
    let mut store = store_with_inventory();
    let booking_id = book(
        &mut store,
        ResourceRef::instance("inst-x"),
        (10, 0),
        (14, 0),
        BookingStatus::Active,
        BookingPriority::Critical,
    );
    let log = RecordingLog::default();

    let (intent, result) = create_refresh_intent(
        &mut store,
        &FixedClock(at(8, 0)),
        &log,
        new_refresh(
            ResourceRef::instance("inst-x"),
            at(12, 0),
            Some(at(13, 0)),
            ImpactType::DataOverwrite,
            RefreshStatus::Requested,
        ),
    )
    .unwrap();

    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].booking_id, booking_id);
    assert_eq!(result.conflicts[0].severity, Severity::High);
    assert_eq!(result.conflicts[0].overlap.duration_minutes, 60);
    assert_eq!(result.conflict_flag, ConflictFlag::Major);
    assert!(result.requires_force_approval);
    assert_eq!(result.impacted_group_ids, vec!["team-a".to_string()]);
    assert_eq!(result.refresh_intent_id.as_deref(), Some(intent.id.as_str()));

    assert_eq!(intent.conflict_flag, ConflictFlag::Major);
    let stored = store.require_refresh_intent(&intent.id).unwrap();
    assert_eq!(stored.conflict_flag, ConflictFlag::Major);

    let rows = conflicts_for_refresh(&store, &intent.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].severity, Severity::High);
    assert_eq!(rows[0].booking_priority, BookingPriority::Critical);

    assert_eq!(
        *log.events.borrow(),
        vec![ActivityEvent::ConflictsRecomputed {
            refresh_intent_id: intent.id.clone(),
            conflict_count: 1,
            conflict_flag: ConflictFlag::Major,
        }]
    );
}

// ── Detection ───────────────────────────────────────────────────────────────

#[test]
fn only_confirmed_bookings_conflict() {
    let mut store = store_with_inventory();
    for status in [
        BookingStatus::Requested,
        BookingStatus::PendingApproval,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ] {
        book(
            &mut store,
            ResourceRef::instance("inst-x"),
            (10, 0),
            (14, 0),
            status,
            BookingPriority::Critical,
        );
    }

    let result = check_conflicts_for_refresh(
        &store,
        &request(
            ResourceRef::instance("inst-x"),
            (12, 0),
            Some((13, 0)),
            ImpactType::DataOverwrite,
        ),
    )
    .unwrap();

    assert!(result.conflicts.is_empty());
    assert_eq!(result.conflict_flag, ConflictFlag::None);
    assert!(!result.requires_force_approval);
}

#[test]
fn environment_refresh_covers_every_instance() {
    let mut store = store_with_inventory();
    let on_x = book(
        &mut store,
        ResourceRef::instance("inst-x"),
        (9, 0),
        (10, 30),
        BookingStatus::Approved,
        BookingPriority::Normal,
    );
    let on_y = book(
        &mut store,
        ResourceRef::instance("inst-y"),
        (10, 0),
        (11, 0),
        BookingStatus::Approved,
        BookingPriority::Low,
    );
    book(
        &mut store,
        ResourceRef::instance("inst-z"),
        (10, 0),
        (11, 0),
        BookingStatus::Active,
        BookingPriority::Critical,
    );

    let result = check_conflicts_for_refresh(
        &store,
        &request(
            ResourceRef::environment("env-1"),
            (10, 0),
            Some((12, 0)),
            ImpactType::ReadOnly,
        ),
    )
    .unwrap();

    let ids: Vec<_> = result.conflicts.iter().map(|c| c.booking_id.clone()).collect();
    assert_eq!(ids, vec![on_x, on_y]);
    assert!(result.conflicts.iter().all(|c| c.severity == Severity::Low));
    assert_eq!(result.conflict_flag, ConflictFlag::Minor);
    assert!(!result.requires_force_approval);
}

#[test]
fn missing_end_uses_estimate_then_default() {
    let mut store = store_with_inventory();
    book(
        &mut store,
        ResourceRef::instance("inst-y"),
        (11, 30),
        (12, 0),
        BookingStatus::Approved,
        BookingPriority::Normal,
    );

    let default_window = request(ResourceRef::instance("inst-y"), (10, 0), None, ImpactType::SchemaChange);
    let result = check_conflicts_for_refresh(&store, &default_window).unwrap();
    assert_eq!(result.refresh_window.end, at(11, 0));
    assert!(result.conflicts.is_empty());

    let estimated = RefreshCheckRequest {
        estimated_downtime_minutes: Some(120),
        ..default_window
    };
    let result = check_conflicts_for_refresh(&store, &estimated).unwrap();
    assert_eq!(result.refresh_window.end, at(12, 0));
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].severity, Severity::Medium);
    assert_eq!(result.conflict_flag, ConflictFlag::Minor);
}

#[test]
fn impacted_groups_are_deduplicated() {
    let mut store = store_with_inventory();
    for resource in [
        ResourceRef::instance("inst-x"),
        ResourceRef::component("comp-app"),
        ResourceRef::component("comp-db"),
    ] {
        book(
            &mut store,
            resource,
            (10, 0),
            (11, 0),
            BookingStatus::Active,
            BookingPriority::Normal,
        );
    }

    let result = check_conflicts_for_refresh(
        &store,
        &request(
            ResourceRef::instance("inst-x"),
            (10, 0),
            Some((11, 0)),
            ImpactType::DowntimeRequired,
        ),
    )
    .unwrap();

    assert_eq!(result.conflicts.len(), 3);
    assert_eq!(result.impacted_group_ids, vec!["team-a".to_string()]);
}

#[test]
fn unknown_entity_and_empty_window_are_rejected() {
    let store = store_with_inventory();

    let err = check_conflicts_for_refresh(
        &store,
        &request(
            ResourceRef::instance("nope"),
            (10, 0),
            Some((11, 0)),
            ImpactType::ReadOnly,
        ),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = check_conflicts_for_refresh(
        &store,
        &request(
            ResourceRef::instance("inst-x"),
            (11, 0),
            Some((11, 0)),
            ImpactType::ReadOnly,
        ),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn unrecognized_impact_is_rejected_on_create() {
    let mut store = store_with_inventory();
    let err = create_refresh_intent(
        &mut store,
        &FixedClock(at(8, 0)),
        &TracingActivityLog,
        new_refresh(
            ResourceRef::instance("inst-x"),
            at(12, 0),
            None,
            ImpactType::Unrecognized("WIPE".to_string()),
            RefreshStatus::Draft,
        ),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnknownStatus { .. }));
}

#[test]
fn oversized_downtime_estimates_are_rejected() {
    let mut store = store_with_inventory();
    let clock = FixedClock(at(8, 0));
    let inst_x = ResourceRef::instance("inst-x");

    for minutes in [i64::MAX / 1000, MAX_DOWNTIME_MINUTES + 1] {
        let mut new = new_refresh(
            inst_x.clone(),
            at(12, 0),
            None,
            ImpactType::DowntimeRequired,
            RefreshStatus::Draft,
        );
        new.estimated_downtime_minutes = Some(minutes);
        let err = create_refresh_intent(&mut store, &clock, &TracingActivityLog, new).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{minutes} minutes");

        let mut check = request(inst_x.clone(), (12, 0), None, ImpactType::DowntimeRequired);
        check.estimated_downtime_minutes = Some(minutes);
        let err = check_conflicts_for_refresh(&store, &check).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{minutes} minutes");
    }

    let (intent, _) = create_refresh_intent(
        &mut store,
        &clock,
        &TracingActivityLog,
        new_refresh(inst_x, at(12, 0), None, ImpactType::DowntimeRequired, RefreshStatus::Draft),
    )
    .unwrap();
    let err = reschedule_refresh(
        &mut store,
        &clock,
        &TracingActivityLog,
        &intent.id,
        &RefreshChange {
            estimated_downtime_minutes: Some(Some(i64::MAX / 1000)),
            ..RefreshChange::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(
        store.require_refresh_intent(&intent.id).unwrap().estimated_downtime_minutes,
        None
    );
}

// ── Revalidation ────────────────────────────────────────────────────────────

#[test]
fn reschedule_moves_the_window_and_recomputes() {
    let mut store = store_with_inventory();
    let booking_id = book(
        &mut store,
        ResourceRef::instance("inst-x"),
        (10, 0),
        (14, 0),
        BookingStatus::Active,
        BookingPriority::Normal,
    );
    let clock = FixedClock(at(8, 0));
    let (intent, created) = create_refresh_intent(
        &mut store,
        &clock,
        &TracingActivityLog,
        new_refresh(
            ResourceRef::instance("inst-x"),
            at(12, 0),
            Some(at(13, 0)),
            ImpactType::DowntimeRequired,
            RefreshStatus::Requested,
        ),
    )
    .unwrap();
    assert_eq!(created.conflict_flag, ConflictFlag::Major);

    let (moved, result) = reschedule_refresh(
        &mut store,
        &clock,
        &TracingActivityLog,
        &intent.id,
        &RefreshChange {
            planned_start: Some(at(15, 0)),
            planned_end: Some(Some(at(16, 0))),
            ..RefreshChange::default()
        },
    )
    .unwrap();

    assert_eq!(moved.planned_start, at(15, 0));
    assert!(result.conflicts.is_empty());
    assert_eq!(moved.conflict_flag, ConflictFlag::None);
    assert!(conflicts_for_refresh(&store, &intent.id).unwrap().is_empty());

    // Switching to a non-destructive impact back inside the booking gives a
    // LOW conflict only.
    let (_, result) = reschedule_refresh(
        &mut store,
        &clock,
        &TracingActivityLog,
        &intent.id,
        &RefreshChange {
            planned_start: Some(at(13, 0)),
            planned_end: Some(None),
            estimated_downtime_minutes: Some(Some(30)),
            impact_type: Some(ImpactType::ConfigChange),
        },
    )
    .unwrap();
    assert_eq!(result.refresh_window.end, at(13, 30));
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].booking_id, booking_id);
    assert_eq!(result.conflicts[0].severity, Severity::Low);
    assert_eq!(
        store.require_refresh_intent(&intent.id).unwrap().conflict_flag,
        ConflictFlag::Minor
    );
}

#[test]
fn empty_or_invalid_change_is_rejected() {
    let mut store = store_with_inventory();
    let clock = FixedClock(at(8, 0));
    let (intent, _) = create_refresh_intent(
        &mut store,
        &clock,
        &TracingActivityLog,
        new_refresh(
            ResourceRef::instance("inst-x"),
            at(12, 0),
            Some(at(13, 0)),
            ImpactType::ReadOnly,
            RefreshStatus::Draft,
        ),
    )
    .unwrap();

    let err = reschedule_refresh(
        &mut store,
        &clock,
        &TracingActivityLog,
        &intent.id,
        &RefreshChange::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = reschedule_refresh(
        &mut store,
        &clock,
        &TracingActivityLog,
        &intent.id,
        &RefreshChange {
            planned_end: Some(Some(at(11, 0))),
            ..RefreshChange::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let unchanged = store.require_refresh_intent(&intent.id).unwrap();
    assert_eq!(unchanged.planned_end, Some(at(13, 0)));
}

#[test]
fn revalidate_picks_up_bookings_confirmed_later() {
    let mut store = store_with_inventory();
    let clock = FixedClock(at(8, 0));
    let (intent, created) = create_refresh_intent(
        &mut store,
        &clock,
        &TracingActivityLog,
        new_refresh(
            ResourceRef::environment("env-2"),
            at(12, 0),
            Some(at(13, 0)),
            ImpactType::DataOverwrite,
            RefreshStatus::Scheduled,
        ),
    )
    .unwrap();
    assert!(created.conflicts.is_empty());

    let booking_id = book(
        &mut store,
        ResourceRef::instance("inst-z"),
        (11, 0),
        (12, 30),
        BookingStatus::Requested,
        BookingPriority::High,
    );
    envguard_core::set_booking_status(&mut store, &booking_id, BookingStatus::Approved).unwrap();

    let log = RecordingLog::default();
    let result = revalidate_conflicts(&mut store, &clock, &log, &intent.id).unwrap();
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].severity, Severity::High);
    assert_eq!(result.conflict_flag, ConflictFlag::Major);
    assert_eq!(log.events.borrow().len(), 1);

    // Running it again changes nothing.
    let again = revalidate_conflicts(&mut store, &clock, &log, &intent.id).unwrap();
    assert_eq!(again.conflicts, result.conflicts);
    assert_eq!(conflicts_for_refresh(&store, &intent.id).unwrap().len(), 1);

    assert!(matches!(
        revalidate_conflicts(&mut store, &clock, &log, "missing"),
        Err(Error::NotFound { .. })
    ));
}

// ── Approval gate ───────────────────────────────────────────────────────────

#[test]
fn major_flag_needs_an_override() {
    let mut store = store_with_inventory();
    book(
        &mut store,
        ResourceRef::instance("inst-x"),
        (10, 0),
        (14, 0),
        BookingStatus::Active,
        BookingPriority::Normal,
    );
    let (intent, _) = create_refresh_intent(
        &mut store,
        &FixedClock(at(8, 0)),
        &TracingActivityLog,
        new_refresh(
            ResourceRef::instance("inst-x"),
            at(12, 0),
            Some(at(13, 0)),
            ImpactType::SchemaChange,
            RefreshStatus::Requested,
        ),
    )
    .unwrap();
    let log = RecordingLog::default();

    assert!(matches!(
        ensure_approvable(&intent, None, &log),
        Err(Error::ForceApprovalRequired(id)) if id == intent.id
    ));

    let blank = ForceOverride {
        approver_id: "cab-chair".to_string(),
        reason: " ".to_string(),
    };
    assert!(matches!(
        ensure_approvable(&intent, Some(&blank), &log),
        Err(Error::InvalidInput(_))
    ));
    assert!(log.events.borrow().is_empty());

    let force = ForceOverride {
        approver_id: "cab-chair".to_string(),
        reason: "release freeze exception".to_string(),
    };
    ensure_approvable(&intent, Some(&force), &log).unwrap();
    assert_eq!(
        *log.events.borrow(),
        vec![ActivityEvent::ForceApprovalOverride {
            refresh_intent_id: intent.id.clone(),
            approver_id: "cab-chair".to_string(),
            reason: "release freeze exception".to_string(),
        }]
    );
}

#[test]
fn unflagged_intent_approves_without_override() {
    let mut store = store_with_inventory();
    let (intent, _) = create_refresh_intent(
        &mut store,
        &FixedClock(at(8, 0)),
        &TracingActivityLog,
        new_refresh(
            ResourceRef::instance("inst-y"),
            at(12, 0),
            Some(at(13, 0)),
            ImpactType::DataOverwrite,
            RefreshStatus::Requested,
        ),
    )
    .unwrap();
    let log = RecordingLog::default();

    ensure_approvable(&intent, None, &log).unwrap();
    assert!(log.events.borrow().is_empty());
}
