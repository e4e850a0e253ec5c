use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ms_column, opt_ms_column, to_ms};
use crate::error::{Error, Result};
use crate::interval::{Overlap, TimeWindow};
use crate::model::{new_id, Conflict, NewConflict, ResolutionStatus, ResourceRef};
use crate::records::{ConflictFilter, ConflictView};

const CONFLICT_COLUMNS: &str = "c.id, c.refresh_intent_id, c.booking_id, c.conflict_type, \
     c.severity, c.resolution_status, c.overlap_start_ms, c.overlap_end_ms, c.overlap_minutes, \
     c.booking_is_critical, c.booking_priority, c.auto_detected, c.detected_at_ms, \
     c.resolved_at_ms, c.resolved_by, c.resolution_notes, c.notified_at_ms";

/// Number of columns in `CONFLICT_COLUMNS`; joined columns start here.
const CONFLICT_COLUMN_COUNT: usize = 17;

fn parse_conflict_row(row: &Row<'_>) -> rusqlite::Result<Conflict> {
    Ok(Conflict {
        id: row.get(0)?,
        refresh_intent_id: row.get(1)?,
        booking_id: row.get(2)?,
        conflict_type: row.get(3)?,
        severity: row.get(4)?,
        resolution_status: row.get(5)?,
        overlap: Overlap {
            start: ms_column(row, 6)?,
            end: ms_column(row, 7)?,
            duration_minutes: row.get(8)?,
        },
        booking_is_critical: row.get(9)?,
        booking_priority: row.get(10)?,
        auto_detected: row.get(11)?,
        detected_at: ms_column(row, 12)?,
        resolved_at: opt_ms_column(row, 13)?,
        resolved_by: row.get(14)?,
        resolution_notes: row.get(15)?,
        notified_at: opt_ms_column(row, 16)?,
    })
}

/// Replace every conflict row of `intent_id` with `conflicts`.
///
/// Rows are keyed by (refresh intent, booking): a booking listed twice ends up
/// as one row carrying the last entry. With `preserve_resolutions`, a resolved
/// row whose overlap window and severity are unchanged keeps its id and
/// resolution fields. Returns the number of rows the intent now has.
pub(crate) fn replace_conflicts(
    conn: &Connection,
    intent_id: &str,
    conflicts: &[NewConflict],
    detected_at: DateTime<Utc>,
    preserve_resolutions: bool,
) -> Result<usize> {
    let carried: HashMap<String, Conflict> = if preserve_resolutions {
        conflicts_for_intent(conn, intent_id)?
            .into_iter()
            .filter(|existing| existing.resolution_status.is_resolved())
            .map(|existing| (existing.booking_id.clone(), existing))
            .collect()
    } else {
        HashMap::new()
    };

    conn.execute(
        "DELETE FROM refresh_conflicts WHERE refresh_intent_id = ?1",
        params![intent_id],
    )?;

    let mut stmt = conn.prepare(
        r#"
        INSERT INTO refresh_conflicts (
          id, refresh_intent_id, booking_id, conflict_type, severity, resolution_status,
          overlap_start_ms, overlap_end_ms, overlap_minutes, booking_is_critical,
          booking_priority, auto_detected, detected_at_ms, resolved_at_ms, resolved_by,
          resolution_notes, notified_at_ms
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?13, ?14, ?15, ?16)
        ON CONFLICT (refresh_intent_id, booking_id) DO UPDATE SET
          conflict_type = excluded.conflict_type,
          severity = excluded.severity,
          overlap_start_ms = excluded.overlap_start_ms,
          overlap_end_ms = excluded.overlap_end_ms,
          overlap_minutes = excluded.overlap_minutes,
          booking_is_critical = excluded.booking_is_critical,
          booking_priority = excluded.booking_priority,
          detected_at_ms = excluded.detected_at_ms
        "#,
    )?;

    for conflict in conflicts {
        let prior = carried.get(&conflict.booking_id).filter(|prior| {
            prior.overlap.start == conflict.overlap.start
                && prior.overlap.end == conflict.overlap.end
                && prior.severity == conflict.severity
        });
        let (id, resolution_status, resolved_at, resolved_by, notes, notified_at) = match prior {
            Some(prior) => (
                prior.id.clone(),
                prior.resolution_status,
                prior.resolved_at,
                prior.resolved_by.clone(),
                prior.resolution_notes.clone(),
                prior.notified_at,
            ),
            None => (new_id(), ResolutionStatus::Unresolved, None, None, None, None),
        };
        stmt.execute(params![
            id,
            intent_id,
            conflict.booking_id,
            conflict.conflict_type,
            conflict.severity,
            resolution_status,
            to_ms(conflict.overlap.start),
            to_ms(conflict.overlap.end),
            conflict.overlap.duration_minutes,
            conflict.booking_is_critical,
            conflict.booking_priority,
            to_ms(detected_at),
            resolved_at.map(to_ms),
            resolved_by,
            notes,
            notified_at.map(to_ms),
        ])?;
    }

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM refresh_conflicts WHERE refresh_intent_id = ?1",
        params![intent_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or_default())
}

pub(crate) fn get_conflict(conn: &Connection, id: &str) -> Result<Option<Conflict>> {
    Ok(conn
        .query_row(
            &format!("SELECT {CONFLICT_COLUMNS} FROM refresh_conflicts c WHERE c.id = ?1"),
            params![id],
            parse_conflict_row,
        )
        .optional()?)
}

pub(crate) fn conflicts_for_intent(conn: &Connection, intent_id: &str) -> Result<Vec<Conflict>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONFLICT_COLUMNS} FROM refresh_conflicts c \
         WHERE c.refresh_intent_id = ?1 ORDER BY c.overlap_start_ms, c.booking_id"
    ))?;
    let rows = stmt
        .query_map(params![intent_id], parse_conflict_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn update_resolution(
    conn: &Connection,
    id: &str,
    status: ResolutionStatus,
    resolver_id: &str,
    notes: Option<&str>,
    resolved_at: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE refresh_conflicts
        SET resolution_status = ?2, resolved_by = ?3, resolution_notes = ?4, resolved_at_ms = ?5
        WHERE id = ?1
        "#,
        params![id, status, resolver_id, notes, to_ms(resolved_at)],
    )?;
    if changed == 0 {
        return Err(Error::not_found("conflict", id));
    }
    Ok(())
}

pub(crate) fn unnotified_conflicts(conn: &Connection, intent_id: &str) -> Result<Vec<Conflict>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONFLICT_COLUMNS} FROM refresh_conflicts c \
         WHERE c.refresh_intent_id = ?1 AND c.notified_at_ms IS NULL \
         ORDER BY c.overlap_start_ms, c.booking_id"
    ))?;
    let rows = stmt
        .query_map(params![intent_id], parse_conflict_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn mark_notified(conn: &Connection, id: &str, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE refresh_conflicts SET notified_at_ms = ?2 WHERE id = ?1",
        params![id, to_ms(at)],
    )?;
    Ok(())
}

/// Unresolved conflicts joined with their booking and refresh context,
/// most severe first.
pub(crate) fn unresolved_views(
    conn: &Connection,
    filter: &ConflictFilter,
) -> Result<Vec<ConflictView>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {CONFLICT_COLUMNS},
               b.title, b.owner_id, b.owning_group_id, b.status, b.start_ms, b.end_ms,
               r.title, r.entity_type, r.entity_id, r.status, r.impact_type
        FROM refresh_conflicts c
        JOIN bookings b ON b.id = c.booking_id
        JOIN refresh_intents r ON r.id = c.refresh_intent_id
        WHERE c.resolution_status = ?1
          AND (?2 IS NULL OR r.entity_type = ?2)
          AND (?3 IS NULL OR c.severity = ?3)
          AND (?4 IS NULL OR b.owning_group_id = ?4)
        ORDER BY CASE c.severity WHEN 'HIGH' THEN 0 WHEN 'MEDIUM' THEN 1 ELSE 2 END,
                 c.overlap_start_ms, c.id
        "#
    ))?;
    let base = CONFLICT_COLUMN_COUNT;
    let rows = stmt
        .query_map(
            params![
                ResolutionStatus::Unresolved,
                filter.entity_type,
                filter.severity,
                filter.owning_group_id
            ],
            |row| {
                Ok(ConflictView {
                    conflict: parse_conflict_row(row)?,
                    booking_title: row.get(base)?,
                    booking_owner_id: row.get(base + 1)?,
                    owning_group_id: row.get(base + 2)?,
                    booking_status: row.get(base + 3)?,
                    booking_window: TimeWindow::new(
                        ms_column(row, base + 4)?,
                        ms_column(row, base + 5)?,
                    ),
                    refresh_title: row.get(base + 6)?,
                    refresh_entity: ResourceRef::new(
                        row.get(base + 7)?,
                        row.get::<_, String>(base + 8)?,
                    ),
                    refresh_status: row.get(base + 9)?,
                    impact_type: row.get(base + 10)?,
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
