use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ms_column, opt_ms_column, to_ms, Store};
use crate::error::{Error, Result};
use crate::interval::TimeWindow;
use crate::model::{ConflictFlag, RefreshIntent, RefreshStatus, ResourceRef};

const REFRESH_COLUMNS: &str = "id, title, entity_type, entity_id, planned_start_ms, planned_end_ms, \
     estimated_downtime_minutes, impact_type, status, conflict_flag, requested_by";

fn parse_refresh_row(row: &Row<'_>) -> rusqlite::Result<RefreshIntent> {
    Ok(RefreshIntent {
        id: row.get(0)?,
        title: row.get(1)?,
        entity: ResourceRef::new(row.get(2)?, row.get::<_, String>(3)?),
        planned_start: ms_column(row, 4)?,
        planned_end: opt_ms_column(row, 5)?,
        estimated_downtime_minutes: row.get(6)?,
        impact_type: row.get(7)?,
        status: row.get(8)?,
        conflict_flag: row.get(9)?,
        requested_by: row.get(10)?,
    })
}

/// `window_end` is stored alongside the raw fields so overlap queries can use
/// a plain range predicate.
pub(crate) fn insert_refresh(
    conn: &Connection,
    intent: &RefreshIntent,
    window: TimeWindow,
) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO refresh_intents ({REFRESH_COLUMNS}, window_end_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            intent.id,
            intent.title,
            intent.entity.kind,
            intent.entity.id,
            to_ms(intent.planned_start),
            intent.planned_end.map(to_ms),
            intent.estimated_downtime_minutes,
            intent.impact_type,
            intent.status,
            intent.conflict_flag,
            intent.requested_by,
            to_ms(window.end),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_refresh(conn: &Connection, id: &str) -> Result<Option<RefreshIntent>> {
    Ok(conn
        .query_row(
            &format!("SELECT {REFRESH_COLUMNS} FROM refresh_intents WHERE id = ?1"),
            params![id],
            parse_refresh_row,
        )
        .optional()?)
}

pub(crate) fn update_refresh_timing(
    conn: &Connection,
    intent: &RefreshIntent,
    window: TimeWindow,
) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE refresh_intents
        SET planned_start_ms = ?2, planned_end_ms = ?3, estimated_downtime_minutes = ?4,
            impact_type = ?5, window_end_ms = ?6
        WHERE id = ?1
        "#,
        params![
            intent.id,
            to_ms(intent.planned_start),
            intent.planned_end.map(to_ms),
            intent.estimated_downtime_minutes,
            intent.impact_type,
            to_ms(window.end),
        ],
    )?;
    if changed == 0 {
        return Err(Error::not_found("refresh intent", intent.id.clone()));
    }
    Ok(())
}

pub(crate) fn set_conflict_flag(conn: &Connection, id: &str, flag: ConflictFlag) -> Result<()> {
    let changed = conn.execute(
        "UPDATE refresh_intents SET conflict_flag = ?2 WHERE id = ?1",
        params![id, flag],
    )?;
    if changed == 0 {
        return Err(Error::not_found("refresh intent", id));
    }
    Ok(())
}

pub(crate) fn set_refresh_status(conn: &Connection, id: &str, status: RefreshStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE refresh_intents SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;
    if changed == 0 {
        return Err(Error::not_found("refresh intent", id));
    }
    Ok(())
}

pub(crate) fn delete_refresh(conn: &Connection, id: &str) -> Result<()> {
    let changed = conn.execute("DELETE FROM refresh_intents WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(Error::not_found("refresh intent", id));
    }
    Ok(())
}

/// Refresh intents targeting `resource` (exact match) whose stored window
/// overlaps `window`, in planned-start order.
pub(crate) fn overlapping_refreshes(
    conn: &Connection,
    resource: &ResourceRef,
    window: TimeWindow,
) -> Result<Vec<(RefreshIntent, TimeWindow)>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {REFRESH_COLUMNS}, window_end_ms
        FROM refresh_intents
        WHERE entity_type = ?1 AND entity_id = ?2
          AND planned_start_ms < ?4 AND window_end_ms > ?3
        ORDER BY planned_start_ms, id
        "#
    ))?;
    let rows = stmt
        .query_map(
            params![
                resource.kind,
                resource.id,
                to_ms(window.start),
                to_ms(window.end)
            ],
            |row| {
                let intent = parse_refresh_row(row)?;
                let window = TimeWindow::new(intent.planned_start, ms_column(row, 11)?);
                Ok((intent, window))
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl Store {
    pub fn get_refresh_intent(&self, id: &str) -> Result<Option<RefreshIntent>> {
        get_refresh(self.conn(), id)
    }

    /// Load a refresh intent or fail with `NotFound`.
    pub fn require_refresh_intent(&self, id: &str) -> Result<RefreshIntent> {
        self.get_refresh_intent(id)?
            .ok_or_else(|| Error::not_found("refresh intent", id))
    }

    pub fn set_refresh_status(&self, id: &str, status: RefreshStatus) -> Result<()> {
        set_refresh_status(self.conn(), id, status)
    }

    /// Delete a refresh intent; its conflicts go with it.
    pub fn delete_refresh_intent(&self, id: &str) -> Result<()> {
        delete_refresh(self.conn(), id)
    }
}
