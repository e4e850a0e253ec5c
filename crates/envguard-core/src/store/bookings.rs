use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ms_column, to_ms, Store};
use crate::error::{Error, Result};
use crate::interval::TimeWindow;
use crate::model::{
    new_id, Booking, BookingResource, BookingStatus, NewBooking, ResourceConflictStatus,
    ResourceRef,
};

const BOOKING_COLUMNS: &str =
    "id, title, start_ms, end_ms, status, priority, is_critical, owner_id, owning_group_id";

fn parse_booking_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        title: row.get(1)?,
        resources: Vec::new(),
        start: ms_column(row, 2)?,
        end: ms_column(row, 3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        is_critical: row.get(6)?,
        owner_id: row.get(7)?,
        owning_group_id: row.get(8)?,
    })
}

pub(crate) fn insert_booking(conn: &Connection, booking: &Booking) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            booking.id,
            booking.title,
            to_ms(booking.start),
            to_ms(booking.end),
            booking.status,
            booking.priority,
            booking.is_critical,
            booking.owner_id,
            booking.owning_group_id,
        ],
    )?;
    for resource in &booking.resources {
        conn.execute(
            "INSERT INTO booking_resources (booking_id, resource_type, resource_id) VALUES (?1, ?2, ?3)",
            params![booking.id, resource.kind, resource.id],
        )?;
    }
    Ok(())
}

pub(crate) fn get_booking(conn: &Connection, id: &str) -> Result<Option<Booking>> {
    let row = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;
    let Some(mut booking) = row else {
        return Ok(None);
    };
    booking.resources = list_booking_resources(conn, id)?
        .into_iter()
        .map(|row| row.resource)
        .collect();
    booking.resources.sort();
    Ok(Some(booking))
}

pub(crate) fn list_booking_resources(
    conn: &Connection,
    booking_id: &str,
) -> Result<Vec<BookingResource>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT resource_type, resource_id, conflict_status, conflicting_booking_id
        FROM booking_resources
        WHERE booking_id = ?1
        ORDER BY resource_type, resource_id
        "#,
    )?;
    let rows = stmt
        .query_map(params![booking_id], |row| {
            Ok(BookingResource {
                booking_id: booking_id.to_string(),
                resource: ResourceRef::new(row.get(0)?, row.get::<_, String>(1)?),
                conflict_status: row.get(2)?,
                conflicting_booking_id: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Ids of bookings holding `resource` (exact match) whose window overlaps `window`,
/// in start order.
pub(crate) fn overlapping_booking_ids(
    conn: &Connection,
    resource: &ResourceRef,
    window: TimeWindow,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT b.id, b.start_ms
        FROM bookings b
        JOIN booking_resources br ON br.booking_id = b.id
        WHERE br.resource_type = ?1 AND br.resource_id = ?2
          AND b.start_ms < ?4 AND b.end_ms > ?3
        ORDER BY b.start_ms, b.id
        "#,
    )?;
    let ids = stmt
        .query_map(
            params![
                resource.kind,
                resource.id,
                to_ms(window.start),
                to_ms(window.end)
            ],
            |row| row.get(0),
        )?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Statuses of every booking that names `resource` directly.
pub(crate) fn booking_statuses_on(
    conn: &Connection,
    resource: &ResourceRef,
) -> Result<Vec<BookingStatus>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT b.status
        FROM bookings b
        JOIN booking_resources br ON br.booking_id = b.id
        WHERE br.resource_type = ?1 AND br.resource_id = ?2
        "#,
    )?;
    let statuses = stmt
        .query_map(params![resource.kind, resource.id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<BookingStatus>>>()?;
    Ok(statuses)
}

pub(crate) fn set_booking_status(conn: &Connection, id: &str, status: BookingStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE bookings SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;
    if changed == 0 {
        return Err(Error::not_found("booking", id));
    }
    Ok(())
}

pub(crate) fn delete_booking(conn: &Connection, id: &str) -> Result<()> {
    let status: Option<BookingStatus> = conn
        .query_row(
            "SELECT status FROM bookings WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match status {
        None => Err(Error::not_found("booking", id)),
        Some(BookingStatus::Active) => Err(Error::BookingActive(id.to_string())),
        Some(_) => {
            conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
            Ok(())
        }
    }
}

pub(crate) fn mark_resource_conflict(
    conn: &Connection,
    booking_id: &str,
    resource: &ResourceRef,
    conflicting_booking_id: &str,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE booking_resources
        SET conflict_status = ?4, conflicting_booking_id = ?5
        WHERE booking_id = ?1 AND resource_type = ?2 AND resource_id = ?3
        "#,
        params![
            booking_id,
            resource.kind,
            resource.id,
            ResourceConflictStatus::PotentialConflict,
            conflicting_booking_id
        ],
    )?;
    Ok(())
}

impl Store {
    /// Insert a booking as-is, without any conflict check.
    pub fn insert_booking(&mut self, new: NewBooking) -> Result<Booking> {
        new.validate()?;
        let booking = new.into_booking(new_id());
        let tx = self.transaction()?;
        for resource in &booking.resources {
            super::require_resource(&tx, resource)?;
        }
        insert_booking(&tx, &booking)?;
        tx.commit()?;
        Ok(booking)
    }

    pub fn get_booking(&self, id: &str) -> Result<Option<Booking>> {
        get_booking(self.conn(), id)
    }

    pub fn booking_resources(&self, booking_id: &str) -> Result<Vec<BookingResource>> {
        list_booking_resources(self.conn(), booking_id)
    }

    /// Delete a booking. Active bookings are refused.
    pub fn delete_booking(&mut self, id: &str) -> Result<()> {
        let tx = self.transaction()?;
        delete_booking(&tx, id)?;
        tx.commit()?;
        Ok(())
    }
}
