//! SQLite persistence.
//!
//! Query helpers in the submodules take a `&Connection`, so the same code runs
//! on the plain connection and inside a `Transaction` (which derefs to one).
//! `Store` methods wrap them for callers that do not need a transaction.

mod bookings;
mod conflicts;
mod refreshes;
mod resources;
mod schema;

pub(crate) use bookings::{
    booking_statuses_on, get_booking, insert_booking, mark_resource_conflict,
    overlapping_booking_ids, set_booking_status,
};
pub(crate) use conflicts::{
    conflicts_for_intent, get_conflict, mark_notified, replace_conflicts, unnotified_conflicts,
    unresolved_views, update_resolution,
};
pub(crate) use refreshes::{
    get_refresh, insert_refresh, overlapping_refreshes, set_conflict_flag, update_refresh_timing,
};
pub(crate) use resources::{
    component_ids_of, instances_booked_by, require_resource, set_component_status,
    set_instance_status,
};

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{
    BookingPriority, BookingStatus, ComponentStatus, ConflictFlag, ConflictType, ImpactType,
    InstanceBookingStatus, RefreshStatus, ResolutionStatus, ResourceConflictStatus, ResourceKind,
    Severity,
};

/// Handle on the backing database plus the engine configuration it was opened with.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    config: EngineConfig,
}

impl Store {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )?;
        Self::init(conn, config)
    }

    /// Open a private in-memory database with the default configuration.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(EngineConfig::default())
    }

    pub fn open_in_memory_with(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Self::init(Connection::open_in_memory()?, config)
    }

    fn init(conn: Connection, config: EngineConfig) -> Result<Self> {
        conn.busy_timeout(config.busy_timeout())?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn, config })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schema_version(&self) -> Result<i64> {
        schema::current_version(&self.conn)
    }

    pub(crate) const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start a write transaction that takes the database lock up front, so a
    /// check-then-insert sequence cannot interleave with another writer.
    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

pub(crate) fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn ms_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

pub(crate) fn opt_ms_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let Some(ms) = row.get::<_, Option<i64>>(idx)? else {
        return Ok(None);
    };
    DateTime::from_timestamp_millis(ms)
        .map(Some)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

/// Closed enums are stored as their text form and validated on the way back.
macro_rules! sql_text_enum {
    ($($ty:ty),+ $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }
    )+};
}

sql_text_enum!(
    BookingPriority,
    BookingStatus,
    ComponentStatus,
    ConflictFlag,
    ConflictType,
    InstanceBookingStatus,
    RefreshStatus,
    ResolutionStatus,
    ResourceConflictStatus,
    ResourceKind,
    Severity,
);

impl ToSql for ImpactType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ImpactType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Self::from_stored(value.as_str()?))
    }
}
