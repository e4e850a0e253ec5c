//! Schema migrations.

use rusqlite::Connection;

use crate::error::Result;

/// Run all pending migrations.
pub(super) fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
    )?;
    let version = current_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
        tracing::debug!("applied schema migration v1");
    }

    Ok(())
}

pub(super) fn current_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?)
}

/// Version 1: resource tree, bookings, refresh intents and their conflicts.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        BEGIN;

        CREATE TABLE IF NOT EXISTS environments (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS environment_instances (
          id TEXT PRIMARY KEY,
          environment_id TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          booking_status TEXT NOT NULL DEFAULT 'Available'
        );

        CREATE TABLE IF NOT EXISTS infra_components (
          id TEXT PRIMARY KEY,
          instance_id TEXT NOT NULL REFERENCES environment_instances(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          booking_status TEXT NOT NULL DEFAULT 'Available'
        );

        CREATE TABLE IF NOT EXISTS bookings (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          start_ms INTEGER NOT NULL,
          end_ms INTEGER NOT NULL,
          status TEXT NOT NULL,
          priority TEXT NOT NULL,
          is_critical INTEGER NOT NULL DEFAULT 0,
          owner_id TEXT NOT NULL,
          owning_group_id TEXT,
          CHECK (start_ms < end_ms)
        );

        CREATE TABLE IF NOT EXISTS booking_resources (
          booking_id TEXT NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
          resource_type TEXT NOT NULL,
          resource_id TEXT NOT NULL,
          conflict_status TEXT NOT NULL DEFAULT 'None',
          conflicting_booking_id TEXT,
          PRIMARY KEY (booking_id, resource_type, resource_id)
        );

        CREATE TABLE IF NOT EXISTS refresh_intents (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          entity_type TEXT NOT NULL,
          entity_id TEXT NOT NULL,
          planned_start_ms INTEGER NOT NULL,
          planned_end_ms INTEGER,
          estimated_downtime_minutes INTEGER,
          window_end_ms INTEGER NOT NULL,
          impact_type TEXT NOT NULL,
          status TEXT NOT NULL,
          conflict_flag TEXT NOT NULL DEFAULT 'NONE',
          requested_by TEXT
        );

        CREATE TABLE IF NOT EXISTS refresh_conflicts (
          id TEXT PRIMARY KEY,
          refresh_intent_id TEXT NOT NULL REFERENCES refresh_intents(id) ON DELETE CASCADE,
          booking_id TEXT NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
          conflict_type TEXT NOT NULL DEFAULT 'OVERLAP',
          severity TEXT NOT NULL,
          resolution_status TEXT NOT NULL DEFAULT 'UNRESOLVED',
          overlap_start_ms INTEGER NOT NULL,
          overlap_end_ms INTEGER NOT NULL,
          overlap_minutes INTEGER NOT NULL,
          booking_is_critical INTEGER NOT NULL,
          booking_priority TEXT NOT NULL,
          auto_detected INTEGER NOT NULL DEFAULT 1,
          detected_at_ms INTEGER NOT NULL,
          resolved_at_ms INTEGER,
          resolved_by TEXT,
          resolution_notes TEXT,
          notified_at_ms INTEGER,
          UNIQUE (refresh_intent_id, booking_id)
        );

        CREATE INDEX IF NOT EXISTS idx_instances_environment ON environment_instances(environment_id);
        CREATE INDEX IF NOT EXISTS idx_components_instance ON infra_components(instance_id);
        CREATE INDEX IF NOT EXISTS idx_bookings_window ON bookings(start_ms, end_ms);
        CREATE INDEX IF NOT EXISTS idx_booking_resources_resource ON booking_resources(resource_type, resource_id);
        CREATE INDEX IF NOT EXISTS idx_refresh_entity_window ON refresh_intents(entity_type, entity_id, planned_start_ms);
        CREATE INDEX IF NOT EXISTS idx_conflicts_resolution ON refresh_conflicts(resolution_status, severity);

        INSERT INTO schema_version (version) VALUES (1);

        COMMIT;
        "#,
    )?;
    Ok(())
}
