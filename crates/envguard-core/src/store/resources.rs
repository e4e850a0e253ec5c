use rusqlite::{params, Connection, OptionalExtension};

use super::Store;
use crate::error::{Error, Result};
use crate::model::{
    ComponentStatus, InstanceBookingStatus, ResourceHierarchy, ResourceKind, ResourceRef,
};

impl ResourceHierarchy for Connection {
    fn children(&self, resource: &ResourceRef) -> Result<Vec<ResourceRef>> {
        match resource.kind {
            ResourceKind::Environment => Ok(instance_ids_of(self, &resource.id)?
                .into_iter()
                .map(ResourceRef::instance)
                .collect()),
            ResourceKind::EnvironmentInstance => Ok(component_ids_of(self, &resource.id)?
                .into_iter()
                .map(ResourceRef::component)
                .collect()),
            ResourceKind::InfraComponent => Ok(Vec::new()),
        }
    }

    fn parent(&self, resource: &ResourceRef) -> Result<Option<ResourceRef>> {
        let parent = match resource.kind {
            ResourceKind::Environment => None,
            ResourceKind::EnvironmentInstance => self
                .query_row(
                    "SELECT environment_id FROM environment_instances WHERE id = ?1",
                    params![resource.id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .map(ResourceRef::environment),
            ResourceKind::InfraComponent => self
                .query_row(
                    "SELECT instance_id FROM infra_components WHERE id = ?1",
                    params![resource.id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .map(ResourceRef::instance),
        };
        Ok(parent)
    }
}

impl ResourceHierarchy for Store {
    fn children(&self, resource: &ResourceRef) -> Result<Vec<ResourceRef>> {
        self.conn().children(resource)
    }

    fn parent(&self, resource: &ResourceRef) -> Result<Option<ResourceRef>> {
        self.conn().parent(resource)
    }
}

pub(crate) fn instance_ids_of(conn: &Connection, environment_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM environment_instances WHERE environment_id = ?1 ORDER BY id",
    )?;
    let ids = stmt
        .query_map(params![environment_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

pub(crate) fn component_ids_of(conn: &Connection, instance_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM infra_components WHERE instance_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![instance_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

fn resource_exists(conn: &Connection, resource: &ResourceRef) -> Result<bool> {
    let table = match resource.kind {
        ResourceKind::Environment => "environments",
        ResourceKind::EnvironmentInstance => "environment_instances",
        ResourceKind::InfraComponent => "infra_components",
    };
    let exists: bool = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
        params![resource.id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Fail with `NotFound` unless the resource is known to the store.
pub(crate) fn require_resource(conn: &Connection, resource: &ResourceRef) -> Result<()> {
    if resource_exists(conn, resource)? {
        Ok(())
    } else {
        Err(Error::not_found(resource.kind.as_str(), resource.id.clone()))
    }
}

pub(crate) fn set_component_status(
    conn: &Connection,
    component_id: &str,
    status: ComponentStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE infra_components SET booking_status = ?2 WHERE id = ?1",
        params![component_id, status],
    )?;
    Ok(())
}

pub(crate) fn set_instance_status(
    conn: &Connection,
    instance_id: &str,
    status: InstanceBookingStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE environment_instances SET booking_status = ?2 WHERE id = ?1",
        params![instance_id, status],
    )?;
    Ok(())
}

impl Store {
    pub fn add_environment(&self, id: &str, name: &str) -> Result<ResourceRef> {
        self.conn().execute(
            "INSERT INTO environments (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
        Ok(ResourceRef::environment(id))
    }

    pub fn add_instance(&self, id: &str, environment_id: &str, name: &str) -> Result<ResourceRef> {
        require_resource(self.conn(), &ResourceRef::environment(environment_id))?;
        self.conn().execute(
            "INSERT INTO environment_instances (id, environment_id, name) VALUES (?1, ?2, ?3)",
            params![id, environment_id, name],
        )?;
        Ok(ResourceRef::instance(id))
    }

    pub fn add_component(&self, id: &str, instance_id: &str, name: &str) -> Result<ResourceRef> {
        require_resource(self.conn(), &ResourceRef::instance(instance_id))?;
        self.conn().execute(
            "INSERT INTO infra_components (id, instance_id, name) VALUES (?1, ?2, ?3)",
            params![id, instance_id, name],
        )?;
        Ok(ResourceRef::component(id))
    }

    /// Environment instances a booking on `resources` would occupy.
    pub fn instances_booked_by(&self, resources: &[ResourceRef]) -> Result<Vec<String>> {
        instances_booked_by(self.conn(), resources)
    }

    pub fn resource_exists(&self, resource: &ResourceRef) -> Result<bool> {
        resource_exists(self.conn(), resource)
    }

    pub fn instance_booking_status(&self, instance_id: &str) -> Result<InstanceBookingStatus> {
        self.conn()
            .query_row(
                "SELECT booking_status FROM environment_instances WHERE id = ?1",
                params![instance_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::not_found("EnvironmentInstance", instance_id))
    }

    pub fn component_status(&self, component_id: &str) -> Result<ComponentStatus> {
        self.conn()
            .query_row(
                "SELECT booking_status FROM infra_components WHERE id = ?1",
                params![component_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::not_found("InfraComponent", component_id))
    }
}

/// Environment instances a booking on `resources` would occupy, without
/// duplicates. Fails with `NotFound` on an unknown resource.
pub(crate) fn instances_booked_by(
    conn: &Connection,
    resources: &[ResourceRef],
) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for resource in resources {
        require_resource(conn, resource)?;
        for id in instances_covering(conn, resource)? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

/// Environment instances at or below `resource`: every instance of an
/// environment, the instance itself, or the instance owning a component.
fn instances_covering(conn: &Connection, resource: &ResourceRef) -> Result<Vec<String>> {
    match resource.kind {
        ResourceKind::Environment => instance_ids_of(conn, &resource.id),
        ResourceKind::EnvironmentInstance => Ok(vec![resource.id.clone()]),
        ResourceKind::InfraComponent => Ok(conn
            .parent(resource)?
            .map(|instance| vec![instance.id])
            .unwrap_or_default()),
    }
}
