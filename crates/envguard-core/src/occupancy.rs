//! Resource occupancy derived from booking statuses.
//!
//! A component is `InUse` while any booking covering it is Active, `Reserved`
//! while one is Approved, otherwise `Available`. A booking covers a component
//! when it names the component, its instance or its environment. Instances
//! fold their components' states. Recomputation only reads bookings and
//! overwrites the derived columns, so running it twice changes nothing.

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::model::{Booking, BookingStatus, ComponentStatus, InstanceBookingStatus, ResourceRef};
use crate::store::{self, Store};

/// Occupancy implied by the statuses of the bookings covering one component.
pub fn fold_component_status(statuses: impl IntoIterator<Item = BookingStatus>) -> ComponentStatus {
    statuses
        .into_iter()
        .fold(ComponentStatus::Available, |acc, status| match (acc, status) {
            (_, BookingStatus::Active) | (ComponentStatus::InUse, _) => ComponentStatus::InUse,
            (_, BookingStatus::Approved) | (ComponentStatus::Reserved, _) => {
                ComponentStatus::Reserved
            }
            _ => ComponentStatus::Available,
        })
}

/// `FullyBooked` when every component is in use, `PartiallyBooked` when any is
/// in use or reserved, otherwise `Available`. No components means `Available`.
pub fn fold_instance_status(
    components: impl IntoIterator<Item = ComponentStatus>,
) -> InstanceBookingStatus {
    let mut any_component = false;
    let mut all_in_use = true;
    let mut any_held = false;
    for component in components {
        any_component = true;
        match component {
            ComponentStatus::InUse => any_held = true,
            ComponentStatus::Reserved => {
                any_held = true;
                all_in_use = false;
            }
            ComponentStatus::Available => all_in_use = false,
        }
    }
    if any_component && all_in_use {
        InstanceBookingStatus::FullyBooked
    } else if any_held {
        InstanceBookingStatus::PartiallyBooked
    } else {
        InstanceBookingStatus::Available
    }
}

/// Move a booking to `status`, recomputing occupancy of everything it holds
/// when the new status is Approved, Active or terminal.
///
/// Terminal bookings cannot be moved.
pub fn set_booking_status(
    store: &mut Store,
    booking_id: &str,
    status: BookingStatus,
) -> Result<Booking> {
    let tx = store.transaction()?;
    let mut booking = store::get_booking(&tx, booking_id)?
        .ok_or_else(|| Error::not_found("booking", booking_id))?;
    if booking.status.is_terminal() && booking.status != status {
        return Err(Error::InvalidInput(format!(
            "booking {booking_id} is {} and cannot change status",
            booking.status
        )));
    }
    store::set_booking_status(&tx, booking_id, status)?;
    if status.affects_occupancy() {
        recompute_in(&tx, &booking.resources)?;
    }
    tx.commit()?;

    tracing::info!(booking_id, from = %booking.status, to = %status, "booking status changed");
    booking.status = status;
    Ok(booking)
}

/// Recompute component and instance occupancy for everything under `resources`.
pub fn recompute_occupancy(store: &mut Store, resources: &[ResourceRef]) -> Result<()> {
    let tx = store.transaction()?;
    recompute_in(&tx, resources)?;
    tx.commit()?;
    Ok(())
}

fn recompute_in(conn: &Connection, resources: &[ResourceRef]) -> Result<()> {
    let instance_ids = store::instances_booked_by(conn, resources)?;
    for instance_id in &instance_ids {
        recompute_instance(conn, instance_id)?;
    }
    Ok(())
}

fn recompute_instance(conn: &Connection, instance_id: &str) -> Result<()> {
    let instance = ResourceRef::instance(instance_id);
    let mut lineage = vec![instance.clone()];
    lineage.extend(instance.ancestors(conn)?);

    let lineage_statuses = statuses_on_all(conn, &lineage)?;
    let component_ids = store::component_ids_of(conn, instance_id)?;

    // An instance without components is treated as its own single component.
    let status = if component_ids.is_empty() {
        fold_instance_status([fold_component_status(lineage_statuses)])
    } else {
        let mut components = Vec::with_capacity(component_ids.len());
        for component_id in &component_ids {
            let own = store::booking_statuses_on(conn, &ResourceRef::component(component_id.as_str()))?;
            let status =
                fold_component_status(own.into_iter().chain(lineage_statuses.iter().copied()));
            store::set_component_status(conn, component_id, status)?;
            components.push(status);
        }
        fold_instance_status(components)
    };

    store::set_instance_status(conn, instance_id, status)?;
    tracing::debug!(instance_id, status = %status, "instance occupancy recomputed");
    Ok(())
}

fn statuses_on_all(conn: &Connection, resources: &[ResourceRef]) -> Result<Vec<BookingStatus>> {
    let mut out = Vec::new();
    for resource in resources {
        out.extend(store::booking_statuses_on(conn, resource)?);
    }
    Ok(out)
}
