use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResourceRef;
use crate::error::{Error, Result};
use crate::interval::TimeWindow;

text_enum! {
    /// Lifecycle of a booking.
    pub enum BookingStatus {
        Requested => "Requested",
        PendingApproval => "PendingApproval",
        Approved => "Approved",
        Active => "Active",
        Completed => "Completed",
        Cancelled => "Cancelled",
    }
    unknown = |value| Error::UnknownStatus { kind: "booking status", value };
}

text_enum! {
    #[derive(PartialOrd, Ord)]
    pub enum BookingPriority {
        Low => "Low",
        Normal => "Normal",
        High => "High",
        Critical => "Critical",
    }
    unknown = |value| Error::UnknownStatus { kind: "booking priority", value };
}

text_enum! {
    /// Per-resource conflict marker on a booking.
    pub enum ResourceConflictStatus {
        NoConflict => "None",
        PotentialConflict => "PotentialConflict",
    }
    unknown = |value| Error::UnknownStatus { kind: "resource conflict status", value };
}

impl BookingStatus {
    /// Approved or Active: the only bookings a refresh has to answer to.
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::Approved | Self::Active)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Transitions into these statuses change resource occupancy.
    pub const fn affects_occupancy(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Active | Self::Completed | Self::Cancelled
        )
    }

    pub const OPEN: &'static [Self] = &[
        Self::Requested,
        Self::PendingApproval,
        Self::Approved,
        Self::Active,
    ];

    pub const CONFIRMED: &'static [Self] = &[Self::Approved, Self::Active];
}

impl BookingPriority {
    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// A reservation of one or more resources for an exclusive window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub title: String,
    pub resources: Vec<ResourceRef>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
    pub priority: BookingPriority,
    pub is_critical: bool,
    pub owner_id: String,
    pub owning_group_id: Option<String>,
}

impl Booking {
    pub const fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

/// One `booking_resources` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingResource {
    pub booking_id: String,
    pub resource: ResourceRef,
    pub conflict_status: ResourceConflictStatus,
    pub conflicting_booking_id: Option<String>,
}

/// Input for creating a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub title: String,
    pub resources: Vec<ResourceRef>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
    pub priority: BookingPriority,
    pub is_critical: bool,
    pub owner_id: String,
    pub owning_group_id: Option<String>,
}

impl NewBooking {
    pub fn validate(&self) -> Result<()> {
        if self.resources.is_empty() {
            return Err(Error::InvalidInput(
                "a booking needs at least one resource".into(),
            ));
        }
        if self.start >= self.end {
            return Err(Error::InvalidInput(
                "booking start must be before its end".into(),
            ));
        }
        if self.owner_id.trim().is_empty() {
            return Err(Error::InvalidInput("booking owner must not be empty".into()));
        }
        Ok(())
    }

    pub fn into_booking(self, id: String) -> Booking {
        let mut resources = self.resources;
        resources.sort();
        resources.dedup();
        Booking {
            id,
            title: self.title,
            resources,
            start: self.start,
            end: self.end,
            status: self.status,
            priority: self.priority,
            is_critical: self.is_critical,
            owner_id: self.owner_id,
            owning_group_id: self.owning_group_id,
        }
    }
}
