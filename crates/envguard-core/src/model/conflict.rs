use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BookingPriority;
use crate::error::Error;
use crate::interval::Overlap;

text_enum! {
    #[derive(PartialOrd, Ord)]
    pub enum Severity {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
    unknown = |value| Error::UnknownStatus { kind: "severity", value };
}

text_enum! {
    /// Summary of all conflicts on one refresh intent.
    #[derive(PartialOrd, Ord)]
    pub enum ConflictFlag {
        None => "NONE",
        Minor => "MINOR",
        Major => "MAJOR",
    }
    unknown = |value| Error::UnknownStatus { kind: "conflict flag", value };
}

text_enum! {
    pub enum ConflictType {
        Overlap => "OVERLAP",
    }
    unknown = |value| Error::UnknownStatus { kind: "conflict type", value };
}

text_enum! {
    pub enum ResolutionStatus {
        Unresolved => "UNRESOLVED",
        Acknowledged => "ACKNOWLEDGED",
        BookingMoved => "BOOKING_MOVED",
        RefreshMoved => "REFRESH_MOVED",
        OverrideApproved => "OVERRIDE_APPROVED",
        Dismissed => "DISMISSED",
    }
    unknown = Error::InvalidResolution;
}

impl ResolutionStatus {
    /// Values a resolver may set. `Unresolved` is only ever assigned by detection.
    pub const RESOLVER_CHOICES: &'static [Self] = &[
        Self::Acknowledged,
        Self::BookingMoved,
        Self::RefreshMoved,
        Self::OverrideApproved,
        Self::Dismissed,
    ];

    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

impl ConflictFlag {
    /// MAJOR when any severity is HIGH, MINOR when there is anything else,
    /// NONE for an empty set.
    pub fn from_severities(severities: impl IntoIterator<Item = Severity>) -> Self {
        severities
            .into_iter()
            .map(|severity| match severity {
                Severity::High => Self::Major,
                Severity::Medium | Severity::Low => Self::Minor,
            })
            .max()
            .unwrap_or(Self::None)
    }

    pub const fn requires_force_approval(self) -> bool {
        matches!(self, Self::Major)
    }
}

/// A stored overlap between one refresh intent and one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    pub refresh_intent_id: String,
    pub booking_id: String,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub resolution_status: ResolutionStatus,
    pub overlap: Overlap,
    pub booking_is_critical: bool,
    pub booking_priority: BookingPriority,
    pub auto_detected: bool,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub notified_at: Option<DateTime<Utc>>,
}

/// A freshly detected conflict, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConflict {
    pub booking_id: String,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub overlap: Overlap,
    pub booking_is_critical: bool,
    pub booking_priority: BookingPriority,
}
