use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{ConflictFlag, ResourceRef};
use crate::error::{Error, Result};
use crate::interval::TimeWindow;

text_enum! {
    /// Lifecycle of a refresh intent.
    pub enum RefreshStatus {
        Draft => "DRAFT",
        Requested => "REQUESTED",
        Approved => "APPROVED",
        Scheduled => "SCHEDULED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
        RolledBack => "ROLLED_BACK",
    }
    unknown = |value| Error::UnknownStatus { kind: "refresh status", value };
}

impl RefreshStatus {
    /// Refreshes a new booking has to be warned about.
    pub const COMMITTED: &'static [Self] = &[Self::Approved, Self::Scheduled, Self::InProgress];

    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Approved | Self::Scheduled | Self::InProgress)
    }
}

/// What a refresh does to its target.
///
/// Values read back from the store that match no known impact are kept as
/// [`ImpactType::Unrecognized`] and treated as destructive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImpactType {
    DataOverwrite,
    DowntimeRequired,
    SchemaChange,
    ReadOnly,
    ConfigChange,
    Unrecognized(String),
}

impl ImpactType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DataOverwrite => "DATA_OVERWRITE",
            Self::DowntimeRequired => "DOWNTIME_REQUIRED",
            Self::SchemaChange => "SCHEMA_CHANGE",
            Self::ReadOnly => "READ_ONLY",
            Self::ConfigChange => "CONFIG_CHANGE",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Lenient parse used for stored values: unknown text is kept, not rejected.
    pub fn from_stored(raw: &str) -> Self {
        raw.parse()
            .unwrap_or_else(|_| Self::Unrecognized(raw.to_string()))
    }

    /// Data overwrite, downtime and schema changes disrupt bookings. Anything
    /// unrecognized is assumed to as well.
    pub fn is_destructive(&self) -> bool {
        match self {
            Self::DataOverwrite | Self::DowntimeRequired | Self::SchemaChange => true,
            Self::ReadOnly | Self::ConfigChange => false,
            Self::Unrecognized(_) => true,
        }
    }

    /// Human readable effect on a booking holder.
    pub fn description(&self) -> String {
        match self {
            Self::DataOverwrite => "Data will be overwritten".to_string(),
            Self::DowntimeRequired => "Environment will be unavailable".to_string(),
            Self::SchemaChange => "Database schema will change".to_string(),
            Self::ReadOnly => "Environment will be read-only".to_string(),
            Self::ConfigChange => "Configuration will change".to_string(),
            Self::Unrecognized(raw) => format!("Unrecognized impact '{raw}'"),
        }
    }
}

impl std::str::FromStr for ImpactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DATA_OVERWRITE" => Ok(Self::DataOverwrite),
            "DOWNTIME_REQUIRED" => Ok(Self::DowntimeRequired),
            "SCHEMA_CHANGE" => Ok(Self::SchemaChange),
            "READ_ONLY" => Ok(Self::ReadOnly),
            "CONFIG_CHANGE" => Ok(Self::ConfigChange),
            other => Err(Error::UnknownStatus {
                kind: "impact type",
                value: other.to_string(),
            }),
        }
    }
}

impl From<String> for ImpactType {
    fn from(raw: String) -> Self {
        Self::from_stored(&raw)
    }
}

impl From<ImpactType> for String {
    fn from(impact: ImpactType) -> Self {
        impact.as_str().to_string()
    }
}

impl std::fmt::Display for ImpactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned disruptive operation against an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshIntent {
    pub id: String,
    pub title: String,
    pub entity: ResourceRef,
    pub planned_start: DateTime<Utc>,
    pub planned_end: Option<DateTime<Utc>>,
    pub estimated_downtime_minutes: Option<i64>,
    pub impact_type: ImpactType,
    pub status: RefreshStatus,
    pub conflict_flag: ConflictFlag,
    pub requested_by: Option<String>,
}

impl RefreshIntent {
    /// Planned start to planned end, falling back to the downtime estimate and
    /// then to `default_downtime_minutes`.
    pub fn window(&self, default_downtime_minutes: i64) -> Result<TimeWindow> {
        refresh_window(
            self.planned_start,
            self.planned_end,
            self.estimated_downtime_minutes,
            default_downtime_minutes,
        )
    }
}

/// Longest downtime a refresh may estimate: 30 days.
pub const MAX_DOWNTIME_MINUTES: i64 = 30 * 24 * 60;

pub(crate) fn refresh_window(
    planned_start: DateTime<Utc>,
    planned_end: Option<DateTime<Utc>>,
    estimated_downtime_minutes: Option<i64>,
    default_downtime_minutes: i64,
) -> Result<TimeWindow> {
    let end = match planned_end {
        Some(end) => end,
        None => {
            let minutes = estimated_downtime_minutes.unwrap_or(default_downtime_minutes);
            if minutes > MAX_DOWNTIME_MINUTES {
                return Err(Error::InvalidInput(format!(
                    "estimated downtime may not exceed {MAX_DOWNTIME_MINUTES} minutes"
                )));
            }
            TimeDelta::try_minutes(minutes)
                .and_then(|downtime| planned_start.checked_add_signed(downtime))
                .ok_or_else(|| {
                    Error::InvalidInput(format!("downtime of {minutes} minutes is out of range"))
                })?
        }
    };
    Ok(TimeWindow::new(planned_start, end))
}

/// Input for creating a refresh intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRefreshIntent {
    pub title: String,
    pub entity: ResourceRef,
    pub planned_start: DateTime<Utc>,
    pub planned_end: Option<DateTime<Utc>>,
    pub estimated_downtime_minutes: Option<i64>,
    pub impact_type: ImpactType,
    pub status: RefreshStatus,
    pub requested_by: Option<String>,
}

impl NewRefreshIntent {
    pub fn validate(&self) -> Result<()> {
        validate_refresh_timing(
            self.planned_start,
            self.planned_end,
            self.estimated_downtime_minutes,
        )?;
        if let ImpactType::Unrecognized(raw) = &self.impact_type {
            return Err(Error::UnknownStatus {
                kind: "impact type",
                value: raw.clone(),
            });
        }
        Ok(())
    }

    pub fn into_intent(self, id: String) -> RefreshIntent {
        RefreshIntent {
            id,
            title: self.title,
            entity: self.entity,
            planned_start: self.planned_start,
            planned_end: self.planned_end,
            estimated_downtime_minutes: self.estimated_downtime_minutes,
            impact_type: self.impact_type,
            status: self.status,
            conflict_flag: ConflictFlag::None,
            requested_by: self.requested_by,
        }
    }
}

/// Edit to a refresh intent's window or impact. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshChange {
    pub planned_start: Option<DateTime<Utc>>,
    pub planned_end: Option<Option<DateTime<Utc>>>,
    pub estimated_downtime_minutes: Option<Option<i64>>,
    pub impact_type: Option<ImpactType>,
}

impl RefreshChange {
    pub const fn is_empty(&self) -> bool {
        self.planned_start.is_none()
            && self.planned_end.is_none()
            && self.estimated_downtime_minutes.is_none()
            && self.impact_type.is_none()
    }

    /// Apply the change to `intent`, validating the resulting timing.
    pub fn apply_to(&self, intent: &mut RefreshIntent) -> Result<()> {
        if let Some(start) = self.planned_start {
            intent.planned_start = start;
        }
        if let Some(end) = self.planned_end {
            intent.planned_end = end;
        }
        if let Some(estimate) = self.estimated_downtime_minutes {
            intent.estimated_downtime_minutes = estimate;
        }
        if let Some(impact) = &self.impact_type {
            if let ImpactType::Unrecognized(raw) = impact {
                return Err(Error::UnknownStatus {
                    kind: "impact type",
                    value: raw.clone(),
                });
            }
            intent.impact_type = impact.clone();
        }
        validate_refresh_timing(
            intent.planned_start,
            intent.planned_end,
            intent.estimated_downtime_minutes,
        )
    }
}

fn validate_refresh_timing(
    planned_start: DateTime<Utc>,
    planned_end: Option<DateTime<Utc>>,
    estimated_downtime_minutes: Option<i64>,
) -> Result<()> {
    if let Some(end) = planned_end {
        if end <= planned_start {
            return Err(Error::InvalidInput(
                "planned end must be after planned start".into(),
            ));
        }
    }
    if let Some(minutes) = estimated_downtime_minutes {
        if minutes <= 0 {
            return Err(Error::InvalidInput(
                "estimated downtime must be positive".into(),
            ));
        }
        if minutes > MAX_DOWNTIME_MINUTES {
            return Err(Error::InvalidInput(format!(
                "estimated downtime may not exceed {MAX_DOWNTIME_MINUTES} minutes"
            )));
        }
    }
    Ok(())
}
