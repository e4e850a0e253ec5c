//! Severity classification for refresh/booking conflicts.
//!
//! Rules, first match wins:
//!
//! 1. destructive impact, booking Approved or Active, and the booking is
//!    critical or High/Critical priority: `HIGH`
//! 2. destructive impact, booking Active: `HIGH`
//! 3. destructive impact, booking Approved or Active: `MEDIUM`
//! 4. non-destructive impact, booking Approved or Active, booking critical: `MEDIUM`
//! 5. anything else: `LOW`
//!
//! Unrecognized impact types take the destructive branch.

use crate::model::{BookingPriority, BookingStatus, ImpactType, Severity};

/// Classify one conflict from the refresh impact and the booking's attributes.
pub fn classify(
    impact_type: &ImpactType,
    booking_status: BookingStatus,
    booking_priority: BookingPriority,
    is_critical_booking: bool,
) -> Severity {
    if let ImpactType::Unrecognized(raw) = impact_type {
        tracing::warn!(
            impact_type = %raw,
            "unmapped impact type, classifying as destructive"
        );
    }

    let destructive = impact_type.is_destructive();
    let confirmed = booking_status.is_confirmed();
    let elevated = is_critical_booking || booking_priority.is_elevated();

    match (destructive, booking_status) {
        (true, _) if confirmed && elevated => Severity::High,
        (true, BookingStatus::Active) => Severity::High,
        (true, _) if confirmed => Severity::Medium,
        (false, _) if confirmed && is_critical_booking => Severity::Medium,
        _ => Severity::Low,
    }
}

/// The simpler two-tier rating used before a booking exists: destructive
/// refreshes are `HIGH`, everything else `LOW`.
pub fn classify_for_new_booking(impact_type: &ImpactType) -> Severity {
    if impact_type.is_destructive() {
        Severity::High
    } else {
        Severity::Low
    }
}
