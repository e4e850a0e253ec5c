//! # envguard-core
//!
//! Conflict detection between bookings of shared test resources and planned
//! refreshes (data overwrites, downtime, schema changes) of the same resources.
//!
//! ## Modules
//!
//! - [`interval`]: half-open windows and the overlap test
//! - [`severity`]: severity of a refresh/booking overlap
//! - [`finder`]: bookings and refreshes overlapping a window on a resource
//! - [`records`]: storing, resolving and reading conflict rows
//! - [`booking_check`]: advisory checks when a booking is requested
//! - [`refresh_check`]: conflict snapshot and approval gate for refresh intents
//! - [`slots`]: free slot suggestion
//! - [`occupancy`]: component and instance booking status
//! - [`notify`]: hand-off of conflicts to a notification dispatcher
//! - [`audit`]: activity events
//! - [`store`]: SQLite persistence
//! - [`error`]: Error types

pub mod audit;
pub mod booking_check;
pub mod clock;
pub mod config;
pub mod error;
pub mod finder;
pub mod interval;
pub mod model;
pub mod notify;
pub mod occupancy;
pub mod records;
pub mod refresh_check;
pub mod severity;
pub mod slots;
pub mod store;

pub use audit::{ActivityEvent, ActivityLog, TracingActivityLog};
pub use booking_check::{
    check_conflicts_for_booking, check_refreshes_for_booking, create_booking, BookingCreated,
    BookingOverlap, BookingWindowQuery, RefreshConflictInfo, RefreshWarning, WarningLevel,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use finder::{find_overlapping_bookings, find_overlapping_refreshes, OverlapResult};
pub use interval::{overlaps, Overlap, TimeWindow};
pub use notify::{notify_conflicts, LogDispatcher, NotificationDispatcher, NotificationSummary};
pub use occupancy::{fold_component_status, fold_instance_status, set_booking_status};
pub use records::{
    get_conflict_details, get_unresolved_conflicts, resolve_conflict, store_conflicts,
    ConflictDetails, ConflictFilter, ConflictView,
};
pub use refresh_check::{
    check_conflicts_for_refresh, create_refresh_intent, ensure_approvable, reschedule_refresh,
    revalidate_conflicts, ConflictResult, DetectedConflict, ForceOverride, RefreshCheckRequest,
};
pub use severity::classify;
pub use slots::{suggest_slots, Slot, SlotRequest, MAX_LOOKAHEAD_DAYS};
pub use store::Store;
