//! Domain records: resources, bookings, refresh intents and conflicts.
//!
//! Every closed set of states is a Rust enum with a stable text form used both
//! on the wire (serde) and in the store.

/// Declares a fieldless enum with a fixed text form per variant, plus
/// `as_str`, `Display` and a validating `FromStr`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
        unknown = $on_unknown:expr;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    other => Err(($on_unknown)(other.to_string())),
                }
            }
        }
    };
}

pub(crate) use text_enum;

mod booking;
mod conflict;
mod refresh;
mod resource;

pub use booking::{
    Booking, BookingPriority, BookingResource, BookingStatus, NewBooking, ResourceConflictStatus,
};
pub use conflict::{Conflict, ConflictFlag, ConflictType, NewConflict, ResolutionStatus, Severity};
pub(crate) use refresh::refresh_window;
pub use refresh::{
    ImpactType, NewRefreshIntent, RefreshChange, RefreshIntent, RefreshStatus, MAX_DOWNTIME_MINUTES,
};
pub use resource::{
    ComponentStatus, InstanceBookingStatus, ResourceHierarchy, ResourceKind, ResourceRef,
};

/// Generate a new time-sortable record id.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
