//! Attendance verification: geofencing, time windows and status resolution.
//!
//! Everything here is pure and synchronous; persistence and collaborators are
//! handled by `services::attendance`.

pub mod geo;
pub mod status;
pub mod time_window;

pub use geo::{haversine_distance, validate_location, GeoCheck, EARTH_RADIUS_M};
pub use status::{resolve, Resolution, StatusReason};
pub use time_window::{classify, TimeWindow, WindowPolicy};
