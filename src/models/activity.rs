//! Activity schedule as seen by the attendance engine (read-only)

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A point on the globe, in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Circular zone applying to every time slot of an activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoZone {
    pub center: Coordinates,
    pub radius_m: f64,
}

/// Circular zone declared for one named time slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SlotZone {
    pub time_slot: String,
    #[sqlx(rename = "latitude")]
    pub lat: f64,
    #[sqlx(rename = "longitude")]
    pub lng: f64,
    pub radius_m: f64,
}

impl SlotZone {
    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// Where participants must be to check in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LocationRequirement {
    /// No geofencing
    None,
    Single(GeoZone),
    Multi { zones: Vec<SlotZone> },
}

/// Named period of the activity day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TimeSlot {
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySchedule {
    pub id: Uuid,
    pub name: String,
    /// Day the activity takes place (club local time)
    pub date: NaiveDate,
    /// Ordered, unique by name
    pub time_slots: Vec<TimeSlot>,
    pub location: LocationRequirement,
}

/// Member of the approved roster of an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Participant {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub student_id: Option<String>,
}

/// Display fields stamped on a newly created attendance document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserDisplayInfo {
    pub name: String,
    pub student_id: Option<String>,
}
