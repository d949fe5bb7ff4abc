//! Data models for the attendance server

pub mod activity;
pub mod attendance;

// Re-export commonly used types
pub use activity::{
    ActivitySchedule, Coordinates, GeoZone, LocationRequirement, Participant, SlotZone, TimeSlot,
    UserDisplayInfo,
};
pub use attendance::{
    AttendanceDocument, AttendanceRecord, AttendanceStatus, CheckInType, DocumentKey, ReasonCode,
    RecordDraft, Verdict,
};
