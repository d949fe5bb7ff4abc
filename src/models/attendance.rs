//! Attendance records, documents and request/response types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::activity::Coordinates;
use crate::error::{AppError, AppResult};

/// Verifier recorded on automatically approved records
pub const SYSTEM_VERIFIER: &str = "system";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a submission marks arrival or departure for a time slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckInType {
    Start,
    End,
}

impl CheckInType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInType::Start => "start",
            CheckInType::End => "end",
        }
    }
}

impl FromStr for CheckInType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(CheckInType::Start),
            "end" => Ok(CheckInType::End),
            other => Err(AppError::Validation(format!(
                "Invalid check_in_type '{}' (expected start or end)",
                other
            ))),
        }
    }
}

impl fmt::Display for CheckInType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a single attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Approved,
    Pending,
    Rejected,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Approved => "approved",
            AttendanceStatus::Pending => "pending",
            AttendanceStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(AttendanceStatus::Approved),
            "pending" => Ok(AttendanceStatus::Pending),
            "rejected" => Ok(AttendanceStatus::Rejected),
            other => Err(AppError::Internal(format!("Unknown attendance status '{}'", other))),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a record ended up in its status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    AutoApproved,
    OutsideGeofence,
    DateMismatch,
    SlotNotFound,
    TooEarly,
    TooLate,
    /// Inside the late window, waiting for an officer
    LateArrival,
    /// On time but submitted without a photo, waiting for an officer
    PhotoMissing,
    MissingEvidence,
    ManualApproval,
    ManualRejection,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::AutoApproved => "auto_approved",
            ReasonCode::OutsideGeofence => "outside_geofence",
            ReasonCode::DateMismatch => "date_mismatch",
            ReasonCode::SlotNotFound => "slot_not_found",
            ReasonCode::TooEarly => "too_early",
            ReasonCode::TooLate => "too_late",
            ReasonCode::LateArrival => "late_arrival",
            ReasonCode::PhotoMissing => "photo_missing",
            ReasonCode::MissingEvidence => "missing_evidence",
            ReasonCode::ManualApproval => "manual_approval",
            ReasonCode::ManualRejection => "manual_rejection",
        }
    }
}

impl FromStr for ReasonCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "auto_approved" => ReasonCode::AutoApproved,
            "outside_geofence" => ReasonCode::OutsideGeofence,
            "date_mismatch" => ReasonCode::DateMismatch,
            "slot_not_found" => ReasonCode::SlotNotFound,
            "too_early" => ReasonCode::TooEarly,
            "too_late" => ReasonCode::TooLate,
            "late_arrival" => ReasonCode::LateArrival,
            "photo_missing" => ReasonCode::PhotoMissing,
            "missing_evidence" => ReasonCode::MissingEvidence,
            "manual_approval" => ReasonCode::ManualApproval,
            "manual_rejection" => ReasonCode::ManualRejection,
            other => return Err(AppError::Internal(format!("Unknown reason code '{}'", other))),
        };
        Ok(code)
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Who approved a record, when, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub verified_by: String,
    pub verified_at: DateTime<Utc>,
    pub note: String,
}

/// Target state of a record together with the fields that only exist in that
/// state. Applying a verdict is the only way record status changes, which keeps
/// verification fields tied to `approved` and the cancel reason to `rejected`.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved(Verification),
    Pending,
    Rejected { cancel_reason: String },
}

impl Verdict {
    pub fn status(&self) -> AttendanceStatus {
        match self {
            Verdict::Approved(_) => AttendanceStatus::Approved,
            Verdict::Pending => AttendanceStatus::Pending,
            Verdict::Rejected { .. } => AttendanceStatus::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// AttendanceRecord / AttendanceDocument
// ---------------------------------------------------------------------------

/// Position reported with a check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecordLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

/// One check-in (or check-out marker) of a participant for a time slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub time_slot: String,
    pub check_in_type: CheckInType,
    pub check_in_time: DateTime<Utc>,
    pub location: RecordLocation,
    pub photo_url: Option<String>,
    pub status: AttendanceStatus,
    pub reason_code: Option<ReasonCode>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verification_note: Option<String>,
    pub cancel_reason: Option<String>,
    pub late_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Move the record to the verdict's state, setting or clearing the
    /// state-specific fields
    pub fn apply_verdict(&mut self, verdict: Verdict, reason_code: ReasonCode) {
        self.status = verdict.status();
        self.reason_code = Some(reason_code);
        match verdict {
            Verdict::Approved(verification) => {
                self.verified_by = Some(verification.verified_by);
                self.verified_at = Some(verification.verified_at);
                self.verification_note = Some(verification.note);
                self.cancel_reason = None;
            }
            Verdict::Pending => {
                self.clear_verification();
                self.cancel_reason = None;
            }
            Verdict::Rejected { cancel_reason } => {
                self.clear_verification();
                self.cancel_reason = Some(cancel_reason);
            }
        }
    }

    fn clear_verification(&mut self) {
        self.verified_by = None;
        self.verified_at = None;
        self.verification_note = None;
    }

    pub fn matches(&self, time_slot: &str, check_in_type: CheckInType) -> bool {
        self.time_slot == time_slot && self.check_in_type == check_in_type
    }
}

/// Everything a submission writes into a record; the record id is kept by the store
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub time_slot: String,
    pub check_in_type: CheckInType,
    pub check_in_time: DateTime<Utc>,
    pub location: RecordLocation,
    pub photo_url: Option<String>,
    pub late_reason: Option<String>,
    pub reason_code: ReasonCode,
    pub verdict: Verdict,
}

impl RecordDraft {
    /// Build a brand new record from the draft
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> AttendanceRecord {
        let mut record = AttendanceRecord {
            id,
            time_slot: self.time_slot.clone(),
            check_in_type: self.check_in_type,
            check_in_time: self.check_in_time,
            location: self.location.clone(),
            photo_url: None,
            status: AttendanceStatus::Pending,
            reason_code: None,
            verified_by: None,
            verified_at: None,
            verification_note: None,
            cancel_reason: None,
            late_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.overwrite(&mut record, now);
        record
    }

    /// Replace every submission-controlled field of `record`, keeping its id
    /// and creation time
    pub fn overwrite(self, record: &mut AttendanceRecord, now: DateTime<Utc>) {
        record.time_slot = self.time_slot;
        record.check_in_type = self.check_in_type;
        record.check_in_time = self.check_in_time;
        record.location = self.location;
        record.photo_url = self.photo_url;
        record.late_reason = self.late_reason;
        record.updated_at = now;
        record.apply_verdict(self.verdict, self.reason_code);
    }
}

/// Identity of an attendance document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub activity_id: Uuid,
    pub user_id: Uuid,
}

impl DocumentKey {
    pub fn new(activity_id: Uuid, user_id: Uuid) -> Self {
        Self { activity_id, user_id }
    }
}

/// All attendance records of one participant for one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceDocument {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub student_id: Option<String>,
    pub records: Vec<AttendanceRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceDocument {
    /// Participant counts as present once any record is approved
    pub fn has_approved_record(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.status == AttendanceStatus::Approved)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Coordinates as sent by clients; both parts are required for a check-in
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CoordinatesInput {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Check-in or check-out submission
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct SubmitAttendance {
    pub user_id: Option<Uuid>,
    /// true for check-in, false for check-out
    pub checked_in: Option<bool>,
    pub time_slot: Option<String>,
    pub check_in_type: Option<CheckInType>,
    /// RFC 3339 instant; defaults to now when absent or unparsable
    pub check_in_time: Option<String>,
    pub coordinates: Option<CoordinatesInput>,
    #[validate(length(max = 2048, message = "photo_url is too long"))]
    pub photo_url: Option<String>,
    #[validate(length(max = 1000, message = "late_reason is too long"))]
    pub late_reason: Option<String>,
    #[validate(length(max = 500, message = "address is too long"))]
    pub address: Option<String>,
}

/// Validated check-in submission
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInSubmission {
    pub time_slot: String,
    pub check_in_type: CheckInType,
    pub check_in_time: Option<DateTime<Utc>>,
    pub coordinates: Coordinates,
    pub photo_url: Option<String>,
    pub late_reason: Option<String>,
    pub address: Option<String>,
}

impl CheckInSubmission {
    pub fn has_photo(&self) -> bool {
        self.photo_url.is_some()
    }
}

/// Record targeted by a check-out; `None` removes every record of the participant
pub type CheckOutTarget = Option<(String, CheckInType)>;

/// Validated submission, dispatched on `checked_in`
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceCommand {
    CheckIn { user_id: Uuid, submission: CheckInSubmission },
    CheckOut { user_id: Uuid, target: CheckOutTarget },
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl SubmitAttendance {
    /// Check required fields and normalize optional ones. Nothing has been
    /// evaluated or written when this fails.
    pub fn into_command(self) -> AppResult<AttendanceCommand> {
        self.validate()?;

        let user_id = self
            .user_id
            .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;
        let checked_in = self
            .checked_in
            .ok_or_else(|| AppError::Validation("checked_in must be a boolean".to_string()))?;
        let time_slot = non_blank(self.time_slot);

        if !checked_in {
            let target = match (time_slot, self.check_in_type) {
                (Some(slot), Some(kind)) => Some((slot, kind)),
                (None, None) => None,
                _ => {
                    return Err(AppError::Validation(
                        "time_slot and check_in_type must be given together".to_string(),
                    ))
                }
            };
            return Ok(AttendanceCommand::CheckOut { user_id, target });
        }

        let time_slot =
            time_slot.ok_or_else(|| AppError::Validation("time_slot is required".to_string()))?;
        let check_in_type = self
            .check_in_type
            .ok_or_else(|| AppError::Validation("check_in_type is required".to_string()))?;
        let coordinates = match self.coordinates {
            Some(CoordinatesInput { lat: Some(lat), lng: Some(lng) }) => Coordinates::new(lat, lng),
            _ => return Err(AppError::Validation("coordinates are required".to_string())),
        };
        if !coordinates.is_finite() {
            return Err(AppError::Validation(
                "coordinates must be finite numbers".to_string(),
            ));
        }

        let check_in_time = self.check_in_time.as_deref().and_then(|raw| {
            match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(t) => Some(t.with_timezone(&Utc)),
                Err(e) => {
                    tracing::debug!("Ignoring unparsable check_in_time {:?}: {}", raw, e);
                    None
                }
            }
        });

        Ok(AttendanceCommand::CheckIn {
            user_id,
            submission: CheckInSubmission {
                time_slot,
                check_in_type,
                check_in_time,
                coordinates,
                photo_url: non_blank(self.photo_url),
                late_reason: non_blank(self.late_reason),
                address: non_blank(self.address),
            },
        })
    }
}

/// Officer decision on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Manual review request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    /// Officer identifier recorded as the verifier
    #[validate(length(min = 1, max = 100, message = "officer_id is required"))]
    pub officer_id: String,
    /// Verification note on approval; required cancel reason on rejection
    #[validate(length(max = 1000, message = "note is too long"))]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Outcome of a submission. Rejections are successful engine runs with
/// `success = false`; the record is still stored for review.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub success: bool,
    pub status: Option<AttendanceStatus>,
    pub record_id: Option<Uuid>,
    pub reason_code: Option<ReasonCode>,
    /// Distance to the matching (or nearest) zone in meters
    pub distance_m: Option<f64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ParticipantAttendance {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub student_id: Option<String>,
    pub checked_in: bool,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceTotals {
    pub total: usize,
    pub checked_in: usize,
    pub not_checked_in: usize,
    /// Percentage of the roster checked in, two decimals
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub activity_id: Uuid,
    pub participants: Vec<ParticipantAttendance>,
    pub totals: AttendanceTotals,
}

/// Entry of the officer review queue
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PendingRecord {
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub student_id: Option<String>,
    pub record: AttendanceRecord,
}
