//! Combines location, timing and photo evidence into a record status

use chrono::{DateTime, Utc};

use super::geo::GeoCheck;
use super::time_window::TimeWindow;
use crate::models::attendance::{
    AttendanceStatus, ReasonCode, Verdict, Verification, SYSTEM_VERIFIER,
};

pub const AUTO_APPROVAL_NOTE: &str =
    "auto-approved: correct location, correct time, photo present";
pub const MISSING_EVIDENCE_MESSAGE: &str = "missing photo or invalid data";

/// Machine-readable reason plus the text shown to participants and officers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReason {
    pub code: ReasonCode,
    pub detail: String,
}

impl StatusReason {
    pub fn new(code: ReasonCode, detail: impl Into<String>) -> Self {
        Self { code, detail: detail.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: AttendanceStatus,
    pub reason: StatusReason,
}

impl Resolution {
    pub fn rejected(reason: StatusReason) -> Self {
        Self { status: AttendanceStatus::Rejected, reason }
    }

    fn pending(reason: StatusReason) -> Self {
        Self { status: AttendanceStatus::Pending, reason }
    }

    fn approved() -> Self {
        Self {
            status: AttendanceStatus::Approved,
            reason: StatusReason::new(ReasonCode::AutoApproved, AUTO_APPROVAL_NOTE),
        }
    }

    /// Rejection for a failed geofence check
    pub fn outside_geofence(geo: &GeoCheck) -> Self {
        let detail = geo
            .message
            .clone()
            .unwrap_or_else(|| "too far from venue".to_string());
        Self::rejected(StatusReason::new(ReasonCode::OutsideGeofence, detail))
    }

    /// Rejection for a check-in outside every accepted time band
    pub fn outside_window(time: &TimeWindow) -> Self {
        let code = time.reason_code().unwrap_or(ReasonCode::MissingEvidence);
        let detail = time
            .message()
            .unwrap_or_else(|| MISSING_EVIDENCE_MESSAGE.to_string());
        Self::rejected(StatusReason::new(code, detail))
    }

    /// Turn the resolution into the record state it implies. Only an approval
    /// carries verification metadata; only a rejection carries a cancel reason.
    pub fn into_verdict(self, now: DateTime<Utc>) -> Verdict {
        match self.status {
            AttendanceStatus::Approved => Verdict::Approved(Verification {
                verified_by: SYSTEM_VERIFIER.to_string(),
                verified_at: now,
                note: self.reason.detail,
            }),
            AttendanceStatus::Pending => Verdict::Pending,
            AttendanceStatus::Rejected => Verdict::Rejected {
                cancel_reason: self.reason.detail,
            },
        }
    }
}

/// Decide the status of a check-in, in precedence order:
///
/// 1. outside the geofence: rejected
/// 2. outside the time bands with a photo: rejected
/// 3. on time with a photo: approved
/// 4. late with a photo: pending
/// 5. on time without a photo: pending
/// 6. anything else without a photo: rejected
pub fn resolve(geo: &GeoCheck, time: &TimeWindow, has_photo: bool) -> Resolution {
    if !geo.valid {
        return Resolution::outside_geofence(geo);
    }

    if !time.is_valid() && has_photo {
        return Resolution::outside_window(time);
    }

    match (time, has_photo) {
        (TimeWindow::OnTime, true) => Resolution::approved(),
        (TimeWindow::Late { .. }, true) => Resolution::pending(StatusReason::new(
            ReasonCode::LateArrival,
            time.message().unwrap_or_else(|| "late check-in".to_string()),
        )),
        (TimeWindow::OnTime, false) => Resolution::pending(StatusReason::new(
            ReasonCode::PhotoMissing,
            "on time but no photo was submitted, awaiting officer approval",
        )),
        _ => Resolution::rejected(StatusReason::new(
            ReasonCode::MissingEvidence,
            MISSING_EVIDENCE_MESSAGE,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside() -> GeoCheck {
        GeoCheck { valid: true, distance_m: Some(30.0), message: None }
    }

    fn outside() -> GeoCheck {
        GeoCheck {
            valid: false,
            distance_m: Some(80.0),
            message: Some("too far from venue: 80m away, allowed radius is 50m".to_string()),
        }
    }

    #[test]
    fn test_geo_failure_wins() {
        for time in [TimeWindow::OnTime, TimeWindow::Late { minutes_late: 20 }] {
            for has_photo in [true, false] {
                let resolution = resolve(&outside(), &time, has_photo);
                assert_eq!(resolution.status, AttendanceStatus::Rejected);
                assert_eq!(resolution.reason.code, ReasonCode::OutsideGeofence);
                assert!(resolution.reason.detail.contains("80m"));
            }
        }
    }

    #[test]
    fn test_time_failure_with_photo_is_rejected() {
        let resolution = resolve(&inside(), &TimeWindow::TooLate { minutes_late: 40 }, true);
        assert_eq!(resolution.status, AttendanceStatus::Rejected);
        assert_eq!(resolution.reason.code, ReasonCode::TooLate);
        assert!(resolution.reason.detail.contains("too late"));

        let resolution = resolve(&inside(), &TimeWindow::TooEarly { minutes_early: 20 }, true);
        assert_eq!(resolution.reason.code, ReasonCode::TooEarly);
    }

    #[test]
    fn test_on_time_with_photo_is_approved() {
        let resolution = resolve(&inside(), &TimeWindow::OnTime, true);
        assert_eq!(resolution.status, AttendanceStatus::Approved);
        assert_eq!(resolution.reason.detail, AUTO_APPROVAL_NOTE);
    }

    #[test]
    fn test_late_with_photo_is_pending() {
        let resolution = resolve(&inside(), &TimeWindow::Late { minutes_late: 20 }, true);
        assert_eq!(resolution.status, AttendanceStatus::Pending);
        assert_eq!(resolution.reason.code, ReasonCode::LateArrival);
    }

    #[test]
    fn test_on_time_without_photo_is_pending() {
        let resolution = resolve(&inside(), &TimeWindow::OnTime, false);
        assert_eq!(resolution.status, AttendanceStatus::Pending);
        assert_eq!(resolution.reason.code, ReasonCode::PhotoMissing);
    }

    #[test]
    fn test_other_combinations_without_photo_are_rejected() {
        let cases = [
            TimeWindow::Late { minutes_late: 20 },
            TimeWindow::TooLate { minutes_late: 45 },
            TimeWindow::TooEarly { minutes_early: 30 },
            TimeWindow::SlotNotFound { slot: "Night".to_string() },
        ];
        for time in cases {
            let resolution = resolve(&inside(), &time, false);
            assert_eq!(resolution.status, AttendanceStatus::Rejected, "{:?}", time);
            assert_eq!(resolution.reason.detail, MISSING_EVIDENCE_MESSAGE);
        }
    }

    #[test]
    fn test_into_verdict() {
        let now = Utc::now();
        match resolve(&inside(), &TimeWindow::OnTime, true).into_verdict(now) {
            Verdict::Approved(v) => {
                assert_eq!(v.verified_by, SYSTEM_VERIFIER);
                assert_eq!(v.verified_at, now);
                assert_eq!(v.note, AUTO_APPROVAL_NOTE);
            }
            other => panic!("unexpected verdict {:?}", other),
        }

        assert_eq!(
            resolve(&inside(), &TimeWindow::Late { minutes_late: 20 }, true).into_verdict(now),
            Verdict::Pending
        );

        assert_eq!(
            resolve(&outside(), &TimeWindow::OnTime, true).into_verdict(now),
            Verdict::Rejected {
                cancel_reason: "too far from venue: 80m away, allowed radius is 50m".to_string()
            }
        );
    }
}
