//! Time-window classification of a check-in instant against a slot boundary

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

use crate::config::AttendanceConfig;
use crate::models::activity::TimeSlot;
use crate::models::attendance::{CheckInType, ReasonCode};

/// Tolerances around the target instant and the local time zone activity
/// schedules are written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub offset: FixedOffset,
    /// On time from `T - early`
    pub early: Duration,
    /// On time until `T + grace`
    pub grace: Duration,
    /// Late but accepted until `T + late_limit`
    pub late_limit: Duration,
}

impl WindowPolicy {
    pub fn from_config(config: &AttendanceConfig) -> Option<Self> {
        let policy = Self {
            offset: FixedOffset::east_opt(config.utc_offset_minutes.checked_mul(60)?)?,
            early: Duration::minutes(config.early_minutes),
            grace: Duration::minutes(config.grace_minutes),
            late_limit: Duration::minutes(config.late_limit_minutes),
        };
        let ordered = policy.early >= Duration::zero()
            && policy.grace >= Duration::zero()
            && policy.late_limit >= policy.grace;
        ordered.then_some(policy)
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        let defaults = AttendanceConfig::default();
        Self {
            offset: FixedOffset::east_opt(defaults.utc_offset_minutes * 60)
                .unwrap_or_else(|| Utc.fix()),
            early: Duration::minutes(defaults.early_minutes),
            grace: Duration::minutes(defaults.grace_minutes),
            late_limit: Duration::minutes(defaults.late_limit_minutes),
        }
    }
}

/// Where a check-in falls relative to its slot boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWindow {
    /// Within `[T - early, T + grace]`
    OnTime,
    /// Within `(T + grace, T + late_limit]`; accepted but needs an officer
    Late { minutes_late: i64 },
    /// Before `T - early`
    TooEarly { minutes_early: i64 },
    /// After `T + late_limit`
    TooLate { minutes_late: i64 },
    /// Check-in day differs from the activity day
    DateMismatch { activity_date: NaiveDate, check_in_date: NaiveDate },
    /// No active slot with that name
    SlotNotFound { slot: String },
}

impl TimeWindow {
    pub fn is_valid(&self) -> bool {
        matches!(self, TimeWindow::OnTime | TimeWindow::Late { .. })
    }

    pub fn is_on_time(&self) -> bool {
        matches!(self, TimeWindow::OnTime)
    }

    /// True for both the accepted late window and the refused too-late band
    pub fn is_late(&self) -> bool {
        matches!(self, TimeWindow::Late { .. } | TimeWindow::TooLate { .. })
    }

    pub fn is_early(&self) -> bool {
        matches!(self, TimeWindow::TooEarly { .. })
    }

    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            TimeWindow::OnTime => None,
            TimeWindow::Late { .. } => Some(ReasonCode::LateArrival),
            TimeWindow::TooEarly { .. } => Some(ReasonCode::TooEarly),
            TimeWindow::TooLate { .. } => Some(ReasonCode::TooLate),
            TimeWindow::DateMismatch { .. } => Some(ReasonCode::DateMismatch),
            TimeWindow::SlotNotFound { .. } => Some(ReasonCode::SlotNotFound),
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            TimeWindow::OnTime => None,
            TimeWindow::Late { minutes_late } => Some(format!(
                "late check-in: {} minutes after the scheduled time, awaiting officer approval",
                minutes_late
            )),
            TimeWindow::TooEarly { minutes_early } => Some(format!(
                "too early: {} minutes before the scheduled time",
                minutes_early
            )),
            TimeWindow::TooLate { minutes_late } => Some(format!(
                "too late: {} minutes after the scheduled time",
                minutes_late
            )),
            TimeWindow::DateMismatch { activity_date, check_in_date } => Some(format!(
                "date mismatch: check-in on {} but the activity is on {}",
                check_in_date, activity_date
            )),
            TimeWindow::SlotNotFound { slot } => {
                Some(format!("slot not found: no active time slot named '{}'", slot))
            }
        }
    }
}

/// Classify `check_in_time` for the named slot of an activity held on
/// `activity_date`.
///
/// The calendar day is compared first, then the slot is resolved among active
/// slots. The target is the slot start for `start` check-ins and the slot end
/// for `end` check-ins.
pub fn classify(
    check_in_time: DateTime<Utc>,
    activity_date: NaiveDate,
    slots: &[TimeSlot],
    slot_name: &str,
    check_in_type: CheckInType,
    policy: &WindowPolicy,
) -> TimeWindow {
    let local = check_in_time.with_timezone(&policy.offset).naive_local();

    if local.date() != activity_date {
        return TimeWindow::DateMismatch {
            activity_date,
            check_in_date: local.date(),
        };
    }

    let Some(slot) = slots.iter().find(|s| s.is_active && s.name == slot_name) else {
        return TimeWindow::SlotNotFound { slot: slot_name.to_string() };
    };

    let boundary = match check_in_type {
        CheckInType::Start => slot.start_time,
        CheckInType::End => slot.end_time,
    };
    let target = activity_date.and_time(boundary);
    let offset = local - target;

    if offset < -policy.early {
        TimeWindow::TooEarly { minutes_early: (-offset).num_minutes() }
    } else if offset <= policy.grace {
        TimeWindow::OnTime
    } else if offset <= policy.late_limit {
        TimeWindow::Late { minutes_late: offset.num_minutes() }
    } else {
        TimeWindow::TooLate { minutes_late: offset.num_minutes() }
    }
}
