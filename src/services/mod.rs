//! Business logic services

pub mod attendance;
pub mod clock;

use std::sync::Arc;

use crate::{
    config::AttendanceConfig,
    error::{AppError, AppResult},
    repository::Repository,
    verification::WindowPolicy,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub attendance: attendance::AttendanceService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AttendanceConfig) -> AppResult<Self> {
        let policy = WindowPolicy::from_config(config).ok_or_else(|| {
            AppError::Internal(format!(
                "Invalid attendance windows: offset {} min, early {} min, grace {} min, late limit {} min",
                config.utc_offset_minutes,
                config.early_minutes,
                config.grace_minutes,
                config.late_limit_minutes
            ))
        })?;

        Ok(Self {
            attendance: attendance::AttendanceService::new(
                Arc::new(repository.activities),
                Arc::new(repository.users),
                Arc::new(repository.attendance),
                Arc::new(clock::SystemClock),
                policy,
                config.require_user_info,
            ),
        })
    }

    /// Services over arbitrary collaborators, used by tests and embedders
    pub fn with_attendance(attendance: attendance::AttendanceService) -> Self {
        Self { attendance }
    }
}
