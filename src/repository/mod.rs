//! Repository layer: collaborator interfaces and their database implementations

pub mod activities;
pub mod attendance;
#[cfg(test)]
pub mod memory;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        ActivitySchedule, AttendanceDocument, AttendanceRecord, CheckInType, DocumentKey,
        Participant, ReasonCode, RecordDraft, UserDisplayInfo, Verdict,
    },
};

/// Activity schedules and approved rosters, owned by the activity management side
#[async_trait]
pub trait ActivityDirectory: Send + Sync {
    /// Fails with `NotFound` for unknown activities
    async fn get_activity(&self, id: Uuid) -> AppResult<ActivitySchedule>;

    async fn is_approved_participant(&self, activity_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    async fn list_approved_participants(&self, activity_id: Uuid) -> AppResult<Vec<Participant>>;
}

/// User display data, owned by the identity side
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_user_display_info(&self, user_id: Uuid) -> AppResult<UserDisplayInfo>;
}

/// Outcome of removing one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRemoval {
    pub record_id: Uuid,
    /// The record was the last one and its document was deleted with it
    pub document_deleted: bool,
}

/// Attendance documents keyed by (activity, user), each holding at most one
/// record per (time slot, check-in type).
///
/// Every mutating method is a single read-modify-write executed under mutual
/// exclusion for its document, so concurrent submissions for the same key
/// cannot lose updates.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Replace the record matching the draft's slot and type in place (keeping
    /// its id) or append a new one, creating the document if needed. `stamp`
    /// is only used when the document is created.
    async fn upsert_record(
        &self,
        key: DocumentKey,
        stamp: Option<UserDisplayInfo>,
        draft: RecordDraft,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord>;

    /// Remove one record, deleting the document when it becomes empty.
    /// `NotFound` when no such record exists.
    async fn remove_record(
        &self,
        key: DocumentKey,
        time_slot: &str,
        check_in_type: CheckInType,
    ) -> AppResult<RecordRemoval>;

    /// Delete the document with all its records, returning how many records
    /// were removed. `NotFound` when the document does not exist.
    async fn remove_document(&self, key: DocumentKey) -> AppResult<usize>;

    /// Move an existing record to a new state without touching its submission
    /// fields. `NotFound` when the record is not in the document.
    async fn set_verdict(
        &self,
        key: DocumentKey,
        record_id: Uuid,
        verdict: Verdict,
        reason_code: ReasonCode,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord>;

    async fn find_document(&self, key: DocumentKey) -> AppResult<Option<AttendanceDocument>>;

    /// All documents of an activity, oldest first
    async fn list_documents(&self, activity_id: Uuid) -> AppResult<Vec<AttendanceDocument>>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> AppResult<()>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub activities: activities::ActivitiesRepository,
    pub users: users::UsersRepository,
    pub attendance: attendance::AttendanceRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            activities: activities::ActivitiesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            attendance: attendance::AttendanceRepository::new(pool.clone()),
            pool,
        }
    }
}
