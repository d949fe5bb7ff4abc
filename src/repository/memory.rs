//! In-memory collaborators for engine and handler tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ActivityDirectory, AttendanceStore, IdentityDirectory, RecordRemoval};
use crate::{
    error::{AppError, AppResult},
    models::{
        ActivitySchedule, AttendanceDocument, AttendanceRecord, CheckInType, DocumentKey,
        Participant, ReasonCode, RecordDraft, UserDisplayInfo, Verdict,
    },
};

/// Store keeping documents in a map; one lock covers each read-modify-write
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentKey, AttendanceDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document_count(&self) -> usize {
        self.documents.lock().await.len()
    }
}

fn record_not_found() -> AppError {
    AppError::NotFound("Attendance record not found".to_string())
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn upsert_record(
        &self,
        key: DocumentKey,
        stamp: Option<UserDisplayInfo>,
        draft: RecordDraft,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord> {
        let mut documents = self.documents.lock().await;
        let document = documents.entry(key).or_insert_with(|| AttendanceDocument {
            id: Uuid::new_v4(),
            activity_id: key.activity_id,
            user_id: key.user_id,
            user_name: stamp.as_ref().map(|s| s.name.clone()),
            student_id: stamp.as_ref().and_then(|s| s.student_id.clone()),
            records: Vec::new(),
            created_at: now,
            updated_at: now,
        });
        document.updated_at = now;

        let existing = document
            .records
            .iter_mut()
            .find(|r| r.matches(&draft.time_slot, draft.check_in_type));
        let record = match existing {
            Some(record) => {
                draft.overwrite(record, now);
                record.clone()
            }
            None => {
                let record = draft.into_record(Uuid::new_v4(), now);
                document.records.push(record.clone());
                record
            }
        };
        Ok(record)
    }

    async fn remove_record(
        &self,
        key: DocumentKey,
        time_slot: &str,
        check_in_type: CheckInType,
    ) -> AppResult<RecordRemoval> {
        let mut documents = self.documents.lock().await;
        let document = documents.get_mut(&key).ok_or_else(record_not_found)?;
        let index = document
            .records
            .iter()
            .position(|r| r.matches(time_slot, check_in_type))
            .ok_or_else(record_not_found)?;
        let record = document.records.remove(index);

        let document_deleted = document.records.is_empty();
        if document_deleted {
            documents.remove(&key);
        }
        Ok(RecordRemoval { record_id: record.id, document_deleted })
    }

    async fn remove_document(&self, key: DocumentKey) -> AppResult<usize> {
        let mut documents = self.documents.lock().await;
        let document = documents.remove(&key).ok_or_else(record_not_found)?;
        Ok(document.records.len())
    }

    async fn set_verdict(
        &self,
        key: DocumentKey,
        record_id: Uuid,
        verdict: Verdict,
        reason_code: ReasonCode,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord> {
        let mut documents = self.documents.lock().await;
        let record = documents
            .get_mut(&key)
            .and_then(|d| d.records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(record_not_found)?;
        record.apply_verdict(verdict, reason_code);
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn find_document(&self, key: DocumentKey) -> AppResult<Option<AttendanceDocument>> {
        Ok(self.documents.lock().await.get(&key).cloned())
    }

    async fn list_documents(&self, activity_id: Uuid) -> AppResult<Vec<AttendanceDocument>> {
        let documents = self.documents.lock().await;
        let mut found: Vec<AttendanceDocument> = documents
            .values()
            .filter(|d| d.activity_id == activity_id)
            .cloned()
            .collect();
        found.sort_by_key(|d| (d.created_at, d.id));
        Ok(found)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Activities, rosters and users held in maps
#[derive(Default)]
pub struct MemoryDirectory {
    activities: HashMap<Uuid, ActivitySchedule>,
    /// (participant, approved) per activity
    rosters: HashMap<Uuid, Vec<(Participant, bool)>>,
    users: HashMap<Uuid, UserDisplayInfo>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activity(mut self, activity: ActivitySchedule) -> Self {
        self.activities.insert(activity.id, activity);
        self
    }

    pub fn with_participant(
        mut self,
        activity_id: Uuid,
        user_id: Uuid,
        name: &str,
        student_id: &str,
        approved: bool,
    ) -> Self {
        let info = UserDisplayInfo {
            name: name.to_string(),
            student_id: Some(student_id.to_string()),
        };
        let participant = Participant {
            user_id,
            name: Some(info.name.clone()),
            student_id: info.student_id.clone(),
        };
        self.users.insert(user_id, info);
        self.rosters
            .entry(activity_id)
            .or_default()
            .push((participant, approved));
        self
    }
}

#[async_trait]
impl ActivityDirectory for MemoryDirectory {
    async fn get_activity(&self, id: Uuid) -> AppResult<ActivitySchedule> {
        self.activities
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    async fn is_approved_participant(&self, activity_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .rosters
            .get(&activity_id)
            .map(|roster| {
                roster
                    .iter()
                    .any(|(p, approved)| *approved && p.user_id == user_id)
            })
            .unwrap_or(false))
    }

    async fn list_approved_participants(&self, activity_id: Uuid) -> AppResult<Vec<Participant>> {
        Ok(self
            .rosters
            .get(&activity_id)
            .map(|roster| {
                roster
                    .iter()
                    .filter(|(_, approved)| *approved)
                    .map(|(p, _)| p.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn get_user_display_info(&self, user_id: Uuid) -> AppResult<UserDisplayInfo> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
    }
}
