//! Attendance repository: documents and records in Postgres
//!
//! Writers for one (activity, user) pair are serialized on the document row:
//! upserts take its row lock through `INSERT .. ON CONFLICT DO UPDATE`, removals
//! and reviews through `SELECT .. FOR UPDATE`. Records are unique on
//! (document_id, time_slot, check_in_type), so a resubmission updates the
//! existing row and keeps its id.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Transaction};
use uuid::Uuid;

use super::{AttendanceStore, RecordRemoval};
use crate::{
    error::{AppError, AppResult},
    models::{
        activity::UserDisplayInfo,
        attendance::{
            AttendanceDocument, AttendanceRecord, CheckInType, DocumentKey, ReasonCode,
            RecordDraft, RecordLocation, Verdict,
        },
    },
};

/// Attempts for a write hitting serialization failures or deadlocks
const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    activity_id: Uuid,
    user_id: Uuid,
    user_name: Option<String>,
    student_id: Option<String>,
    crea_date: DateTime<Utc>,
    modif_date: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    document_id: Uuid,
    time_slot: String,
    check_in_type: String,
    check_in_time: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    photo_url: Option<String>,
    status: String,
    reason_code: Option<String>,
    verified_by: Option<String>,
    verified_at: Option<DateTime<Utc>>,
    verification_note: Option<String>,
    cancel_reason: Option<String>,
    late_reason: Option<String>,
    crea_date: DateTime<Utc>,
    modif_date: DateTime<Utc>,
}

impl TryFrom<RecordRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: RecordRow) -> AppResult<Self> {
        Ok(AttendanceRecord {
            id: row.id,
            time_slot: row.time_slot,
            check_in_type: row
                .check_in_type
                .parse()
                .map_err(|_| AppError::Internal(format!("Bad check_in_type in record {}", row.id)))?,
            check_in_time: row.check_in_time,
            location: RecordLocation {
                lat: row.latitude,
                lng: row.longitude,
                address: row.address,
            },
            photo_url: row.photo_url,
            status: row.status.parse()?,
            reason_code: row
                .reason_code
                .as_deref()
                .map(str::parse::<ReasonCode>)
                .transpose()?,
            verified_by: row.verified_by,
            verified_at: row.verified_at,
            verification_note: row.verification_note,
            cancel_reason: row.cancel_reason,
            late_reason: row.late_reason,
            created_at: row.crea_date,
            updated_at: row.modif_date,
        })
    }
}

fn into_document(row: DocumentRow, records: Vec<AttendanceRecord>) -> AttendanceDocument {
    AttendanceDocument {
        id: row.id,
        activity_id: row.activity_id,
        user_id: row.user_id,
        user_name: row.user_name,
        student_id: row.student_id,
        records,
        created_at: row.crea_date,
        updated_at: row.modif_date,
    }
}

/// Serialization failure or deadlock: safe to run the transaction again
fn is_transient(error: &AppError) -> bool {
    match error {
        AppError::Database(e) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == "40001" || code == "40P01")
            .unwrap_or(false),
        _ => false,
    }
}

/// Run `op` again on transient failures, surfacing a `Conflict` once attempts run out
async fn with_retry<T, F, Fut>(operation: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if is_transient(&e) => {
                if attempt >= MAX_WRITE_ATTEMPTS {
                    tracing::warn!("{} gave up after {} attempts: {}", operation, attempt, e);
                    return Err(AppError::Conflict(format!(
                        "Concurrent update while trying to {}, please retry",
                        operation
                    )));
                }
                tracing::debug!("{} hit a transient failure (attempt {}): {}", operation, attempt, e);
                attempt += 1;
            }
            other => return other,
        }
    }
}

const RECORD_COLUMNS: &str = "id, document_id, time_slot, check_in_type, check_in_time, \
     latitude, longitude, address, photo_url, status, reason_code, verified_by, verified_at, \
     verification_note, cancel_reason, late_reason, crea_date, modif_date";

#[derive(Clone)]
pub struct AttendanceRepository {
    pool: Pool<Postgres>,
}

impl AttendanceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lock the document row for the rest of the transaction
    async fn lock_document(
        tx: &mut Transaction<'_, Postgres>,
        key: DocumentKey,
    ) -> AppResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM attendance_documents WHERE activity_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(key.activity_id)
        .bind(key.user_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn upsert_once(
        &self,
        key: DocumentKey,
        stamp: Option<&UserDisplayInfo>,
        draft: &RecordDraft,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord> {
        let mut tx = self.pool.begin().await?;

        let document_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO attendance_documents (id, activity_id, user_id, user_name, student_id, crea_date, modif_date)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (activity_id, user_id) DO UPDATE
                SET modif_date = EXCLUDED.modif_date
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key.activity_id)
        .bind(key.user_id)
        .bind(stamp.map(|s| s.name.as_str()))
        .bind(stamp.and_then(|s| s.student_id.as_deref()))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        // Values for a fresh row; on conflict only the id and crea_date survive
        let record = draft.clone().into_record(Uuid::new_v4(), now);

        let query = format!(
            r#"
            INSERT INTO attendance_records ({RECORD_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
            ON CONFLICT (document_id, time_slot, check_in_type) DO UPDATE SET
                check_in_time = EXCLUDED.check_in_time,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                address = EXCLUDED.address,
                photo_url = EXCLUDED.photo_url,
                status = EXCLUDED.status,
                reason_code = EXCLUDED.reason_code,
                verified_by = EXCLUDED.verified_by,
                verified_at = EXCLUDED.verified_at,
                verification_note = EXCLUDED.verification_note,
                cancel_reason = EXCLUDED.cancel_reason,
                late_reason = EXCLUDED.late_reason,
                modif_date = EXCLUDED.modif_date
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, RecordRow>(&query)
            .bind(record.id)
            .bind(document_id)
            .bind(&record.time_slot)
            .bind(record.check_in_type.as_str())
            .bind(record.check_in_time)
            .bind(record.location.lat)
            .bind(record.location.lng)
            .bind(&record.location.address)
            .bind(&record.photo_url)
            .bind(record.status.as_str())
            .bind(record.reason_code.map(|c| c.as_str()))
            .bind(&record.verified_by)
            .bind(record.verified_at)
            .bind(&record.verification_note)
            .bind(&record.cancel_reason)
            .bind(&record.late_reason)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn remove_record_once(
        &self,
        key: DocumentKey,
        time_slot: &str,
        check_in_type: CheckInType,
    ) -> AppResult<RecordRemoval> {
        let mut tx = self.pool.begin().await?;

        let document_id = Self::lock_document(&mut tx, key)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance record not found".to_string()))?;

        let record_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM attendance_records
            WHERE document_id = $1 AND time_slot = $2 AND check_in_type = $3
            RETURNING id
            "#,
        )
        .bind(document_id)
        .bind(time_slot)
        .bind(check_in_type.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Attendance record not found".to_string()))?;

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records WHERE document_id = $1")
                .bind(document_id)
                .fetch_one(&mut *tx)
                .await?;

        let document_deleted = remaining == 0;
        if document_deleted {
            sqlx::query("DELETE FROM attendance_documents WHERE id = $1")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(RecordRemoval { record_id, document_deleted })
    }

    async fn remove_document_once(&self, key: DocumentKey) -> AppResult<usize> {
        let mut tx = self.pool.begin().await?;

        let document_id = Self::lock_document(&mut tx, key)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance record not found".to_string()))?;

        let removed = sqlx::query("DELETE FROM attendance_records WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM attendance_documents WHERE id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn set_verdict_once(
        &self,
        key: DocumentKey,
        record_id: Uuid,
        verdict: &Verdict,
        reason_code: ReasonCode,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord> {
        let mut tx = self.pool.begin().await?;

        let not_found = || AppError::NotFound(format!("Attendance record {} not found", record_id));
        let document_id = Self::lock_document(&mut tx, key).await?.ok_or_else(not_found)?;

        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = $1 AND document_id = $2"
        ))
        .bind(record_id)
        .bind(document_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(not_found)?;

        let mut record = AttendanceRecord::try_from(row)?;
        record.apply_verdict(verdict.clone(), reason_code);
        record.updated_at = now;

        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            UPDATE attendance_records SET
                status = $1, reason_code = $2, verified_by = $3, verified_at = $4,
                verification_note = $5, cancel_reason = $6, modif_date = $7
            WHERE id = $8
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(record.status.as_str())
        .bind(record.reason_code.map(|c| c.as_str()))
        .bind(&record.verified_by)
        .bind(record.verified_at)
        .bind(&record.verification_note)
        .bind(&record.cancel_reason)
        .bind(now)
        .bind(record_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn load_records(&self, document_ids: &[Uuid]) -> AppResult<Vec<RecordRow>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM attendance_records
            WHERE document_id = ANY($1)
            ORDER BY crea_date, id
            "#
        ))
        .bind(document_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Attach records to their documents, keeping the documents' order
    async fn assemble(&self, documents: Vec<DocumentRow>) -> AppResult<Vec<AttendanceDocument>> {
        let ids: Vec<Uuid> = documents.iter().map(|d| d.id).collect();
        let mut rows = self.load_records(&ids).await?;

        let mut result = Vec::with_capacity(documents.len());
        for document in documents {
            let (mine, rest): (Vec<_>, Vec<_>) =
                rows.into_iter().partition(|r| r.document_id == document.id);
            rows = rest;
            let records = mine
                .into_iter()
                .map(AttendanceRecord::try_from)
                .collect::<AppResult<Vec<_>>>()?;
            result.push(into_document(document, records));
        }
        Ok(result)
    }
}

#[async_trait]
impl AttendanceStore for AttendanceRepository {
    async fn upsert_record(
        &self,
        key: DocumentKey,
        stamp: Option<UserDisplayInfo>,
        draft: RecordDraft,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord> {
        with_retry("save attendance record", || {
            self.upsert_once(key, stamp.as_ref(), &draft, now)
        })
        .await
    }

    async fn remove_record(
        &self,
        key: DocumentKey,
        time_slot: &str,
        check_in_type: CheckInType,
    ) -> AppResult<RecordRemoval> {
        with_retry("remove attendance record", || {
            self.remove_record_once(key, time_slot, check_in_type)
        })
        .await
    }

    async fn remove_document(&self, key: DocumentKey) -> AppResult<usize> {
        with_retry("remove attendance", || self.remove_document_once(key)).await
    }

    async fn set_verdict(
        &self,
        key: DocumentKey,
        record_id: Uuid,
        verdict: Verdict,
        reason_code: ReasonCode,
        now: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord> {
        with_retry("review attendance record", || {
            self.set_verdict_once(key, record_id, &verdict, reason_code, now)
        })
        .await
    }

    async fn find_document(&self, key: DocumentKey) -> AppResult<Option<AttendanceDocument>> {
        let document = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM attendance_documents WHERE activity_id = $1 AND user_id = $2",
        )
        .bind(key.activity_id)
        .bind(key.user_id)
        .fetch_optional(&self.pool)
        .await?;

        match document {
            Some(document) => Ok(self.assemble(vec![document]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_documents(&self, activity_id: Uuid) -> AppResult<Vec<AttendanceDocument>> {
        let documents = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM attendance_documents WHERE activity_id = $1 ORDER BY crea_date, id",
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(documents).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
