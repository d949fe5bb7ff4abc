//! Attendance service: check-in verification, check-out, officer review and
//! read projections

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use super::clock::Clock;
use crate::{
    error::{AppError, AppResult},
    models::{
        activity::UserDisplayInfo,
        attendance::{
            AttendanceCommand, AttendanceDocument, AttendanceRecord, AttendanceResponse,
            AttendanceStatus, AttendanceSummary, AttendanceTotals, CheckInSubmission,
            CheckOutTarget, DocumentKey, ParticipantAttendance, PendingRecord, ReasonCode,
            RecordDraft, RecordLocation, ReviewDecision, ReviewRequest, SubmitAttendance,
            Verdict, Verification,
        },
    },
    repository::{ActivityDirectory, AttendanceStore, IdentityDirectory},
    verification::{classify, resolve, validate_location, Resolution, WindowPolicy},
};

const DEFAULT_APPROVAL_NOTE: &str = "approved by officer";

#[derive(Clone)]
pub struct AttendanceService {
    activities: Arc<dyn ActivityDirectory>,
    identities: Arc<dyn IdentityDirectory>,
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    policy: WindowPolicy,
    /// Fail check-ins whose user display info cannot be resolved
    require_user_info: bool,
}

impl AttendanceService {
    pub fn new(
        activities: Arc<dyn ActivityDirectory>,
        identities: Arc<dyn IdentityDirectory>,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        policy: WindowPolicy,
        require_user_info: bool,
    ) -> Self {
        Self {
            activities,
            identities,
            store,
            clock,
            policy,
            require_user_info,
        }
    }

    /// Validate a raw submission and dispatch it to check-in or check-out
    pub async fn submit(
        &self,
        activity_id: Uuid,
        request: SubmitAttendance,
    ) -> AppResult<AttendanceResponse> {
        match request.into_command()? {
            AttendanceCommand::CheckIn { user_id, submission } => {
                self.submit_check_in(activity_id, user_id, submission).await
            }
            AttendanceCommand::CheckOut { user_id, target } => {
                self.submit_check_out(activity_id, user_id, target).await
            }
        }
    }

    /// Verify a check-in and store the resulting record.
    ///
    /// Location is checked first, then timing, then evidence. Failing
    /// submissions still leave a `rejected` record for officers to review, and
    /// the response carries `success = false`.
    pub async fn submit_check_in(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        submission: CheckInSubmission,
    ) -> AppResult<AttendanceResponse> {
        if !submission.coordinates.is_finite() {
            return Err(AppError::Validation(
                "coordinates must be finite numbers".to_string(),
            ));
        }

        let activity = self.activities.get_activity(activity_id).await?;
        if !self
            .activities
            .is_approved_participant(activity_id, user_id)
            .await?
        {
            return Err(AppError::NotFound(
                "participant not approved for this activity".to_string(),
            ));
        }

        let now = self.clock.now();
        let check_in_time = submission.check_in_time.unwrap_or(now);

        let geo = validate_location(submission.coordinates, &activity.location);
        let resolution = if !geo.valid {
            Resolution::outside_geofence(&geo)
        } else {
            let time = classify(
                check_in_time,
                activity.date,
                &activity.time_slots,
                &submission.time_slot,
                submission.check_in_type,
                &self.policy,
            );
            if time.is_valid() {
                resolve(&geo, &time, submission.has_photo())
            } else {
                Resolution::outside_window(&time)
            }
        };

        let stamp = self.display_info(user_id).await?;

        let status = resolution.status;
        let reason = resolution.reason.clone();
        let draft = RecordDraft {
            time_slot: submission.time_slot,
            check_in_type: submission.check_in_type,
            check_in_time,
            location: RecordLocation {
                lat: submission.coordinates.lat,
                lng: submission.coordinates.lng,
                address: submission.address,
            },
            photo_url: submission.photo_url,
            late_reason: submission.late_reason,
            reason_code: reason.code,
            verdict: resolution.into_verdict(now),
        };

        let record = self
            .store
            .upsert_record(DocumentKey::new(activity_id, user_id), stamp, draft, now)
            .await?;

        tracing::info!(
            "Check-in {} for user {} on activity {} ({} {}): {} ({})",
            record.id,
            user_id,
            activity_id,
            record.time_slot,
            record.check_in_type,
            status,
            reason.code.as_str()
        );

        Ok(AttendanceResponse {
            success: status != AttendanceStatus::Rejected,
            status: Some(status),
            record_id: Some(record.id),
            reason_code: Some(reason.code),
            distance_m: geo.distance_m,
            message: reason.detail,
        })
    }

    /// Remove one record, or every record of the participant when no target is given
    pub async fn submit_check_out(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        target: CheckOutTarget,
    ) -> AppResult<AttendanceResponse> {
        self.activities.get_activity(activity_id).await?;
        let key = DocumentKey::new(activity_id, user_id);

        let response = match target {
            Some((time_slot, check_in_type)) => {
                let removal = self
                    .store
                    .remove_record(key, &time_slot, check_in_type)
                    .await?;
                tracing::info!(
                    "Removed attendance record {} for user {} on activity {} (document deleted: {})",
                    removal.record_id,
                    user_id,
                    activity_id,
                    removal.document_deleted
                );
                AttendanceResponse {
                    success: true,
                    status: None,
                    record_id: Some(removal.record_id),
                    reason_code: None,
                    distance_m: None,
                    message: format!("Removed {} {} check-in", time_slot, check_in_type),
                }
            }
            None => {
                let removed = self.store.remove_document(key).await?;
                tracing::info!(
                    "Removed all {} attendance records for user {} on activity {}",
                    removed,
                    user_id,
                    activity_id
                );
                AttendanceResponse {
                    success: true,
                    status: None,
                    record_id: None,
                    reason_code: None,
                    distance_m: None,
                    message: format!("Removed {} attendance records", removed),
                }
            }
        };
        Ok(response)
    }

    /// Manual officer decision on a record
    pub async fn review_record(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        record_id: Uuid,
        request: ReviewRequest,
    ) -> AppResult<AttendanceRecord> {
        request.validate()?;
        let officer_id = request.officer_id.trim();
        if officer_id.is_empty() {
            return Err(AppError::Validation("officer_id is required".to_string()));
        }
        let note = request
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        self.activities.get_activity(activity_id).await?;
        let now = self.clock.now();

        let (verdict, reason_code) = match request.decision {
            ReviewDecision::Approve => (
                Verdict::Approved(Verification {
                    verified_by: officer_id.to_string(),
                    verified_at: now,
                    note: note.unwrap_or_else(|| DEFAULT_APPROVAL_NOTE.to_string()),
                }),
                ReasonCode::ManualApproval,
            ),
            ReviewDecision::Reject => {
                let cancel_reason = note.ok_or_else(|| {
                    AppError::Validation("A note is required to reject a record".to_string())
                })?;
                (Verdict::Rejected { cancel_reason }, ReasonCode::ManualRejection)
            }
        };

        let record = self
            .store
            .set_verdict(
                DocumentKey::new(activity_id, user_id),
                record_id,
                verdict,
                reason_code,
                now,
            )
            .await?;

        tracing::info!(
            "Officer {} set record {} of user {} on activity {} to {}",
            officer_id,
            record_id,
            user_id,
            activity_id,
            record.status
        );
        Ok(record)
    }

    /// Roster-wide view: who is checked in (any approved record) and who is not
    pub async fn get_attendance_summary(&self, activity_id: Uuid) -> AppResult<AttendanceSummary> {
        self.activities.get_activity(activity_id).await?;
        let roster = self
            .activities
            .list_approved_participants(activity_id)
            .await?;
        let mut documents: HashMap<Uuid, AttendanceDocument> = self
            .store
            .list_documents(activity_id)
            .await?
            .into_iter()
            .map(|d| (d.user_id, d))
            .collect();

        let participants: Vec<ParticipantAttendance> = roster
            .into_iter()
            .map(|participant| {
                let document = documents.remove(&participant.user_id);
                let checked_in = document
                    .as_ref()
                    .map(AttendanceDocument::has_approved_record)
                    .unwrap_or(false);
                let (name, student_id, records) = match document {
                    Some(d) => (
                        participant.name.or(d.user_name),
                        participant.student_id.or(d.student_id),
                        d.records,
                    ),
                    None => (participant.name, participant.student_id, Vec::new()),
                };
                ParticipantAttendance {
                    user_id: participant.user_id,
                    name,
                    student_id,
                    checked_in,
                    records,
                }
            })
            .collect();

        if !documents.is_empty() {
            tracing::debug!(
                "{} attendance documents on activity {} belong to users outside the approved roster",
                documents.len(),
                activity_id
            );
        }

        let total = participants.len();
        let checked_in = participants.iter().filter(|p| p.checked_in).count();
        let rate = if total == 0 {
            0.0
        } else {
            (checked_in as f64 * 10_000.0 / total as f64).round() / 100.0
        };

        Ok(AttendanceSummary {
            activity_id,
            participants,
            totals: AttendanceTotals {
                total,
                checked_in,
                not_checked_in: total - checked_in,
                rate,
            },
        })
    }

    pub async fn get_user_attendance(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<AttendanceDocument> {
        self.store
            .find_document(DocumentKey::new(activity_id, user_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance record not found".to_string()))
    }

    /// Records waiting for an officer decision
    pub async fn list_pending(&self, activity_id: Uuid) -> AppResult<Vec<PendingRecord>> {
        self.activities.get_activity(activity_id).await?;
        let documents = self.store.list_documents(activity_id).await?;

        Ok(documents
            .into_iter()
            .flat_map(|d| {
                let (user_id, user_name, student_id) = (d.user_id, d.user_name, d.student_id);
                d.records
                    .into_iter()
                    .filter(|r| r.status == AttendanceStatus::Pending)
                    .map(move |record| PendingRecord {
                        user_id,
                        user_name: user_name.clone(),
                        student_id: student_id.clone(),
                        record,
                    })
            })
            .collect())
    }

    /// Readiness probe for the backing store
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }

    async fn display_info(&self, user_id: Uuid) -> AppResult<Option<UserDisplayInfo>> {
        match self.identities.get_user_display_info(user_id).await {
            Ok(info) => Ok(Some(info)),
            Err(e) if !self.require_user_info => {
                tracing::warn!("Could not resolve display info for user {}: {}", user_id, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
