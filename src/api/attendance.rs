//! Attendance endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::attendance::{
        AttendanceDocument, AttendanceRecord, AttendanceResponse, AttendanceSummary,
        PendingRecord, ReviewRequest, SubmitAttendance,
    },
    AppState,
};

fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}

/// Submit a check-in (`checked_in = true`) or a check-out (`checked_in = false`).
///
/// Verification outcomes, rejections included, are returned with status 200;
/// `success` is false when the check-in was rejected.
#[utoipa::path(
    post,
    path = "/activities/{id}/attendance",
    tag = "attendance",
    params(
        ("id" = Uuid, Path, description = "Activity ID")
    ),
    request_body = SubmitAttendance,
    responses(
        (status = 200, description = "Submission evaluated", body = AttendanceResponse),
        (status = 400, description = "Missing or malformed fields", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown activity, participant not approved, or nothing to check out", body = crate::error::ErrorResponse),
        (status = 409, description = "Concurrent update could not be applied", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_attendance(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
    payload: Result<Json<SubmitAttendance>, JsonRejection>,
) -> AppResult<Json<AttendanceResponse>> {
    let Json(request) = payload.map_err(bad_body)?;
    let response = state.services.attendance.submit(activity_id, request).await?;
    Ok(Json(response))
}

/// Attendance of every approved participant with roster totals
#[utoipa::path(
    get,
    path = "/activities/{id}/attendance",
    tag = "attendance",
    params(
        ("id" = Uuid, Path, description = "Activity ID")
    ),
    responses(
        (status = 200, description = "Attendance summary", body = AttendanceSummary),
        (status = 404, description = "Activity not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_attendance_summary(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
) -> AppResult<Json<AttendanceSummary>> {
    let summary = state
        .services
        .attendance
        .get_attendance_summary(activity_id)
        .await?;
    Ok(Json(summary))
}

/// Records waiting for an officer decision
#[utoipa::path(
    get,
    path = "/activities/{id}/attendance/pending",
    tag = "attendance",
    params(
        ("id" = Uuid, Path, description = "Activity ID")
    ),
    responses(
        (status = 200, description = "Pending records", body = Vec<PendingRecord>),
        (status = 404, description = "Activity not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_pending(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
) -> AppResult<Json<Vec<PendingRecord>>> {
    let pending = state.services.attendance.list_pending(activity_id).await?;
    Ok(Json(pending))
}

/// Attendance document of one participant
#[utoipa::path(
    get,
    path = "/activities/{id}/attendance/{user_id}",
    tag = "attendance",
    params(
        ("id" = Uuid, Path, description = "Activity ID"),
        ("user_id" = Uuid, Path, description = "Participant user ID")
    ),
    responses(
        (status = 200, description = "Attendance document", body = AttendanceDocument),
        (status = 404, description = "No attendance for this participant", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user_attendance(
    State(state): State<AppState>,
    Path((activity_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<AttendanceDocument>> {
    let document = state
        .services
        .attendance
        .get_user_attendance(activity_id, user_id)
        .await?;
    Ok(Json(document))
}

/// Approve or reject a record by hand
#[utoipa::path(
    put,
    path = "/activities/{id}/attendance/{user_id}/records/{record_id}/review",
    tag = "attendance",
    params(
        ("id" = Uuid, Path, description = "Activity ID"),
        ("user_id" = Uuid, Path, description = "Participant user ID"),
        ("record_id" = Uuid, Path, description = "Record ID")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Updated record", body = AttendanceRecord),
        (status = 400, description = "Invalid review", body = crate::error::ErrorResponse),
        (status = 404, description = "Record not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn review_record(
    State(state): State<AppState>,
    Path((activity_id, user_id, record_id)): Path<(Uuid, Uuid, Uuid)>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<Json<AttendanceRecord>> {
    let Json(request) = payload.map_err(bad_body)?;
    let record = state
        .services
        .attendance
        .review_record(activity_id, user_id, record_id, request)
        .await?;
    Ok(Json(record))
}
