//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{attendance, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Club Attendance API",
        version = "0.3.0",
        description = "Check-in verification and attendance tracking for club activities"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Attendance
        attendance::submit_attendance,
        attendance::get_attendance_summary,
        attendance::list_pending,
        attendance::get_user_attendance,
        attendance::review_record,
    ),
    components(
        schemas(
            // Attendance
            crate::models::attendance::SubmitAttendance,
            crate::models::attendance::CoordinatesInput,
            crate::models::attendance::ReviewRequest,
            crate::models::attendance::ReviewDecision,
            crate::models::attendance::AttendanceResponse,
            crate::models::attendance::AttendanceDocument,
            crate::models::attendance::AttendanceRecord,
            crate::models::attendance::RecordLocation,
            crate::models::attendance::AttendanceStatus,
            crate::models::attendance::CheckInType,
            crate::models::attendance::ReasonCode,
            crate::models::attendance::AttendanceSummary,
            crate::models::attendance::AttendanceTotals,
            crate::models::attendance::ParticipantAttendance,
            crate::models::attendance::PendingRecord,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "attendance", description = "Check-in, check-out and officer review")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
