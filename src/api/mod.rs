//! API handlers for the attendance REST endpoints

pub mod attendance;
pub mod health;
pub mod openapi;

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Attendance
        .route(
            "/activities/:id/attendance",
            get(attendance::get_attendance_summary).post(attendance::submit_attendance),
        )
        .route(
            "/activities/:id/attendance/pending",
            get(attendance::list_pending),
        )
        .route(
            "/activities/:id/attendance/:user_id",
            get(attendance::get_user_attendance),
        )
        .route(
            "/activities/:id/attendance/:user_id/records/:record_id/review",
            put(attendance::review_record),
        )
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        models::{ActivitySchedule, Coordinates, GeoZone, LocationRequirement, TimeSlot},
        repository::memory::{MemoryDirectory, MemoryStore},
        services::{attendance::AttendanceService, clock::FixedClock, Services},
        verification::WindowPolicy,
    };

    struct TestApp {
        router: Router,
        activity_id: Uuid,
        member: Uuid,
        outsider: Uuid,
    }

    fn test_app() -> TestApp {
        let (activity_id, member, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let activity = ActivitySchedule {
            id: activity_id,
            name: "Campus tree planting".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            time_slots: vec![TimeSlot {
                name: "Morning".to_string(),
                start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                is_active: true,
            }],
            location: LocationRequirement::Single(GeoZone {
                center: Coordinates::new(10.7769, 106.7009),
                radius_m: 50.0,
            }),
        };
        let directory = Arc::new(
            MemoryDirectory::new()
                .with_activity(activity)
                .with_participant(activity_id, member, "Minh Pham", "SV100", true)
                .with_participant(activity_id, outsider, "Lan Vo", "SV200", false),
        );
        // 08:05 in UTC+7
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 1, 5, 0).unwrap();
        let service = AttendanceService::new(
            directory.clone(),
            directory,
            Arc::new(MemoryStore::new()),
            Arc::new(FixedClock(now)),
            WindowPolicy::default(),
            false,
        );
        let state = AppState {
            config: Arc::new(AppConfig::default()),
            services: Arc::new(Services::with_attendance(service)),
        };
        TestApp { router: router(state), activity_id, member, outsider }
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn check_in(user_id: Uuid, time: &str, lat: f64) -> Value {
        json!({
            "user_id": user_id,
            "checked_in": true,
            "time_slot": "Morning",
            "check_in_type": "start",
            "check_in_time": time,
            "coordinates": { "lat": lat, "lng": 106.7009 },
            "photo_url": "/uploads/checkin.jpg"
        })
    }

    #[tokio::test]
    async fn test_health_and_readiness() {
        let app = test_app();
        let (status, body) = send(&app.router, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app.router, Method::GET, "/api/v1/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_check_in_then_read_back() {
        let app = test_app();
        let uri = format!("/api/v1/activities/{}/attendance", app.activity_id);
        let (status, body) = send(
            &app.router,
            Method::POST,
            &uri,
            Some(check_in(app.member, "2026-03-14T08:05:00+07:00", 10.7769)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "approved");
        assert_eq!(body["reason_code"], "auto_approved");
        let record_id = body["record_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app.router,
            Method::GET,
            &format!("{}/{}", uri, app.member),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_name"], "Minh Pham");
        assert_eq!(body["records"][0]["id"], record_id.as_str());
        assert_eq!(body["records"][0]["verified_by"], "system");

        let (status, body) = send(&app.router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totals"]["total"], 1);
        assert_eq!(body["totals"]["checked_in"], 1);
        assert_eq!(body["totals"]["rate"], 100.0);
    }

    #[tokio::test]
    async fn test_rejected_check_in_is_reported_with_ok_status() {
        let app = test_app();
        let uri = format!("/api/v1/activities/{}/attendance", app.activity_id);
        // ~80 m north of the venue
        let (status, body) = send(
            &app.router,
            Method::POST,
            &uri,
            Some(check_in(app.member, "2026-03-14T08:05:00+07:00", 10.77762)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["reason_code"], "outside_geofence");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let app = test_app();
        let uri = format!("/api/v1/activities/{}/attendance", app.activity_id);

        let (status, body) = send(&app.router, Method::POST, &uri, Some(json!({ "checked_in": "yes" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let mut missing = check_in(app.member, "2026-03-14T08:05:00+07:00", 10.7769);
        missing["coordinates"] = json!({ "lng": 106.7009 });
        let (status, _) = send(&app.router, Method::POST, &uri, Some(missing)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app.router, Method::GET, &format!("{}/{}", uri, app.member), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unapproved_participant_and_unknown_activity() {
        let app = test_app();
        let uri = format!("/api/v1/activities/{}/attendance", app.activity_id);
        let (status, _) = send(
            &app.router,
            Method::POST,
            &uri,
            Some(check_in(app.outsider, "2026-03-14T08:05:00+07:00", 10.7769)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app.router,
            Method::GET,
            &format!("/api/v1/activities/{}/attendance", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pending_review_flow() {
        let app = test_app();
        let uri = format!("/api/v1/activities/{}/attendance", app.activity_id);
        let (_, body) = send(
            &app.router,
            Method::POST,
            &uri,
            Some(check_in(app.member, "2026-03-14T08:22:00+07:00", 10.7769)),
        )
        .await;
        assert_eq!(body["status"], "pending");
        let record_id = body["record_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app.router, Method::GET, &format!("{}/pending", uri), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let review_uri = format!("{}/{}/records/{}/review", uri, app.member, record_id);
        let (status, body) = send(
            &app.router,
            Method::PUT,
            &review_uri,
            Some(json!({ "decision": "approve", "officer_id": "officer-1", "note": "late bus confirmed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");
        assert_eq!(body["verified_by"], "officer-1");
        assert_eq!(body["verification_note"], "late bus confirmed");

        let (_, body) = send(&app.router, Method::GET, &format!("{}/pending", uri), None).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_out_removes_document() {
        let app = test_app();
        let uri = format!("/api/v1/activities/{}/attendance", app.activity_id);
        send(
            &app.router,
            Method::POST,
            &uri,
            Some(check_in(app.member, "2026-03-14T08:05:00+07:00", 10.7769)),
        )
        .await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            &uri,
            Some(json!({
                "user_id": app.member,
                "checked_in": false,
                "time_slot": "Morning",
                "check_in_type": "start"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = send(&app.router, Method::GET, &format!("{}/{}", uri, app.member), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
