//! Activities repository: schedules, zones and approved rosters

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use super::ActivityDirectory;
use crate::{
    error::{AppError, AppResult},
    models::activity::{
        ActivitySchedule, Coordinates, GeoZone, LocationRequirement, Participant, SlotZone,
        TimeSlot,
    },
};

/// Approval state of a roster entry that allows checking in
const APPROVED: &str = "approved";

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    name: String,
    activity_date: NaiveDate,
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius_m: Option<f64>,
}

#[derive(Clone)]
pub struct ActivitiesRepository {
    pool: Pool<Postgres>,
}

impl ActivitiesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Per-slot zones take precedence over the activity-wide zone
fn location_requirement(row: &ActivityRow, zones: Vec<SlotZone>) -> LocationRequirement {
    if !zones.is_empty() {
        return LocationRequirement::Multi { zones };
    }
    match (row.latitude, row.longitude, row.radius_m) {
        (Some(lat), Some(lng), Some(radius_m)) => LocationRequirement::Single(GeoZone {
            center: Coordinates::new(lat, lng),
            radius_m,
        }),
        _ => LocationRequirement::None,
    }
}

#[async_trait]
impl ActivityDirectory for ActivitiesRepository {
    async fn get_activity(&self, id: Uuid) -> AppResult<ActivitySchedule> {
        let row = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, name, activity_date, latitude, longitude, radius_m FROM activities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))?;

        let time_slots = sqlx::query_as::<_, TimeSlot>(
            r#"
            SELECT name, start_time, end_time, is_active
            FROM activity_time_slots
            WHERE activity_id = $1
            ORDER BY position, start_time
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let zones = sqlx::query_as::<_, SlotZone>(
            r#"
            SELECT time_slot, latitude, longitude, radius_m
            FROM activity_locations
            WHERE activity_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let location = location_requirement(&row, zones);

        Ok(ActivitySchedule {
            id: row.id,
            name: row.name,
            date: row.activity_date,
            time_slots,
            location,
        })
    }

    async fn is_approved_participant(&self, activity_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let approved: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM activity_participants
                WHERE activity_id = $1 AND user_id = $2 AND approval_status = $3
            )
            "#,
        )
        .bind(activity_id)
        .bind(user_id)
        .bind(APPROVED)
        .fetch_one(&self.pool)
        .await?;
        Ok(approved)
    }

    async fn list_approved_participants(&self, activity_id: Uuid) -> AppResult<Vec<Participant>> {
        let rows = sqlx::query_as::<_, Participant>(
            r#"
            SELECT p.user_id, u.name, u.student_id
            FROM activity_participants p
            LEFT JOIN users u ON u.id = p.user_id
            WHERE p.activity_id = $1 AND p.approval_status = $2
            ORDER BY u.name NULLS LAST, p.user_id
            "#,
        )
        .bind(activity_id)
        .bind(APPROVED)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
