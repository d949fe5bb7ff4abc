//! Users repository (display data only)

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::IdentityDirectory;
use crate::{
    error::{AppError, AppResult},
    models::activity::UserDisplayInfo,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityDirectory for UsersRepository {
    async fn get_user_display_info(&self, user_id: Uuid) -> AppResult<UserDisplayInfo> {
        sqlx::query_as::<_, UserDisplayInfo>("SELECT name, student_id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
    }
}
