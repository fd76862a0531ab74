use crate::models::user::UserRole;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The user columns the auth guard needs to build a `CurrentUser`.
#[derive(Debug, FromRow)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
}
