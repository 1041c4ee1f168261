use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Point-lookup criterion for [`User::find_by`].
#[derive(Debug, Clone)]
pub enum UserBy {
    Id(Uuid),
    Email(String),
    SessionToken(String),
    ResetToken(String),
}

/// Field changes for [`User::update`]. `None` leaves a column untouched;
/// the nested option distinguishes setting a token from clearing it.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub password_hash: Option<String>,
    pub session_token: Option<Option<String>>,
    pub reset_token: Option<Option<String>>,
}
