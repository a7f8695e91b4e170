use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered account as stored in the `users` table.
///
/// The password hash is carried for credential checks but never serialized
/// into API responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    /// Stored lowercase; letters and digits only.
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
