use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;
use validator::Validate;

use crate::authz::normalize_permissions;
use crate::events::{Loggable, Severity};

pub const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, permissions, is_active, last_login_at, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[schema(example = "staff")]
    pub role: String,
    /// Normalized, sorted permission keys.
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn entity_label() -> &'static str { "user" }
    fn subject_id(&self) -> i64 { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub permissions: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<DbUser>, sqlx::Error> {
        sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<DbUser>, sqlx::Error> {
        sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"))
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        let mut permissions: Vec<String> = normalize_permissions(value.permissions.as_deref())
            .into_iter()
            .collect();
        permissions.sort();

        User {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role,
            permissions,
            is_active: value.is_active,
            last_login_at: value.last_login_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UserCreateRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    #[schema(example = "Maria Santos")]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    #[schema(example = "maria@municipality.gov.ph")]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: String,
    #[schema(example = "staff")]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UserUpdateRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: Option<String>,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: Option<String>,
    pub role: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionsUpdateRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "admin@municipality.gov.ph")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn default_true() -> bool {
    true
}
