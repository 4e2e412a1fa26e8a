use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;

pub const ACTIVITY_LOG_COLUMNS: &str = "a.id, a.event_name, a.description, a.actor_id, u.name AS actor_name, a.subject_type, a.subject_id, a.properties, a.severity, a.ip, a.user_agent, a.prev_hash, a.hash, a.occurred_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityLog {
    pub id: i64,
    #[schema(example = "news.created")]
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub subject_type: String,
    pub subject_id: Option<i64>,
    /// `{ "new": {...}, "old": {...} }`
    #[schema(value_type = Object)]
    pub properties: Value,
    #[schema(example = "important")]
    pub severity: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActivityLog {
    pub id: i64,
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub subject_type: String,
    pub subject_id: Option<i64>,
    pub properties: String,
    pub severity: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<DbActivityLog> for ActivityLog {
    fn from(value: DbActivityLog) -> Self {
        ActivityLog {
            properties: serde_json::from_str(&value.properties).unwrap_or(Value::Null),
            id: value.id,
            event_name: value.event_name,
            description: value.description,
            actor_id: value.actor_id,
            actor_name: value.actor_name,
            subject_type: value.subject_type,
            subject_id: value.subject_id,
            severity: value.severity,
            ip: value.ip,
            user_agent: value.user_agent,
            prev_hash: value.prev_hash,
            hash: value.hash,
            occurred_at: value.occurred_at,
        }
    }
}
