//! Activity log.
//!
//! Entries are written inside the same transaction as the change they
//! describe, so a rolled back change leaves no entry behind. Each entry
//! carries `hash = sha256(prev_hash || properties)` of the previous one.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Sqlite, Transaction};

pub mod loggable;
pub use loggable::{Loggable, Severity};

use crate::utils::capitalize;

/// Request context for activity logging (IP, User-Agent)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract context from request headers
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// Structured activity payload stored in `properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// The current/new state of the entity
    #[serde(rename = "new")]
    pub current: Value,
    /// The previous state (for update/delete operations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

/// One change to log.
pub struct Activity<'a, T: Loggable> {
    pub action: &'a str,
    pub actor_id: Option<i64>,
    pub entity: &'a T,
    pub old: Option<&'a T>,
    pub context: Option<&'a RequestContext>,
}

impl<'a, T: Loggable> Activity<'a, T> {
    pub fn new(action: &'a str, actor_id: i64, entity: &'a T) -> Self {
        Self {
            action,
            actor_id: Some(actor_id),
            entity,
            old: None,
            context: None,
        }
    }

    pub fn with_old(mut self, old: &'a T) -> Self {
        self.old = Some(old);
        self
    }

    pub fn with_context(mut self, context: &'a RequestContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// "News created", "Bid/Award force deleted".
pub fn describe(label: &str, action: &str) -> String {
    format!("{} {}", capitalize(label), action.replace('_', " "))
}

pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Writes one activity entry within `tx`.
pub async fn record<T: Loggable>(tx: &mut Transaction<'_, Sqlite>, activity: Activity<'_, T>) -> Result<(), sqlx::Error> {
    let event_name = format!("{}.{}", T::entity_type(), activity.action);
    let description = describe(T::entity_label(), activity.action);
    let severity = activity.entity.severity_for_action(activity.action);

    let payload = ActivityPayload {
        current: serde_json::to_value(activity.entity).unwrap_or_default(),
        old: activity.old.map(|e| serde_json::to_value(e).unwrap_or_default()),
    };
    let properties = serde_json::to_string(&payload).unwrap_or_default();

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM activity_logs ORDER BY id DESC LIMIT 1")
        .fetch_optional(&mut **tx)
        .await?;
    let hash = chain_hash(prev_hash.as_deref(), &properties);

    let context = activity.context.cloned().unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO activity_logs (event_name, description, actor_id, subject_type, subject_id, properties, severity, ip, user_agent, prev_hash, hash, occurred_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event_name)
    .bind(&description)
    .bind(activity.actor_id)
    .bind(T::entity_type())
    .bind(activity.entity.subject_id())
    .bind(&properties)
    .bind(severity.as_str())
    .bind(&context.ip)
    .bind(&context.user_agent)
    .bind(&prev_hash)
    .bind(&hash)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    tracing::info!(event = %event_name, actor_id = ?activity.actor_id, subject_id = activity.entity.subject_id(), "activity recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_chains_on_previous() {
        let first = chain_hash(None, "{}");
        let second = chain_hash(Some(&first), "{}");
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(second, chain_hash(Some(&first), "{}"));
    }

    #[test]
    fn descriptions_read_naturally() {
        assert_eq!(describe("news", "created"), "News created");
        assert_eq!(describe("ordinance/resolution", "force_deleted"), "Ordinance/resolution force deleted");
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        headers.insert(axum::http::header::USER_AGENT, "portal-test".parse().unwrap());

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(ctx.user_agent.as_deref(), Some("portal-test"));
    }
}
