use std::collections::HashSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::Value;

use super::Role;
use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::AuthUser;
use crate::models::user::DbUser;

/// Principal represents the authenticated user with their decoded permissions
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: HashSet<String>,
}

impl Principal {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            name: String::new(),
            email: String::new(),
            role,
            permissions: HashSet::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = perms.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&DbUser> for Principal {
    fn from(user: &DbUser) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: Role::parse(&user.role),
            permissions: normalize_permissions(user.permissions.as_deref()),
        }
    }
}

/// Decodes the stored permission column into a set.
///
/// Accepts a JSON array of strings, a JSON string holding such an array
/// (double-encoded rows), or an object of `key: bool` flags. Anything else,
/// including malformed text, yields an empty set.
pub fn normalize_permissions(raw: Option<&str>) -> HashSet<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return HashSet::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => from_value(value, true),
        Err(err) => {
            tracing::warn!(error = %err, "unreadable permissions column, treating as empty");
            HashSet::new()
        }
    }
}

fn from_value(value: Value, allow_nested: bool) -> HashSet<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(key) => Some(key.trim().to_string()),
                _ => None,
            })
            .filter(|key| !key.is_empty())
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .filter(|(_, flag)| matches!(flag, Value::Bool(true)) || flag.as_i64() == Some(1))
            .map(|(key, _)| key)
            .collect(),
        Value::String(inner) if allow_nested => serde_json::from_str::<Value>(&inner)
            .map(|v| from_value(v, false))
            .unwrap_or_default(),
        _ => HashSet::new(),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        let user = DbUser::find(&state.pool, auth.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

        if !user.is_active {
            return Err(AppError::forbidden("your account has been deactivated"));
        }

        Ok(Principal::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_is_decoded() {
        let set = normalize_permissions(Some(r#"["news","trash"]"#));
        assert_eq!(set.len(), 2);
        assert!(set.contains("news"));
        assert!(set.contains("trash"));
    }

    #[test]
    fn double_encoded_array_is_decoded() {
        let set = normalize_permissions(Some(r#""[\"bids_awards\"]""#));
        assert!(set.contains("bids_awards"));
    }

    #[test]
    fn flag_object_keeps_truthy_keys() {
        let set = normalize_permissions(Some(r#"{"news":true,"trash":false,"activity_logs":1}"#));
        assert!(set.contains("news"));
        assert!(set.contains("activity_logs"));
        assert!(!set.contains("trash"));
    }

    #[test]
    fn garbage_and_missing_are_empty() {
        assert!(normalize_permissions(None).is_empty());
        assert!(normalize_permissions(Some("")).is_empty());
        assert!(normalize_permissions(Some("news,trash")).is_empty());
        assert!(normalize_permissions(Some("[\"news\"")).is_empty());
        assert!(normalize_permissions(Some("42")).is_empty());
        assert!(normalize_permissions(Some(r#""\"\"""#)).is_empty());
    }

    #[test]
    fn non_string_entries_are_skipped() {
        let set = normalize_permissions(Some(r#"["news", 3, null, ""]"#));
        assert_eq!(set.len(), 1);
    }
}
