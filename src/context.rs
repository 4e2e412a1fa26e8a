//! Per-request presentation context: who is signed in, which sections they
//! may open and the badge counts for the navigation.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::{PermissionKey, PolicyEvaluator, Principal};
use crate::badges::{compute_badge_counts, BadgeCounts, BadgeSource, SqliteBadgeSource};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContextUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViewContext {
    pub user: ContextUser,
    pub is_admin: bool,
    /// One entry per catalog key.
    pub permissions: BTreeMap<String, bool>,
    pub badges: BadgeCounts,
}

impl ViewContext {
    pub async fn build(state: &AppState, principal: &Principal) -> Self {
        let source = SqliteBadgeSource::new(state.pool.clone());
        Self::build_with(state.authz.as_ref(), &source, principal).await
    }

    pub async fn build_with(
        evaluator: &dyn PolicyEvaluator,
        source: &dyn BadgeSource,
        principal: &Principal,
    ) -> Self {
        let permissions = PermissionKey::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), evaluator.can(principal, key.as_str())))
            .collect();

        Self {
            user: ContextUser {
                id: principal.user_id,
                name: principal.name.clone(),
                email: principal.email.clone(),
                role: principal.role.as_str().to_string(),
            },
            is_admin: principal.is_admin(),
            permissions,
            badges: compute_badge_counts(evaluator, source, principal).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{DefaultPolicyEvaluator, Role};
    use crate::badges::Badge;
    use async_trait::async_trait;

    struct Zero;

    #[async_trait]
    impl BadgeSource for Zero {
        async fn count(&self, _badge: Badge) -> Result<i64, sqlx::Error> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn flags_cover_the_whole_catalog() {
        let principal = Principal::new(3, Role::Legacy("encoder".into())).with_permissions(["news"]);
        let ctx = ViewContext::build_with(&DefaultPolicyEvaluator, &Zero, &principal).await;

        assert_eq!(ctx.permissions.len(), PermissionKey::ALL.len());
        assert_eq!(ctx.permissions.get("news"), Some(&true));
        assert_eq!(ctx.permissions.get("user_management"), Some(&false));
        assert!(!ctx.is_admin);
        assert_eq!(ctx.user.role, "encoder");
    }
}
