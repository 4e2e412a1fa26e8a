use super::principal::Principal;

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    /// Check if the principal holds the given permission key
    fn can(&self, principal: &Principal, permission: &str) -> bool;

    /// Allow when any of the keys is allowed
    fn can_any(&self, principal: &Principal, permissions: &[&str]) -> bool {
        permissions.iter().any(|permission| self.can(principal, permission))
    }
}

/// Default policy evaluator
///
/// Evaluation order:
/// 1. admin role -> allow
/// 2. key present in the normalized permission set -> allow
/// 3. deny
///
/// Keys outside the catalog are not rejected; they simply never match.
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyEvaluator;

impl DefaultPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn can(&self, principal: &Principal, permission: &str) -> bool {
        if principal.is_admin() {
            tracing::debug!(
                user_id = principal.user_id,
                permission = %permission,
                "admin bypass"
            );
            return true;
        }

        if principal.has_permission(permission) {
            tracing::debug!(
                user_id = principal.user_id,
                permission = %permission,
                "direct permission match"
            );
            return true;
        }

        tracing::debug!(
            user_id = principal.user_id,
            permission = %permission,
            role = %principal.role.as_str(),
            "permission denied"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{normalize_permissions, PermissionKey, Role};

    #[test]
    fn admin_passes_every_catalog_key_with_no_permissions() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(1, Role::Admin);

        for key in PermissionKey::ALL {
            assert!(evaluator.can(&principal, key.as_str()), "admin denied {key}");
        }
        assert!(evaluator.can(&principal, "not.in.catalog"));
    }

    #[test]
    fn admin_passes_even_with_corrupt_permissions() {
        let evaluator = DefaultPolicyEvaluator::new();
        let mut principal = Principal::new(1, Role::parse("super_admin"));
        principal.permissions = normalize_permissions(Some("{{{"));

        assert!(evaluator.can(&principal, "user_management"));
    }

    #[test]
    fn staff_is_allowed_exactly_their_keys() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(2, Role::Staff).with_permissions(["news", "trash"]);

        for key in PermissionKey::ALL {
            let expected = matches!(key, PermissionKey::News | PermissionKey::Trash);
            assert_eq!(evaluator.can(&principal, key.as_str()), expected, "key {key}");
        }
    }

    #[test]
    fn corrupt_permissions_deny_everything() {
        let evaluator = DefaultPolicyEvaluator::new();
        let mut principal = Principal::new(3, Role::Staff);
        principal.permissions = normalize_permissions(Some("news"));

        for key in PermissionKey::ALL {
            assert!(!evaluator.can(&principal, key.as_str()));
        }
    }

    #[test]
    fn unknown_key_is_just_a_miss() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(4, Role::Legacy("encoder".into())).with_permissions(["weather"]);

        assert!(evaluator.can(&principal, "weather"));
        assert!(!evaluator.can(&principal, "news"));
    }

    #[test]
    fn can_any_matches_one_of_several() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(5, Role::Staff).with_permissions(["news"]);

        assert!(evaluator.can_any(&principal, &["trash", "news"]));
        assert!(!evaluator.can_any(&principal, &["trash", "activity_logs"]));
    }
}
