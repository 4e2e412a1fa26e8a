//! Navigation badge counts.
//!
//! One count per category the principal may manage, recomputed on every
//! request. A failing count is logged and reported as zero so the rest of
//! the navigation still renders.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::authz::{PermissionKey, PolicyEvaluator, Principal};

/// Badge key -> count.
pub type BadgeCounts = BTreeMap<String, i64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    News,
    BidsAwards,
    TourismPackages,
    AwardsRecognitions,
    FullDisclosures,
    OrdinanceResolutions,
    SangguniangBayan,
    Trash,
    Users,
    ActivityLogs,
}

impl Badge {
    /// Badges shown to holders of the matching permission key.
    pub const CATEGORIES: [(Badge, PermissionKey); 7] = [
        (Badge::News, PermissionKey::News),
        (Badge::BidsAwards, PermissionKey::BidsAwards),
        (Badge::TourismPackages, PermissionKey::TourismPackages),
        (Badge::AwardsRecognitions, PermissionKey::AwardsRecognitions),
        (Badge::FullDisclosures, PermissionKey::FullDisclosures),
        (Badge::OrdinanceResolutions, PermissionKey::OrdinanceResolutions),
        (Badge::SangguniangBayan, PermissionKey::SangguniangBayan),
    ];

    pub fn key(self) -> &'static str {
        match self {
            Badge::News => "news",
            Badge::BidsAwards => "bids_awards",
            Badge::TourismPackages => "tourism_packages",
            Badge::AwardsRecognitions => "awards_recognitions",
            Badge::FullDisclosures => "full_disclosures",
            Badge::OrdinanceResolutions => "ordinance_resolutions",
            Badge::SangguniangBayan => "sangguniang_bayan",
            Badge::Trash => "trash",
            Badge::Users => "users",
            Badge::ActivityLogs => "activity_logs",
        }
    }

    pub fn count_sql(self) -> &'static str {
        match self {
            Badge::News => "SELECT COUNT(*) FROM news WHERE is_active = 1 AND deleted_at IS NULL",
            Badge::BidsAwards => "SELECT COUNT(*) FROM bids_awards WHERE is_active = 1 AND status <> 'draft'",
            Badge::TourismPackages => "SELECT COUNT(*) FROM tourism_packages WHERE is_active = 1",
            Badge::AwardsRecognitions => "SELECT COUNT(*) FROM awards_recognitions",
            Badge::FullDisclosures => "SELECT COUNT(*) FROM full_disclosures",
            Badge::OrdinanceResolutions => "SELECT COUNT(*) FROM ordinance_resolutions",
            Badge::SangguniangBayan => "SELECT COUNT(*) FROM sb_members WHERE is_active = 1",
            Badge::Trash => "SELECT COUNT(*) FROM news WHERE deleted_at IS NOT NULL",
            Badge::Users => "SELECT COUNT(*) FROM users",
            Badge::ActivityLogs => "SELECT COUNT(*) FROM activity_logs",
        }
    }
}

#[async_trait]
pub trait BadgeSource: Send + Sync {
    async fn count(&self, badge: Badge) -> Result<i64, sqlx::Error>;
}

pub struct SqliteBadgeSource {
    pool: SqlitePool,
}

impl SqliteBadgeSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BadgeSource for SqliteBadgeSource {
    async fn count(&self, badge: Badge) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(badge.count_sql())
            .fetch_one(&self.pool)
            .await
    }
}

/// Badges `principal` is entitled to see, in display order.
pub fn visible_badges(evaluator: &dyn PolicyEvaluator, principal: &Principal) -> Vec<Badge> {
    let mut badges: Vec<Badge> = Badge::CATEGORIES
        .iter()
        .filter(|(_, key)| evaluator.can(principal, key.as_str()))
        .map(|(badge, _)| *badge)
        .collect();

    // trash holds soft-deleted news
    if evaluator.can(principal, PermissionKey::News.as_str()) {
        badges.push(Badge::Trash);
    }
    if principal.is_admin() {
        badges.push(Badge::Users);
        badges.push(Badge::ActivityLogs);
    }
    badges
}

pub async fn compute_badge_counts(
    evaluator: &dyn PolicyEvaluator,
    source: &dyn BadgeSource,
    principal: &Principal,
) -> BadgeCounts {
    let mut counts = BadgeCounts::new();

    for badge in visible_badges(evaluator, principal) {
        let count = match source.count(badge).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(badge = badge.key(), error = %err, "badge count failed, reporting zero");
                0
            }
        };
        counts.insert(badge.key().to_string(), count);
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{DefaultPolicyEvaluator, Role};

    /// Returns a fixed count per badge and fails for one of them.
    struct FixedSource {
        failing: Option<Badge>,
    }

    #[async_trait]
    impl BadgeSource for FixedSource {
        async fn count(&self, badge: Badge) -> Result<i64, sqlx::Error> {
            if Some(badge) == self.failing {
                return Err(sqlx::Error::RowNotFound);
            }
            Ok(badge.key().len() as i64)
        }
    }

    #[tokio::test]
    async fn staff_sees_only_granted_categories() {
        let principal = Principal::new(2, Role::Staff).with_permissions(["bids_awards", "sangguniang_bayan"]);
        let counts = compute_badge_counts(&DefaultPolicyEvaluator, &FixedSource { failing: None }, &principal).await;

        let keys: Vec<&str> = counts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["bids_awards", "sangguniang_bayan"]);
    }

    #[tokio::test]
    async fn news_holder_sees_trash() {
        let principal = Principal::new(2, Role::Staff).with_permissions(["news"]);
        let counts = compute_badge_counts(&DefaultPolicyEvaluator, &FixedSource { failing: None }, &principal).await;
        assert!(counts.contains_key("trash"));
        assert!(!counts.contains_key("users"));
    }

    #[tokio::test]
    async fn admin_sees_everything() {
        let principal = Principal::new(1, Role::Admin);
        let counts = compute_badge_counts(&DefaultPolicyEvaluator, &FixedSource { failing: None }, &principal).await;
        assert_eq!(counts.len(), 10);
        assert_eq!(counts.get("users"), Some(&5));
    }

    #[tokio::test]
    async fn failing_count_is_zero_and_others_survive() {
        let principal = Principal::new(1, Role::Admin);
        let source = FixedSource {
            failing: Some(Badge::TourismPackages),
        };
        let counts = compute_badge_counts(&DefaultPolicyEvaluator, &source, &principal).await;

        assert_eq!(counts.get("tourism_packages"), Some(&0));
        assert_eq!(counts.get("news"), Some(&4));
        assert_eq!(counts.get("activity_logs"), Some(&13));
        assert_eq!(counts.len(), 10);
    }
}
