//! Authorization module - permission catalog, role resolution and the gate.
//!
//! Every protected handler goes through [`PolicyEvaluator::can`]:
//! - admin role -> allow
//! - permission key present in the user's normalized set -> allow
//! - deny

mod evaluator;
mod principal;

pub use evaluator::{DefaultPolicyEvaluator, PolicyEvaluator};
pub use principal::{normalize_permissions, Principal};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role stored on the user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Staff,
    /// Any other value found in the database, kept verbatim.
    Legacy(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "super_admin" | "administrator" => Role::Admin,
            "staff" => Role::Staff,
            _ => Role::Legacy(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Legacy(value) => value,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Role::parse(&value))
    }
}

/// Roles that can be assigned through user management.
pub const ASSIGNABLE_ROLES: &[&str] = &["admin", "staff"];

/// The fixed permission catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKey {
    News,
    BidsAwards,
    TourismPackages,
    AwardsRecognitions,
    FullDisclosures,
    OrdinanceResolutions,
    SangguniangBayan,
    UserManagement,
    ActivityLogs,
    Trash,
}

impl PermissionKey {
    pub const ALL: [PermissionKey; 10] = [
        PermissionKey::News,
        PermissionKey::BidsAwards,
        PermissionKey::TourismPackages,
        PermissionKey::AwardsRecognitions,
        PermissionKey::FullDisclosures,
        PermissionKey::OrdinanceResolutions,
        PermissionKey::SangguniangBayan,
        PermissionKey::UserManagement,
        PermissionKey::ActivityLogs,
        PermissionKey::Trash,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionKey::News => "news",
            PermissionKey::BidsAwards => "bids_awards",
            PermissionKey::TourismPackages => "tourism_packages",
            PermissionKey::AwardsRecognitions => "awards_recognitions",
            PermissionKey::FullDisclosures => "full_disclosures",
            PermissionKey::OrdinanceResolutions => "ordinance_resolutions",
            PermissionKey::SangguniangBayan => "sangguniang_bayan",
            PermissionKey::UserManagement => "user_management",
            PermissionKey::ActivityLogs => "activity_logs",
            PermissionKey::Trash => "trash",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PermissionKey::News => "News",
            PermissionKey::BidsAwards => "Bids & Awards",
            PermissionKey::TourismPackages => "Tourism Packages",
            PermissionKey::AwardsRecognitions => "Awards & Recognitions",
            PermissionKey::FullDisclosures => "Full Disclosure",
            PermissionKey::OrdinanceResolutions => "Ordinances & Resolutions",
            PermissionKey::SangguniangBayan => "Sangguniang Bayan",
            PermissionKey::UserManagement => "User Management",
            PermissionKey::ActivityLogs => "Activity Logs",
            PermissionKey::Trash => "Trash",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

impl AsRef<str> for PermissionKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_admin_spellings_resolve_to_admin() {
        assert!(Role::parse("admin").is_admin());
        assert!(Role::parse("Super_Admin").is_admin());
        assert!(Role::parse("administrator").is_admin());
        assert!(!Role::parse("staff").is_admin());
        assert_eq!(Role::parse("encoder"), Role::Legacy("encoder".to_string()));
    }

    #[test]
    fn catalog_keys_parse_back() {
        for key in PermissionKey::ALL {
            assert_eq!(PermissionKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(PermissionKey::parse("weather"), None);
    }
}
