use serde::{Deserialize, Serialize};

/// Severity levels for activity logs.
/// Controls retention policies and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical events: long-term retention, never auto-delete
    Critical,
    /// Important events: medium-term retention (default)
    #[default]
    Important,
    /// Noise events: aggressively trimmed (e.g., toggles)
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Trait for records that can be written to the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g., "news", "bids_award", "user")
    /// This becomes the prefix in event names like "news.created"
    fn entity_type() -> &'static str;

    /// Human label used in descriptions ("News", "Bid/Award").
    fn entity_label() -> &'static str;

    /// The subject ID (usually the entity's primary key)
    fn subject_id(&self) -> i64;

    /// Severity level for logs (defaults to Important)
    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Override severity based on action (e.g., "deleted" -> Critical)
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "force_deleted" => Severity::Critical,
            "featured" | "unfeatured" => Severity::Noise,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
