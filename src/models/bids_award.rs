use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog;
use crate::db::decode_paths;
use crate::errors::AppResult;
use crate::events::Loggable;
use crate::forms::{Checks, FormData, DOCUMENT_EXTENSIONS};

pub const BIDS_AWARD_COLUMNS: &str = "id, user_id, reference_number, title, description, category, status, approved_budget, opening_date, documents, is_featured, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BidsAward {
    pub id: i64,
    pub user_id: i64,
    #[schema(example = "ITB-2025-014")]
    pub reference_number: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub category_label: Option<String>,
    #[schema(example = "published")]
    pub status: String,
    pub status_label: Option<String>,
    pub approved_budget: Option<f64>,
    pub opening_date: Option<NaiveDate>,
    /// Supporting documents.
    pub documents: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BidsAward {
    pub fn file_paths(&self) -> Vec<String> {
        self.documents.clone()
    }
}

impl Loggable for BidsAward {
    fn entity_type() -> &'static str { "bids_award" }
    fn entity_label() -> &'static str { "bid/award" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbBidsAward {
    pub id: i64,
    pub user_id: i64,
    pub reference_number: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub status: String,
    pub approved_budget: Option<f64>,
    pub opening_date: Option<NaiveDate>,
    pub documents: String,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbBidsAward> for BidsAward {
    fn from(value: DbBidsAward) -> Self {
        BidsAward {
            category_label: catalog::label_of(catalog::BIDS_AWARDS.categories, &value.category).map(String::from),
            status_label: catalog::label_of(catalog::BIDS_AWARDS.statuses, &value.status).map(String::from),
            id: value.id,
            user_id: value.user_id,
            reference_number: value.reference_number,
            title: value.title,
            description: value.description,
            category: value.category,
            status: value.status,
            approved_budget: value.approved_budget,
            opening_date: value.opening_date,
            documents: decode_paths(&value.documents),
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Validate)]
struct BidsAwardForm {
    #[validate(length(min = 1, max = 100, message = "The reference number field is required."))]
    reference_number: String,
    #[validate(length(min = 1, max = 255, message = "The title field is required and may not exceed 255 characters."))]
    title: String,
}

/// Multipart body. Files: `documents[]`; update accepts `remove_documents[]`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BidsAwardFormSchema {
    pub reference_number: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub status: String,
    pub approved_budget: Option<f64>,
    pub opening_date: Option<NaiveDate>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<Vec<String>>)]
    pub documents: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct BidsAwardInput {
    pub reference_number: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    /// Any catalog status may follow any other.
    pub status: String,
    pub approved_budget: Option<f64>,
    pub opening_date: Option<NaiveDate>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl BidsAwardInput {
    pub fn parse(form: &FormData) -> AppResult<Self> {
        let raw = BidsAwardForm {
            reference_number: form.text_or_empty("reference_number"),
            title: form.text_or_empty("title"),
        };
        let mut checks = Checks::from_validator(raw.validate());

        let category = form.text("category");
        let status = form.text("status");
        checks.one_of("category", category.as_deref(), catalog::BIDS_AWARDS.categories);
        checks.one_of("status", status.as_deref(), catalog::BIDS_AWARDS.statuses);
        let approved_budget = checks.amount("approved_budget", form.text("approved_budget").as_deref());
        let opening_date = checks.date("opening_date", form.text("opening_date").as_deref());
        checks.file_list_kind("documents", form.file_list("documents"), DOCUMENT_EXTENSIONS);
        checks.finish(form)?;

        Ok(BidsAwardInput {
            reference_number: raw.reference_number,
            title: raw.title,
            description: form.text("description"),
            category: category.unwrap_or_default(),
            status: status.unwrap_or_default(),
            approved_budget,
            opening_date,
            is_featured: form.flag("is_featured"),
            is_active: form.flag("is_active"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    fn base() -> FormData {
        FormData::default()
            .with_text("reference_number", "ITB-2025-001")
            .with_text("title", "Supply of office chairs")
            .with_text("category", "goods")
    }

    #[test]
    fn any_catalog_status_is_accepted() {
        for status in ["draft", "awarded", "opened"] {
            let input = BidsAwardInput::parse(&base().with_text("status", status)).unwrap();
            assert_eq!(input.status, status);
        }
    }

    #[test]
    fn budget_accepts_thousands_separators() {
        let input = BidsAwardInput::parse(&base().with_text("status", "draft").with_text("approved_budget", "1,250,000.50")).unwrap();
        assert_eq!(input.approved_budget, Some(1_250_000.5));
    }

    #[test]
    fn unknown_status_is_rejected() {
        match BidsAwardInput::parse(&base().with_text("status", "cancelled")) {
            Err(AppError::Validation(failure)) => assert!(failure.errors.contains_key("status")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
