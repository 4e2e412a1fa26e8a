use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog;
use crate::errors::AppResult;
use crate::events::Loggable;
use crate::forms::{Checks, FormData, DOCUMENT_EXTENSIONS};

pub const FULL_DISCLOSURE_COLUMNS: &str = "id, user_id, title, document_type, fiscal_year, quarter, description, file_path, is_featured, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FullDisclosure {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    #[schema(example = "budget")]
    pub document_type: String,
    pub document_type_label: Option<String>,
    pub fiscal_year: i64,
    #[schema(example = "Q2")]
    pub quarter: Option<String>,
    pub description: Option<String>,
    pub file_path: String,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FullDisclosure {
    pub fn file_paths(&self) -> Vec<String> {
        vec![self.file_path.clone()]
    }
}

impl Loggable for FullDisclosure {
    fn entity_type() -> &'static str { "full_disclosure" }
    fn entity_label() -> &'static str { "disclosure document" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbFullDisclosure {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub document_type: String,
    pub fiscal_year: i64,
    pub quarter: Option<String>,
    pub description: Option<String>,
    pub file_path: String,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbFullDisclosure> for FullDisclosure {
    fn from(value: DbFullDisclosure) -> Self {
        FullDisclosure {
            document_type_label: catalog::label_of(catalog::FULL_DISCLOSURES.types, &value.document_type).map(String::from),
            id: value.id,
            user_id: value.user_id,
            title: value.title,
            document_type: value.document_type,
            fiscal_year: value.fiscal_year,
            quarter: value.quarter,
            description: value.description,
            file_path: value.file_path,
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Validate)]
struct FullDisclosureForm {
    #[validate(length(min = 1, max = 255, message = "The title field is required and may not exceed 255 characters."))]
    title: String,
}

/// Multipart body. File: `file` (required on create).
#[derive(Debug, Deserialize, ToSchema)]
pub struct FullDisclosureFormSchema {
    pub title: String,
    pub document_type: String,
    pub fiscal_year: i64,
    pub quarter: Option<String>,
    pub description: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    #[schema(value_type = String, format = Binary)]
    pub file: String,
}

#[derive(Debug, Clone)]
pub struct FullDisclosureInput {
    pub title: String,
    pub document_type: String,
    pub fiscal_year: i64,
    pub quarter: Option<String>,
    pub description: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl FullDisclosureInput {
    /// `require_file` is set on create; updates may keep the stored document.
    pub fn parse(form: &FormData, require_file: bool) -> AppResult<Self> {
        let raw = FullDisclosureForm {
            title: form.text_or_empty("title"),
        };
        let mut checks = Checks::from_validator(raw.validate());

        let document_type = form.text("document_type");
        checks.one_of("document_type", document_type.as_deref(), catalog::FULL_DISCLOSURES.types);

        let year_text = form.text("fiscal_year");
        if year_text.is_none() {
            checks.add("fiscal_year", "The fiscal year field is required.");
        }
        let next_year = i64::from(Utc::now().year()) + 1;
        let fiscal_year = checks.integer("fiscal_year", year_text.as_deref(), 1990, next_year);

        let quarter = form.text("quarter").map(|q| q.to_ascii_uppercase());
        checks.optional_one_of("quarter", quarter.as_deref(), catalog::DISCLOSURE_QUARTERS);

        if require_file && form.file("file").is_none() {
            checks.add("file", "The file field is required.");
        }
        checks.file_kind("file", form.file("file"), DOCUMENT_EXTENSIONS);
        checks.finish(form)?;

        Ok(FullDisclosureInput {
            title: raw.title,
            document_type: document_type.unwrap_or_default(),
            fiscal_year: fiscal_year.unwrap_or_default(),
            quarter,
            description: form.text("description"),
            is_featured: form.flag("is_featured"),
            is_active: form.flag("is_active"),
        })
    }
}
