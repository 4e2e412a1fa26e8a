use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog;
use crate::errors::AppResult;
use crate::events::Loggable;
use crate::forms::{Checks, FormData, DOCUMENT_EXTENSIONS};

pub const ORDINANCE_RESOLUTION_COLUMNS: &str = "id, user_id, kind, number, title, status, date_enacted, author, summary, document, is_featured, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrdinanceResolution {
    pub id: i64,
    pub user_id: i64,
    /// `ordinance` or `resolution`.
    #[serde(rename = "type")]
    pub kind: String,
    pub type_label: Option<String>,
    #[schema(example = "2025-007")]
    pub number: String,
    pub title: String,
    pub status: String,
    pub status_label: Option<String>,
    pub date_enacted: Option<NaiveDate>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub document: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrdinanceResolution {
    pub fn file_paths(&self) -> Vec<String> {
        self.document.iter().cloned().collect()
    }
}

impl Loggable for OrdinanceResolution {
    fn entity_type() -> &'static str { "ordinance_resolution" }
    fn entity_label() -> &'static str { "ordinance/resolution" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbOrdinanceResolution {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub number: String,
    pub title: String,
    pub status: String,
    pub date_enacted: Option<NaiveDate>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub document: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbOrdinanceResolution> for OrdinanceResolution {
    fn from(value: DbOrdinanceResolution) -> Self {
        OrdinanceResolution {
            type_label: catalog::label_of(catalog::ORDINANCE_RESOLUTIONS.types, &value.kind).map(String::from),
            status_label: catalog::label_of(catalog::ORDINANCE_RESOLUTIONS.statuses, &value.status).map(String::from),
            id: value.id,
            user_id: value.user_id,
            kind: value.kind,
            number: value.number,
            title: value.title,
            status: value.status,
            date_enacted: value.date_enacted,
            author: value.author,
            summary: value.summary,
            document: value.document,
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Validate)]
struct OrdinanceResolutionForm {
    #[validate(length(min = 1, max = 50, message = "The number field is required."))]
    number: String,
    #[validate(length(min = 1, max = 500, message = "The title field is required and may not exceed 500 characters."))]
    title: String,
    #[validate(length(max = 255, message = "The author may not be greater than 255 characters."))]
    author: Option<String>,
}

/// Multipart body. File: `document`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrdinanceResolutionFormSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
    pub title: String,
    pub status: String,
    pub date_enacted: Option<NaiveDate>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub document: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrdinanceResolutionInput {
    pub kind: String,
    pub number: String,
    pub title: String,
    /// Any catalog status may follow any other.
    pub status: String,
    pub date_enacted: Option<NaiveDate>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl OrdinanceResolutionInput {
    pub fn parse(form: &FormData) -> AppResult<Self> {
        let raw = OrdinanceResolutionForm {
            number: form.text_or_empty("number"),
            title: form.text_or_empty("title"),
            author: form.text("author"),
        };
        let mut checks = Checks::from_validator(raw.validate());

        let kind = form.text("type");
        let status = form.text("status");
        checks.one_of("type", kind.as_deref(), catalog::ORDINANCE_RESOLUTIONS.types);
        checks.one_of("status", status.as_deref(), catalog::ORDINANCE_RESOLUTIONS.statuses);
        let date_enacted = checks.date("date_enacted", form.text("date_enacted").as_deref());
        checks.file_kind("document", form.file("document"), DOCUMENT_EXTENSIONS);
        checks.finish(form)?;

        Ok(OrdinanceResolutionInput {
            kind: kind.unwrap_or_default(),
            number: raw.number,
            title: raw.title,
            status: status.unwrap_or_default(),
            date_enacted,
            author: raw.author,
            summary: form.text("summary"),
            is_featured: form.flag("is_featured"),
            is_active: form.flag("is_active"),
        })
    }
}
