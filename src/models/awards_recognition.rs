use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog;
use crate::errors::AppResult;
use crate::events::Loggable;
use crate::forms::{Checks, FormData, IMAGE_EXTENSIONS};

pub const AWARDS_RECOGNITION_COLUMNS: &str = "id, user_id, title, awarding_body, category, year, description, image, is_featured, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AwardsRecognition {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    #[schema(example = "Department of the Interior and Local Government")]
    pub awarding_body: String,
    pub category: String,
    pub category_label: Option<String>,
    pub year: i64,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AwardsRecognition {
    pub fn file_paths(&self) -> Vec<String> {
        self.image.iter().cloned().collect()
    }
}

impl Loggable for AwardsRecognition {
    fn entity_type() -> &'static str { "awards_recognition" }
    fn entity_label() -> &'static str { "award/recognition" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAwardsRecognition {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub awarding_body: String,
    pub category: String,
    pub year: i64,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbAwardsRecognition> for AwardsRecognition {
    fn from(value: DbAwardsRecognition) -> Self {
        AwardsRecognition {
            category_label: catalog::label_of(catalog::AWARDS_RECOGNITIONS.categories, &value.category).map(String::from),
            id: value.id,
            user_id: value.user_id,
            title: value.title,
            awarding_body: value.awarding_body,
            category: value.category,
            year: value.year,
            description: value.description,
            image: value.image,
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Validate)]
struct AwardsRecognitionForm {
    #[validate(length(min = 1, max = 255, message = "The title field is required and may not exceed 255 characters."))]
    title: String,
    #[validate(length(min = 1, max = 255, message = "The awarding body field is required."))]
    awarding_body: String,
}

/// Multipart body. File: `image`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AwardsRecognitionFormSchema {
    pub title: String,
    pub awarding_body: String,
    pub category: String,
    pub year: i64,
    pub description: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AwardsRecognitionInput {
    pub title: String,
    pub awarding_body: String,
    pub category: String,
    pub year: i64,
    pub description: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl AwardsRecognitionInput {
    pub fn parse(form: &FormData) -> AppResult<Self> {
        let raw = AwardsRecognitionForm {
            title: form.text_or_empty("title"),
            awarding_body: form.text_or_empty("awarding_body"),
        };
        let mut checks = Checks::from_validator(raw.validate());

        let category = form.text("category");
        checks.one_of("category", category.as_deref(), catalog::AWARDS_RECOGNITIONS.categories);

        let year_text = form.text("year");
        if year_text.is_none() {
            checks.add("year", "The year field is required.");
        }
        let next_year = i64::from(Utc::now().year()) + 1;
        let year = checks.integer("year", year_text.as_deref(), 1900, next_year);
        checks.file_kind("image", form.file("image"), IMAGE_EXTENSIONS);
        checks.finish(form)?;

        Ok(AwardsRecognitionInput {
            title: raw.title,
            awarding_body: raw.awarding_body,
            category: category.unwrap_or_default(),
            year: year.unwrap_or_default(),
            description: form.text("description"),
            is_featured: form.flag("is_featured"),
            is_active: form.flag("is_active"),
        })
    }
}
