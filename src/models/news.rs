use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog;
use crate::db::decode_paths;
use crate::errors::AppResult;
use crate::events::Loggable;
use crate::forms::{Checks, FormData, IMAGE_EXTENSIONS};

pub const NEWS_COLUMNS: &str = "id, user_id, title, excerpt, content, category, published_at, featured_image, gallery, is_featured, is_active, created_at, updated_at, deleted_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct News {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    #[schema(example = "announcement")]
    pub category: String,
    pub category_label: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub featured_image: Option<String>,
    pub gallery: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl News {
    /// Every stored file this record references.
    pub fn file_paths(&self) -> Vec<String> {
        self.featured_image.iter().cloned().chain(self.gallery.iter().cloned()).collect()
    }
}

impl Loggable for News {
    fn entity_type() -> &'static str { "news" }
    fn entity_label() -> &'static str { "news" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbNews {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: String,
    pub published_at: Option<DateTime<Utc>>,
    pub featured_image: Option<String>,
    pub gallery: String,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbNews> for News {
    fn from(value: DbNews) -> Self {
        News {
            category_label: catalog::label_of(catalog::NEWS.categories, &value.category).map(String::from),
            id: value.id,
            user_id: value.user_id,
            title: value.title,
            excerpt: value.excerpt,
            content: value.content,
            category: value.category,
            published_at: value.published_at,
            featured_image: value.featured_image,
            gallery: decode_paths(&value.gallery),
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        }
    }
}

/// Text rules checked by `validator`; enumerations, dates and files are
/// checked in [`NewsInput::parse`].
#[derive(Debug, Validate)]
struct NewsForm {
    #[validate(length(min = 1, max = 255, message = "The title field is required and may not exceed 255 characters."))]
    title: String,
    #[validate(length(max = 500, message = "The excerpt may not be greater than 500 characters."))]
    excerpt: Option<String>,
    #[validate(length(min = 1, message = "The content field is required."))]
    content: String,
}

/// Multipart body for create/update. Files: `featured_image`, `gallery[]`;
/// update also accepts `remove_gallery[]` with paths to drop.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewsFormSchema {
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: String,
    pub published_at: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub featured_image: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub gallery: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct NewsInput {
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: String,
    pub published_at: Option<DateTime<Utc>>,
    /// `None` when the checkbox was not submitted.
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl NewsInput {
    pub fn parse(form: &FormData) -> AppResult<Self> {
        let raw = NewsForm {
            title: form.text_or_empty("title"),
            excerpt: form.text("excerpt"),
            content: form.text_or_empty("content"),
        };
        let mut checks = Checks::from_validator(raw.validate());

        let category = form.text("category");
        checks.one_of("category", category.as_deref(), catalog::NEWS.categories);
        let published_at = checks.datetime("published_at", form.text("published_at").as_deref());
        checks.file_kind("featured_image", form.file("featured_image"), IMAGE_EXTENSIONS);
        checks.file_list_kind("gallery", form.file_list("gallery"), IMAGE_EXTENSIONS);
        checks.finish(form)?;

        Ok(NewsInput {
            title: raw.title,
            excerpt: raw.excerpt,
            content: raw.content,
            category: category.unwrap_or_default(),
            published_at,
            is_featured: form.flag("is_featured"),
            is_active: form.flag("is_active"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[test]
    fn valid_form_parses() {
        let form = FormData::default()
            .with_text("title", "Road closure")
            .with_text("content", "Main street is closed.")
            .with_text("category", "advisory")
            .with_text("is_featured", "1");
        let input = NewsInput::parse(&form).unwrap();
        assert_eq!(input.category, "advisory");
        assert_eq!(input.is_featured, Some(true));
        assert_eq!(input.is_active, None);
    }

    #[test]
    fn missing_fields_are_reported_together() {
        let form = FormData::default().with_text("category", "weather");
        match NewsInput::parse(&form) {
            Err(AppError::Validation(failure)) => {
                for field in ["title", "content", "category"] {
                    assert!(failure.errors.contains_key(field), "no error for {field}");
                }
                assert_eq!(failure.old_input.get("category").map(String::as_str), Some("weather"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
