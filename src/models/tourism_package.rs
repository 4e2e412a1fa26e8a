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

pub const TOURISM_PACKAGE_COLUMNS: &str = "id, user_id, name, destination, description, category, price, duration, featured_image, gallery, is_featured, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TourismPackage {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub destination: String,
    pub description: String,
    pub category: String,
    pub category_label: Option<String>,
    pub price: Option<f64>,
    #[schema(example = "2 days, 1 night")]
    pub duration: Option<String>,
    pub featured_image: Option<String>,
    pub gallery: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TourismPackage {
    pub fn file_paths(&self) -> Vec<String> {
        self.featured_image.iter().cloned().chain(self.gallery.iter().cloned()).collect()
    }
}

impl Loggable for TourismPackage {
    fn entity_type() -> &'static str { "tourism_package" }
    fn entity_label() -> &'static str { "tourism package" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTourismPackage {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub destination: String,
    pub description: String,
    pub category: String,
    pub price: Option<f64>,
    pub duration: Option<String>,
    pub featured_image: Option<String>,
    pub gallery: String,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbTourismPackage> for TourismPackage {
    fn from(value: DbTourismPackage) -> Self {
        TourismPackage {
            category_label: catalog::label_of(catalog::TOURISM_PACKAGES.categories, &value.category).map(String::from),
            id: value.id,
            user_id: value.user_id,
            name: value.name,
            destination: value.destination,
            description: value.description,
            category: value.category,
            price: value.price,
            duration: value.duration,
            featured_image: value.featured_image,
            gallery: decode_paths(&value.gallery),
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Validate)]
struct TourismPackageForm {
    #[validate(length(min = 1, max = 255, message = "The name field is required and may not exceed 255 characters."))]
    name: String,
    #[validate(length(min = 1, max = 255, message = "The destination field is required."))]
    destination: String,
    #[validate(length(min = 1, message = "The description field is required."))]
    description: String,
    #[validate(length(max = 100, message = "The duration may not be greater than 100 characters."))]
    duration: Option<String>,
}

/// Multipart body. Files: `featured_image`, `gallery[]`; update accepts `remove_gallery[]`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TourismPackageFormSchema {
    pub name: String,
    pub destination: String,
    pub description: String,
    pub category: String,
    pub price: Option<f64>,
    pub duration: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub featured_image: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub gallery: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct TourismPackageInput {
    pub name: String,
    pub destination: String,
    pub description: String,
    pub category: String,
    pub price: Option<f64>,
    pub duration: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl TourismPackageInput {
    pub fn parse(form: &FormData) -> AppResult<Self> {
        let raw = TourismPackageForm {
            name: form.text_or_empty("name"),
            destination: form.text_or_empty("destination"),
            description: form.text_or_empty("description"),
            duration: form.text("duration"),
        };
        let mut checks = Checks::from_validator(raw.validate());

        let category = form.text("category");
        checks.one_of("category", category.as_deref(), catalog::TOURISM_PACKAGES.categories);
        let price = checks.amount("price", form.text("price").as_deref());
        checks.file_kind("featured_image", form.file("featured_image"), IMAGE_EXTENSIONS);
        checks.file_list_kind("gallery", form.file_list("gallery"), IMAGE_EXTENSIONS);
        checks.finish(form)?;

        Ok(TourismPackageInput {
            name: raw.name,
            destination: raw.destination,
            description: raw.description,
            category: category.unwrap_or_default(),
            price,
            duration: raw.duration,
            is_featured: form.flag("is_featured"),
            is_active: form.flag("is_active"),
        })
    }
}
