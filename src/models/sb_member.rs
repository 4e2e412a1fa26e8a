use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog;
use crate::errors::AppResult;
use crate::events::Loggable;
use crate::forms::{Checks, FormData, IMAGE_EXTENSIONS};

pub const SB_MEMBER_COLUMNS: &str = "id, user_id, name, position, committees, term_start, term_end, photo, display_order, is_featured, is_active, created_at, updated_at";

/// A member of the Sangguniang Bayan (municipal council).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SbMember {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[schema(example = "councilor")]
    pub position: String,
    pub position_label: Option<String>,
    pub committees: Option<String>,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub photo: Option<String>,
    pub display_order: i64,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SbMember {
    pub fn file_paths(&self) -> Vec<String> {
        self.photo.iter().cloned().collect()
    }
}

impl Loggable for SbMember {
    fn entity_type() -> &'static str { "sb_member" }
    fn entity_label() -> &'static str { "council member" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSbMember {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub position: String,
    pub committees: Option<String>,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub photo: Option<String>,
    pub display_order: i64,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbSbMember> for SbMember {
    fn from(value: DbSbMember) -> Self {
        SbMember {
            position_label: catalog::label_of(catalog::SB_MEMBERS.categories, &value.position).map(String::from),
            id: value.id,
            user_id: value.user_id,
            name: value.name,
            position: value.position,
            committees: value.committees,
            term_start: value.term_start,
            term_end: value.term_end,
            photo: value.photo,
            display_order: value.display_order,
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Validate)]
struct SbMemberForm {
    #[validate(length(min = 1, max = 255, message = "The name field is required and may not exceed 255 characters."))]
    name: String,
    #[validate(length(max = 1000, message = "The committees may not be greater than 1000 characters."))]
    committees: Option<String>,
}

/// Multipart body. File: `photo`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SbMemberFormSchema {
    pub name: String,
    pub position: String,
    pub committees: Option<String>,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub display_order: Option<i64>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SbMemberInput {
    pub name: String,
    pub position: String,
    pub committees: Option<String>,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub display_order: Option<i64>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl SbMemberInput {
    pub fn parse(form: &FormData) -> AppResult<Self> {
        let raw = SbMemberForm {
            name: form.text_or_empty("name"),
            committees: form.text("committees"),
        };
        let mut checks = Checks::from_validator(raw.validate());

        let position = form.text("position");
        checks.one_of("position", position.as_deref(), catalog::SB_MEMBERS.categories);
        let term_start = checks.date("term_start", form.text("term_start").as_deref());
        let term_end = checks.date("term_end", form.text("term_end").as_deref());
        if let (Some(start), Some(end)) = (term_start, term_end) {
            if end < start {
                checks.add("term_end", "The term end must be a date after term start.");
            }
        }
        let display_order = checks.integer("display_order", form.text("display_order").as_deref(), 0, 10_000);
        checks.file_kind("photo", form.file("photo"), IMAGE_EXTENSIONS);
        checks.finish(form)?;

        Ok(SbMemberInput {
            name: raw.name,
            position: position.unwrap_or_default(),
            committees: raw.committees,
            term_start,
            term_end,
            display_order,
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
    fn term_end_before_start_is_rejected() {
        let form = FormData::default()
            .with_text("name", "Hon. Juan dela Cruz")
            .with_text("position", "councilor")
            .with_text("term_start", "2025-06-30")
            .with_text("term_end", "2022-06-30");
        match SbMemberInput::parse(&form) {
            Err(AppError::Validation(failure)) => assert!(failure.errors.contains_key("term_end")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
