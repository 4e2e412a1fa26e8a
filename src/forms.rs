//! Multipart form intake and the field checks shared by every content form.

use std::collections::BTreeMap;

use axum::extract::Multipart;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::catalog::{self, OptionSet};
use crate::errors::{merge_validation_errors, AppError, AppResult, FieldErrors, ValidationFailure};
use crate::storage::UploadedFile;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx"];

/// Text fields and files of one submitted form.
///
/// Repeated fields (`gallery[]`, `remove_gallery[]`) are collected under the
/// name without brackets.
#[derive(Debug, Default, Clone)]
pub struct FormData {
    pub fields: BTreeMap<String, Vec<String>>,
    pub files: BTreeMap<String, Vec<UploadedFile>>,
}

impl FormData {
    pub async fn from_multipart(mut multipart: Multipart, max_file_bytes: usize) -> AppResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("multipart error: {e}")))?
        {
            let name = field
                .name()
                .unwrap_or("")
                .trim_end_matches("[]")
                .to_string();
            if name.is_empty() {
                continue;
            }

            match field.file_name().map(String::from) {
                Some(file_name) => {
                    let content_type = field.content_type().map(String::from);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::bad_request(format!("read error: {e}")))?;

                    // browsers send an empty part for untouched file inputs
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    if data.len() > max_file_bytes {
                        return Err(AppError::invalid_field(
                            &name,
                            format!("The {} may not be greater than {} kilobytes.", name, max_file_bytes / 1024),
                        ));
                    }

                    form.files.entry(name).or_default().push(UploadedFile {
                        file_name,
                        content_type,
                        data,
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::bad_request(format!("read error: {e}")))?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }

        Ok(form)
    }

    /// Builder used by tests and internal callers.
    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.fields.entry(name.to_string()).or_default().push(value.to_string());
        self
    }

    pub fn with_file(mut self, name: &str, file: UploadedFile) -> Self {
        self.files.entry(name.to_string()).or_default().push(file);
        self
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|values| values.last())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Empty string when absent; for required fields that `validator` checks.
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }

    pub fn texts(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .map(|values| {
                values
                    .iter()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checkbox semantics: `1`, `true`, `on`, `yes` are true; present but
    /// anything else is false; absent is `None`.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(|values| values.last()).map(|v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes")
        })
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).and_then(|files| files.first())
    }

    pub fn file_list(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Submitted text, flattened for echoing back with validation errors.
    pub fn old_input(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|(name, _)| !name.contains("password"))
            .map(|(name, values)| (name.clone(), values.join(", ")))
            .collect()
    }
}

/// Collects field errors for one form.
#[derive(Debug, Default)]
pub struct Checks {
    errors: FieldErrors,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the collector with `validator` results.
    pub fn from_validator(result: Result<(), validator::ValidationErrors>) -> Self {
        let mut checks = Self::new();
        if let Err(errors) = result {
            merge_validation_errors(&mut checks.errors, &errors);
        }
        checks
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Value must be present and one of `set`.
    pub fn one_of(&mut self, field: &str, value: Option<&str>, set: OptionSet) {
        match value {
            None => self.add(field, format!("The {} field is required.", human(field))),
            Some(v) if !catalog::contains(set, v) => self.add(
                field,
                format!("The selected {} is invalid. Expected one of: {}.", human(field), catalog::describe(set)),
            ),
            Some(_) => {}
        }
    }

    /// Value may be absent; when present it must be one of `set`.
    pub fn optional_one_of(&mut self, field: &str, value: Option<&str>, set: OptionSet) {
        if value.is_some() {
            self.one_of(field, value, set);
        }
    }

    pub fn date(&mut self, field: &str, value: Option<&str>) -> Option<NaiveDate> {
        let value = value?;
        match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.add(field, format!("The {} is not a valid date (YYYY-MM-DD).", human(field)));
                None
            }
        }
    }

    /// Accepts RFC 3339, `YYYY-MM-DDTHH:MM` (datetime-local inputs) or a bare date.
    pub fn datetime(&mut self, field: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
        let value = value?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Some(naive.and_utc());
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
        self.add(field, format!("The {} is not a valid date.", human(field)));
        None
    }

    pub fn integer(&mut self, field: &str, value: Option<&str>, min: i64, max: i64) -> Option<i64> {
        let value = value?;
        match value.parse::<i64>() {
            Ok(n) if (min..=max).contains(&n) => Some(n),
            Ok(_) => {
                self.add(field, format!("The {} must be between {} and {}.", human(field), min, max));
                None
            }
            Err(_) => {
                self.add(field, format!("The {} must be an integer.", human(field)));
                None
            }
        }
    }

    pub fn amount(&mut self, field: &str, value: Option<&str>) -> Option<f64> {
        let value = value?;
        match value.replace(',', "").parse::<f64>() {
            Ok(n) if n >= 0.0 && n.is_finite() => Some(n),
            _ => {
                self.add(field, format!("The {} must be a number of at least 0.", human(field)));
                None
            }
        }
    }

    pub fn file_kind(&mut self, field: &str, file: Option<&UploadedFile>, allowed: &[&str]) {
        if let Some(file) = file {
            self.file_list_kind(field, std::slice::from_ref(file), allowed);
        }
    }

    pub fn file_list_kind(&mut self, field: &str, files: &[UploadedFile], allowed: &[&str]) {
        for file in files {
            let ok = file
                .extension()
                .map(|ext| allowed.contains(&ext.as_str()))
                .unwrap_or(false);
            if !ok {
                self.add(
                    field,
                    format!("The {} must be a file of type: {}.", human(field), allowed.join(", ")),
                );
                return;
            }
        }
    }

    /// Turns collected errors into a validation failure echoing `form`.
    pub fn finish(self, form: &FormData) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(ValidationFailure::new(self.errors, form.old_input())))
        }
    }
}

fn human(field: &str) -> String {
    field.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: None,
            data: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn text_is_trimmed_and_blank_is_absent() {
        let form = FormData::default().with_text("title", "  Hello ").with_text("excerpt", "   ");
        assert_eq!(form.text("title").as_deref(), Some("Hello"));
        assert_eq!(form.text("excerpt"), None);
        assert_eq!(form.text("missing"), None);
    }

    #[test]
    fn flags_follow_checkbox_conventions() {
        let form = FormData::default()
            .with_text("a", "1")
            .with_text("b", "on")
            .with_text("c", "0");
        assert_eq!(form.flag("a"), Some(true));
        assert_eq!(form.flag("b"), Some(true));
        assert_eq!(form.flag("c"), Some(false));
        assert_eq!(form.flag("d"), None);
    }

    #[test]
    fn files_are_checked_by_extension() {
        let form = FormData::default()
            .with_file("gallery", file("a.JPG"))
            .with_file("gallery", file("b.txt"));
        let mut checks = Checks::new();
        checks.file_list_kind("gallery", form.file_list("gallery"), IMAGE_EXTENSIONS);
        assert!(checks.has_error("gallery"));
        assert_eq!(form.file("gallery").map(|f| f.file_name.as_str()), Some("a.JPG"));
        assert!(form.file("featured_image").is_none());
    }

    #[test]
    fn old_input_hides_passwords() {
        let form = FormData::default().with_text("title", "x").with_text("password", "secret");
        let old = form.old_input();
        assert_eq!(old.get("title").map(String::as_str), Some("x"));
        assert!(!old.contains_key("password"));
    }

    #[test]
    fn checks_collect_messages() {
        let mut checks = Checks::new();
        checks.one_of("category", Some("weather"), catalog::NEWS.categories);
        checks.one_of("status", None, catalog::BIDS_AWARDS.statuses);
        assert_eq!(checks.date("opening_date", Some("2024-02-30")), None);
        assert_eq!(checks.integer("year", Some("1800"), 1900, 2100), None);
        checks.file_kind("featured_image", Some(&file("virus.exe")), IMAGE_EXTENSIONS);

        for field in ["category", "status", "opening_date", "year", "featured_image"] {
            assert!(checks.has_error(field), "missing error for {field}");
        }

        let form = FormData::default().with_text("title", "kept");
        match checks.finish(&form) {
            Err(AppError::Validation(failure)) => {
                assert_eq!(failure.old_input.get("title").map(String::as_str), Some("kept"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn datetime_accepts_local_input_format() {
        let mut checks = Checks::new();
        assert!(checks.datetime("published_at", Some("2025-03-01T08:30")).is_some());
        assert!(checks.datetime("published_at", Some("2025-03-01T08:30:00+08:00")).is_some());
        assert!(checks.datetime("published_at", Some("2025-03-01")).is_some());
        assert!(!checks.has_errors());
    }
}
