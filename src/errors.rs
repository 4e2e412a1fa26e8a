use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

/// Field name -> messages, ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct ValidationFailure {
    pub errors: FieldErrors,
    /// The submitted text fields, echoed back so the form can be refilled.
    pub old_input: BTreeMap<String, String>,
}

impl ValidationFailure {
    pub fn new(errors: FieldErrors, old_input: BTreeMap<String, String>) -> Self {
        Self { errors, old_input }
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self {
            errors,
            old_input: BTreeMap::new(),
        }
    }

    pub fn with_old_input(mut self, old_input: BTreeMap<String, String>) -> Self {
        self.old_input = old_input;
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("the given data was invalid")]
    Validation(ValidationFailure),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn validation(failure: ValidationFailure) -> Self {
        Self::Validation(failure)
    }

    /// Shorthand for a single field error with no input echo.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationFailure::single(field, message))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Storage(_) => "storage",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_input: Option<BTreeMap<String, String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let error = self.code().to_string();

        match &self {
            AppError::Database(err) => tracing::error!(error = %err, "database error"),
            AppError::Storage(msg) | AppError::Internal(msg) | AppError::Configuration(msg) => {
                tracing::error!(error = %msg, "request failed")
            }
            _ => {}
        }

        let (errors, old_input) = match self {
            AppError::Validation(failure) => (Some(failure.errors), Some(failure.old_input)),
            _ => (None, None),
        };

        let payload = ErrorResponse {
            error,
            message,
            errors,
            old_input,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(value: validator::ValidationErrors) -> Self {
        let mut errors = FieldErrors::new();
        merge_validation_errors(&mut errors, &value);
        Self::Validation(ValidationFailure::new(errors, BTreeMap::new()))
    }
}

/// Flattens `validator` output into the field map used in responses.
pub fn merge_validation_errors(target: &mut FieldErrors, source: &validator::ValidationErrors) {
    for (field, errs) in source.field_errors() {
        let field = field.to_string();
        let entry = target.entry(field.clone()).or_default();
        for err in errs.iter() {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("The {} field is invalid.", field.replace('_', " ")));
            entry.push(message);
        }
    }
}
