use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;

pub fn routes() -> Router<AppState> {
    Router::new().route("/*path", get(serve_file))
}

/// Streams a stored upload back to a signed-in user.
#[utoipa::path(
    get,
    path = "/api/files/{path}",
    tag = "Files",
    params(("path" = String, Path, description = "Stored path, e.g. news/3f2a9c.jpg")),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Path escapes the storage root"),
        (status = 404, description = "No such file")
    )
)]
pub async fn serve_file(
    State(state): State<AppState>,
    principal: Principal,
    Path(path): Path<String>,
) -> AppResult<Response> {
    let bytes = state.storage().read(&path).await?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    tracing::debug!(user_id = principal.user_id, path = %path, "serving stored file");

    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
