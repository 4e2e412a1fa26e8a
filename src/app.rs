use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{DefaultPolicyEvaluator, PermissionKey, PolicyEvaluator, Principal};
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::routes::{
    activity_logs, auth, awards_recognitions, bids_awards, context, files, full_disclosures, health, news,
    ordinance_resolutions, sb_members, tourism_packages, trash, users,
};
use crate::storage::{FileStore, LocalDisk, StorageConfig};

/// Multipart overhead allowed on top of the per-file limit.
const BODY_HEADROOM: usize = 1024 * 1024;

pub const FLASH_ERROR_HEADER: &str = "x-flash-error";

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub storage: Arc<dyn FileStore>,
    pub authz: Arc<dyn PolicyEvaluator>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, storage: Arc<dyn FileStore>, max_upload_bytes: usize) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            storage,
            authz: Arc::new(DefaultPolicyEvaluator::new()),
            max_upload_bytes,
        }
    }

    /// Gate check; a deny becomes `403`.
    pub fn authorize(&self, principal: &Principal, key: PermissionKey) -> AppResult<()> {
        if self.authz.can(principal, key.as_str()) {
            Ok(())
        } else {
            tracing::info!(user_id = principal.user_id, permission = %key, "access denied");
            Err(AppError::forbidden(format!(
                "You do not have permission to manage {}.",
                key.label()
            )))
        }
    }

    pub fn authorize_any(&self, principal: &Principal, keys: &[PermissionKey]) -> AppResult<()> {
        let names: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
        if self.authz.can_any(principal, &names) {
            Ok(())
        } else {
            tracing::info!(user_id = principal.user_id, permissions = ?names, "access denied");
            Err(AppError::forbidden("You do not have permission to access this section."))
        }
    }

    pub fn storage(&self) -> &dyn FileStore {
        self.storage.as_ref()
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let storage_config = StorageConfig::from_env()?;
    let disk = LocalDisk::new(&storage_config.root).await?;

    let state = AppState::new(pool, jwt_config, Arc::new(disk), storage_config.max_upload_bytes);
    Ok(create_app_with(state))
}

pub fn create_app_with(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any)
        .expose_headers([header::HeaderName::from_static(FLASH_ERROR_HEADER)]);

    let body_limit = state.max_upload_bytes.saturating_mul(8).saturating_add(BODY_HEADROOM);

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/context", get(context::show_context))
        .route("/badges", get(context::show_badges))
        .nest("/auth", auth::routes())
        .nest("/news", news::routes())
        .nest("/bids-awards", bids_awards::routes())
        .nest("/tourism-packages", tourism_packages::routes())
        .nest("/awards-recognitions", awards_recognitions::routes())
        .nest("/full-disclosures", full_disclosures::routes())
        .nest("/ordinance-resolutions", ordinance_resolutions::routes())
        .nest("/sb-members", sb_members::routes())
        .nest("/users", users::routes())
        .nest("/trash", trash::routes())
        .nest("/activity-logs", activity_logs::routes())
        .nest("/files", files::routes());

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(middleware::from_fn(redirect_forbidden_navigation))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Browser navigation that hits a denied section is sent back where it came
/// from with the reason in a flash header; API clients keep the `403`.
async fn redirect_forbidden_navigation(request: Request, next: Next) -> Response {
    let wants_html = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(prefers_html)
        .unwrap_or(false);
    let referer = request
        .headers()
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    let response = next.run(request).await;
    if !wants_html || response.status() != StatusCode::FORBIDDEN {
        return response;
    }

    let location = referer.unwrap_or_else(|| "/".to_string());
    let mut redirect = StatusCode::SEE_OTHER.into_response();
    let headers = redirect.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(header::LOCATION, value);
    } else {
        headers.insert(header::LOCATION, HeaderValue::from_static("/"));
    }
    headers.insert(
        FLASH_ERROR_HEADER,
        HeaderValue::from_static("You do not have permission to access this section."),
    );
    redirect
}

/// `text/html` listed before any JSON type.
fn prefers_html(accept: &str) -> bool {
    let html = accept.find("text/html");
    let json = accept.find("application/json");
    match (html, json) {
        (Some(h), Some(j)) => h < j,
        (Some(_), None) => true,
        _ => false,
    }
}
