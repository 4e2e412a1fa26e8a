use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal};
use crate::context::ViewContext;
use crate::errors::{AppError, AppResult};
use crate::models::activity_log::{ActivityLog, DbActivityLog, ACTIVITY_LOG_COLUMNS};
use crate::pagination::{Page, PageRequest};
use crate::routes::listing::{ListSpec, Listing};

const PATH: &str = "/api/activity-logs";
const FROM: &str = "activity_logs a LEFT JOIN users u ON u.id = a.actor_id";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityLogParams {
    /// Full event name, e.g. `news.created`.
    pub event: Option<String>,
    pub actor_id: Option<String>,
    /// Entity type, e.g. `bids_award`.
    pub subject_type: Option<String>,
    pub severity: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activity_logs))
        .route("/:id", get(get_activity_log))
}

#[utoipa::path(
    get,
    path = "/api/activity-logs",
    tag = "Activity Logs",
    params(ActivityLogParams),
    responses((status = 200, description = "Newest entries first"), (status = 403, description = "Forbidden"))
)]
pub async fn list_activity_logs(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ActivityLogParams>,
) -> AppResult<Json<Listing<ActivityLog>>> {
    state.authorize(&principal, PermissionKey::ActivityLogs)?;

    let request = PageRequest::new(params.page, params.per_page);
    let spec = ListSpec::new(FROM, ACTIVITY_LOG_COLUMNS, "a.id DESC")
        .equals("event", "a.event_name", params.event.as_deref())
        .equals("actor_id", "a.actor_id", params.actor_id.as_deref())
        .equals("subject_type", "a.subject_type", params.subject_type.as_deref())
        .equals("severity", "a.severity", params.severity.as_deref());

    let (rows, total) = spec.fetch::<DbActivityLog>(&state.pool, request).await?;
    let items: Vec<ActivityLog> = rows.into_iter().map(ActivityLog::from).collect();

    Ok(Json(Listing {
        page: Page::new(items, request, total, PATH, spec.applied()),
        filters: spec.applied_map(),
        options: None,
        context: ViewContext::build(&state, &principal).await,
    }))
}

#[utoipa::path(
    get,
    path = "/api/activity-logs/{id}",
    tag = "Activity Logs",
    params(("id" = i64, Path, description = "Entry id")),
    responses((status = 200, description = "One entry", body = ActivityLog), (status = 404, description = "Not found"))
)]
pub async fn get_activity_log(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<ActivityLog>> {
    state.authorize(&principal, PermissionKey::ActivityLogs)?;

    let row = sqlx::query_as::<_, DbActivityLog>(&format!("SELECT {ACTIVITY_LOG_COLUMNS} FROM {FROM} WHERE a.id = ?"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Activity log entry not found"))?;

    Ok(Json(row.into()))
}
