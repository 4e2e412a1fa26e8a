//! Soft-deleted news. Open to holders of `trash` or `news`.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, patch};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal};
use crate::context::ViewContext;
use crate::errors::{AppError, AppResult};
use crate::events::{self, Activity, RequestContext};
use crate::models::news::{DbNews, News, NEWS_COLUMNS};
use crate::pagination::Page;
use crate::routes::listing::{Flash, ListParams, ListSpec, Listing};
use crate::routes::resource::{self, Resource};
use crate::storage::release;
use crate::utils::utc_now;

const PATH: &str = "/api/trash";
const GATE: [PermissionKey; 2] = [PermissionKey::Trash, PermissionKey::News];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trash))
        .route("/:id/restore", patch(restore_news).post(restore_news))
        .route("/:id", delete(force_delete_news))
}

async fn fetch_trashed(state: &AppState, id: i64) -> AppResult<(sqlx::Transaction<'static, sqlx::Sqlite>, News)> {
    let mut tx = state.pool.begin().await?;
    let news = resource::fetch_in::<News>(&mut tx, id, true).await?;
    if news.deleted_at.is_none() {
        return Err(AppError::not_found("News not found in trash"));
    }
    Ok((tx, news))
}

#[utoipa::path(
    get,
    path = "/api/trash",
    tag = "Trash",
    params(ListParams),
    responses((status = 200, description = "Soft-deleted news, most recently deleted first"))
)]
pub async fn list_trash(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<News>>> {
    state.authorize_any(&principal, &GATE)?;

    let request = params.page_request();
    let spec = ListSpec::new(News::TABLE, NEWS_COLUMNS, "deleted_at DESC, id DESC")
        .condition("deleted_at IS NOT NULL")
        .search(News::SEARCH_COLUMNS, params.search.as_deref())
        .equals("category", "category", params.category.as_deref());

    let (rows, total) = spec.fetch::<DbNews>(&state.pool, request).await?;
    let items: Vec<News> = rows.into_iter().map(News::from).collect();

    Ok(Json(Listing {
        page: Page::new(items, request, total, PATH, spec.applied()),
        filters: spec.applied_map(),
        options: Some(News::options()),
        context: ViewContext::build(&state, &principal).await,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/trash/{id}/restore",
    tag = "Trash",
    params(("id" = i64, Path, description = "News id")),
    responses((status = 200, description = "News restored"), (status = 404, description = "Not in trash"))
)]
pub async fn restore_news(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<News>>> {
    state.authorize_any(&principal, &GATE)?;
    let request = RequestContext::from_headers(&headers);

    let (mut tx, trashed) = fetch_trashed(&state, id).await?;
    sqlx::query("UPDATE news SET deleted_at = NULL, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let restored = resource::fetch_in::<News>(&mut tx, id, false).await?;
    events::record(
        &mut tx,
        Activity::new("restored", principal.user_id, &restored)
            .with_old(&trashed)
            .with_context(&request),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(Flash::new("News restored successfully.", restored)))
}

#[utoipa::path(
    delete,
    path = "/api/trash/{id}",
    tag = "Trash",
    params(("id" = i64, Path, description = "News id")),
    responses((status = 200, description = "News and its files permanently deleted"))
)]
pub async fn force_delete_news(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<News>>> {
    state.authorize_any(&principal, &GATE)?;
    let request = RequestContext::from_headers(&headers);

    let (mut tx, trashed) = fetch_trashed(&state, id).await?;
    sqlx::query("DELETE FROM news WHERE id = ?").bind(id).execute(&mut *tx).await?;
    events::record(&mut tx, Activity::new("force_deleted", principal.user_id, &trashed).with_context(&request)).await?;
    tx.commit().await?;

    release(state.storage(), trashed.file_paths()).await;

    Ok(Json(Flash::new("News permanently deleted.", trashed)))
}
