use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal};
use crate::catalog::{self, CategorySchema};
use crate::errors::{AppError, AppResult};
use crate::events::{self, Activity, RequestContext};
use crate::forms::FormData;
use crate::models::news::{DbNews, News, NewsFormSchema, NewsInput, NEWS_COLUMNS};
use crate::routes::listing::{Detail, Flash, ListParams, Listing};
use crate::routes::resource::{self, FilterParam, Resource, Toggle};
use crate::storage::FileChanges;
use crate::utils::utc_now;

const IMAGE_DIR: &str = "news";
const GALLERY_DIR: &str = "news/gallery";

impl Resource for News {
    type Row = DbNews;

    const TABLE: &'static str = "news";
    const COLUMNS: &'static str = NEWS_COLUMNS;
    const KEY: PermissionKey = PermissionKey::News;
    const PATH: &'static str = "/api/news";
    const SCHEMA: CategorySchema = catalog::NEWS;
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "excerpt", "content"];
    const FILTERS: &'static [(FilterParam, &'static str)] = &[(FilterParam::Category, "category")];
    const ORDER_BY: &'static str = "COALESCE(published_at, created_at) DESC, id DESC";
    const SOFT_DELETES: bool = true;

    fn stored_files(&self) -> Vec<String> {
        self.file_paths()
    }

    fn featured(&self) -> bool {
        self.is_featured
    }

    fn active(&self) -> bool {
        self.is_active
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_news).post(create_news))
        .route("/:id", get(get_news).post(update_news).put(update_news).delete(delete_news))
        .route("/:id/featured", patch(toggle_featured))
        .route("/:id/status", patch(toggle_status))
}

#[utoipa::path(
    get,
    path = "/api/news",
    tag = "News",
    params(ListParams),
    responses(
        (status = 200, description = "Paginated news with applied filters, options and context"),
        (status = 403, description = "Missing the news permission")
    )
)]
pub async fn list_news(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<News>>> {
    resource::list::<News>(&state, &principal, &params).await
}

#[utoipa::path(
    get,
    path = "/api/news/{id}",
    tag = "News",
    params(("id" = i64, Path, description = "News id")),
    responses((status = 200, description = "News detail"), (status = 404, description = "Not found"))
)]
pub async fn get_news(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<Detail<News>>> {
    resource::show::<News>(&state, &principal, id).await
}

#[utoipa::path(
    post,
    path = "/api/news",
    tag = "News",
    request_body(content = NewsFormSchema, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "News created"),
        (status = 403, description = "Missing the news permission"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_news(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Flash<News>>)> {
    state.authorize(&principal, PermissionKey::News)?;

    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = NewsInput::parse(&form)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let featured_image =
        resource::stage_single(&mut changes, store, IMAGE_DIR, form.file("featured_image"), None, false).await?;
    let gallery = resource::stage_list(&mut changes, store, GALLERY_DIR, form.file_list("gallery"), &[], &[]).await?;

    let outcome = async {
        let now = utc_now();
        let mut tx = state.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO news (user_id, title, excerpt, content, category, published_at, featured_image, gallery, is_featured, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal.user_id)
        .bind(&input.title)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.category)
        .bind(input.published_at)
        .bind(&featured_image)
        .bind(crate::db::encode_paths(&gallery))
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let news = resource::fetch_in::<News>(&mut tx, id, false).await?;
        events::record(&mut tx, Activity::new("created", principal.user_id, &news).with_context(&request)).await?;
        tx.commit().await?;
        Ok::<_, AppError>(news)
    }
    .await;

    let news = changes.settle(store, outcome).await?;
    tracing::info!(news_id = news.id, user_id = principal.user_id, "news created");

    Ok((StatusCode::CREATED, Json(Flash::new("News created successfully.", news))))
}

#[utoipa::path(
    put,
    path = "/api/news/{id}",
    tag = "News",
    params(("id" = i64, Path, description = "News id")),
    request_body(content = NewsFormSchema, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "News updated"),
        (status = 404, description = "Not found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_news(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<Flash<News>>> {
    state.authorize(&principal, PermissionKey::News)?;

    let existing = resource::fetch::<News>(&state.pool, id).await?;
    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = NewsInput::parse(&form)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let featured_image = resource::stage_single(
        &mut changes,
        store,
        IMAGE_DIR,
        form.file("featured_image"),
        existing.featured_image.as_deref(),
        form.flag("remove_featured_image").unwrap_or(false),
    )
    .await?;
    let gallery = resource::stage_list(
        &mut changes,
        store,
        GALLERY_DIR,
        form.file_list("gallery"),
        &existing.gallery,
        &form.texts("remove_gallery"),
    )
    .await?;

    let outcome = async {
        let mut tx = state.pool.begin().await?;

        sqlx::query(
            "UPDATE news SET title = ?, excerpt = ?, content = ?, category = ?, published_at = ?, featured_image = ?, gallery = ?, is_featured = ?, is_active = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&input.title)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.category)
        .bind(input.published_at)
        .bind(&featured_image)
        .bind(crate::db::encode_paths(&gallery))
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let news = resource::fetch_in::<News>(&mut tx, id, false).await?;
        events::record(
            &mut tx,
            Activity::new("updated", principal.user_id, &news)
                .with_old(&existing)
                .with_context(&request),
        )
        .await?;
        tx.commit().await?;
        Ok::<_, AppError>(news)
    }
    .await;

    let news = changes.settle(store, outcome).await?;
    tracing::info!(news_id = news.id, user_id = principal.user_id, "news updated");

    Ok(Json(Flash::new("News updated successfully.", news)))
}

#[utoipa::path(
    delete,
    path = "/api/news/{id}",
    tag = "News",
    params(("id" = i64, Path, description = "News id")),
    responses((status = 200, description = "News moved to trash"), (status = 404, description = "Not found"))
)]
pub async fn delete_news(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<News>>> {
    let request = RequestContext::from_headers(&headers);
    resource::destroy::<News>(&state, &principal, id, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/news/{id}/featured",
    tag = "News",
    params(("id" = i64, Path, description = "News id")),
    responses((status = 200, description = "Featured flag flipped"))
)]
pub async fn toggle_featured(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<News>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<News>(&state, &principal, id, Toggle::Featured, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/news/{id}/status",
    tag = "News",
    params(("id" = i64, Path, description = "News id")),
    responses((status = 200, description = "Active flag flipped"))
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<News>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<News>(&state, &principal, id, Toggle::Active, &request).await
}
