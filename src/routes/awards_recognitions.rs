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
use crate::models::awards_recognition::{
    AwardsRecognition, AwardsRecognitionFormSchema, AwardsRecognitionInput, DbAwardsRecognition,
    AWARDS_RECOGNITION_COLUMNS,
};
use crate::routes::listing::{Detail, Flash, ListParams, Listing};
use crate::routes::resource::{self, FilterParam, Resource, Toggle};
use crate::storage::FileChanges;
use crate::utils::utc_now;

const IMAGE_DIR: &str = "awards";

impl Resource for AwardsRecognition {
    type Row = DbAwardsRecognition;

    const TABLE: &'static str = "awards_recognitions";
    const COLUMNS: &'static str = AWARDS_RECOGNITION_COLUMNS;
    const KEY: PermissionKey = PermissionKey::AwardsRecognitions;
    const PATH: &'static str = "/api/awards-recognitions";
    const SCHEMA: CategorySchema = catalog::AWARDS_RECOGNITIONS;
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "awarding_body", "description"];
    const FILTERS: &'static [(FilterParam, &'static str)] = &[(FilterParam::Category, "category")];
    const ORDER_BY: &'static str = "year DESC, id DESC";

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
        .route("/", get(list_awards).post(create_award))
        .route("/:id", get(get_award).post(update_award).put(update_award).delete(delete_award))
        .route("/:id/featured", patch(toggle_featured))
        .route("/:id/status", patch(toggle_status))
}

#[utoipa::path(
    get,
    path = "/api/awards-recognitions",
    tag = "Awards & Recognitions",
    params(ListParams),
    responses((status = 200, description = "Paginated awards"))
)]
pub async fn list_awards(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<AwardsRecognition>>> {
    resource::list::<AwardsRecognition>(&state, &principal, &params).await
}

#[utoipa::path(
    get,
    path = "/api/awards-recognitions/{id}",
    tag = "Awards & Recognitions",
    params(("id" = i64, Path, description = "Award id")),
    responses((status = 200, description = "Award detail"), (status = 404, description = "Not found"))
)]
pub async fn get_award(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<Detail<AwardsRecognition>>> {
    resource::show::<AwardsRecognition>(&state, &principal, id).await
}

#[utoipa::path(
    post,
    path = "/api/awards-recognitions",
    tag = "Awards & Recognitions",
    request_body(content = AwardsRecognitionFormSchema, content_type = "multipart/form-data"),
    responses((status = 201, description = "Award created"), (status = 422, description = "Validation failed"))
)]
pub async fn create_award(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Flash<AwardsRecognition>>)> {
    state.authorize(&principal, PermissionKey::AwardsRecognitions)?;

    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = AwardsRecognitionInput::parse(&form)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let image = resource::stage_single(&mut changes, store, IMAGE_DIR, form.file("image"), None, false).await?;

    let outcome = async {
        let now = utc_now();
        let mut tx = state.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO awards_recognitions (user_id, title, awarding_body, category, year, description, image, is_featured, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal.user_id)
        .bind(&input.title)
        .bind(&input.awarding_body)
        .bind(&input.category)
        .bind(input.year)
        .bind(&input.description)
        .bind(&image)
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let record = resource::fetch_in::<AwardsRecognition>(&mut tx, id, false).await?;
        events::record(&mut tx, Activity::new("created", principal.user_id, &record).with_context(&request)).await?;
        tx.commit().await?;
        Ok::<_, AppError>(record)
    }
    .await;

    let record = changes.settle(store, outcome).await?;
    Ok((StatusCode::CREATED, Json(Flash::new("Award created successfully.", record))))
}

#[utoipa::path(
    put,
    path = "/api/awards-recognitions/{id}",
    tag = "Awards & Recognitions",
    params(("id" = i64, Path, description = "Award id")),
    request_body(content = AwardsRecognitionFormSchema, content_type = "multipart/form-data"),
    responses((status = 200, description = "Award updated"), (status = 422, description = "Validation failed"))
)]
pub async fn update_award(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<Flash<AwardsRecognition>>> {
    state.authorize(&principal, PermissionKey::AwardsRecognitions)?;

    let existing = resource::fetch::<AwardsRecognition>(&state.pool, id).await?;
    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = AwardsRecognitionInput::parse(&form)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let image = resource::stage_single(
        &mut changes,
        store,
        IMAGE_DIR,
        form.file("image"),
        existing.image.as_deref(),
        form.flag("remove_image").unwrap_or(false),
    )
    .await?;

    let outcome = async {
        let mut tx = state.pool.begin().await?;

        sqlx::query(
            "UPDATE awards_recognitions SET title = ?, awarding_body = ?, category = ?, year = ?, description = ?, image = ?, is_featured = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.awarding_body)
        .bind(&input.category)
        .bind(input.year)
        .bind(&input.description)
        .bind(&image)
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let record = resource::fetch_in::<AwardsRecognition>(&mut tx, id, false).await?;
        events::record(
            &mut tx,
            Activity::new("updated", principal.user_id, &record)
                .with_old(&existing)
                .with_context(&request),
        )
        .await?;
        tx.commit().await?;
        Ok::<_, AppError>(record)
    }
    .await;

    let record = changes.settle(store, outcome).await?;
    Ok(Json(Flash::new("Award updated successfully.", record)))
}

#[utoipa::path(
    delete,
    path = "/api/awards-recognitions/{id}",
    tag = "Awards & Recognitions",
    params(("id" = i64, Path, description = "Award id")),
    responses((status = 200, description = "Award and its image deleted"))
)]
pub async fn delete_award(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<AwardsRecognition>>> {
    let request = RequestContext::from_headers(&headers);
    resource::destroy::<AwardsRecognition>(&state, &principal, id, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/awards-recognitions/{id}/featured",
    tag = "Awards & Recognitions",
    params(("id" = i64, Path, description = "Award id")),
    responses((status = 200, description = "Featured flag flipped"))
)]
pub async fn toggle_featured(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<AwardsRecognition>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<AwardsRecognition>(&state, &principal, id, Toggle::Featured, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/awards-recognitions/{id}/status",
    tag = "Awards & Recognitions",
    params(("id" = i64, Path, description = "Award id")),
    responses((status = 200, description = "Active flag flipped"))
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<AwardsRecognition>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<AwardsRecognition>(&state, &principal, id, Toggle::Active, &request).await
}
