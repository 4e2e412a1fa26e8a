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
use crate::models::sb_member::{DbSbMember, SbMember, SbMemberFormSchema, SbMemberInput, SB_MEMBER_COLUMNS};
use crate::routes::listing::{Detail, Flash, ListParams, Listing};
use crate::routes::resource::{self, FilterParam, Resource, Toggle};
use crate::storage::FileChanges;
use crate::utils::utc_now;

const PHOTO_DIR: &str = "sb-members";

impl Resource for SbMember {
    type Row = DbSbMember;

    const TABLE: &'static str = "sb_members";
    const COLUMNS: &'static str = SB_MEMBER_COLUMNS;
    const KEY: PermissionKey = PermissionKey::SangguniangBayan;
    const PATH: &'static str = "/api/sb-members";
    const SCHEMA: CategorySchema = catalog::SB_MEMBERS;
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "committees"];
    const FILTERS: &'static [(FilterParam, &'static str)] = &[(FilterParam::Category, "position")];
    const ORDER_BY: &'static str = "display_order ASC, name ASC";

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
        .route("/", get(list_members).post(create_member))
        .route("/:id", get(get_member).post(update_member).put(update_member).delete(delete_member))
        .route("/:id/featured", patch(toggle_featured))
        .route("/:id/status", patch(toggle_status))
}

#[utoipa::path(
    get,
    path = "/api/sb-members",
    tag = "Sangguniang Bayan",
    params(ListParams),
    responses((status = 200, description = "Council members in display order"))
)]
pub async fn list_members(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<SbMember>>> {
    resource::list::<SbMember>(&state, &principal, &params).await
}

#[utoipa::path(
    get,
    path = "/api/sb-members/{id}",
    tag = "Sangguniang Bayan",
    params(("id" = i64, Path, description = "Member id")),
    responses((status = 200, description = "Member detail"), (status = 404, description = "Not found"))
)]
pub async fn get_member(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<Detail<SbMember>>> {
    resource::show::<SbMember>(&state, &principal, id).await
}

#[utoipa::path(
    post,
    path = "/api/sb-members",
    tag = "Sangguniang Bayan",
    request_body(content = SbMemberFormSchema, content_type = "multipart/form-data"),
    responses((status = 201, description = "Member created"), (status = 422, description = "Validation failed"))
)]
pub async fn create_member(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Flash<SbMember>>)> {
    state.authorize(&principal, PermissionKey::SangguniangBayan)?;

    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = SbMemberInput::parse(&form)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let photo = resource::stage_single(&mut changes, store, PHOTO_DIR, form.file("photo"), None, false).await?;

    let outcome = async {
        let now = utc_now();
        let mut tx = state.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO sb_members (user_id, name, position, committees, term_start, term_end, photo, display_order, is_featured, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal.user_id)
        .bind(&input.name)
        .bind(&input.position)
        .bind(&input.committees)
        .bind(input.term_start)
        .bind(input.term_end)
        .bind(&photo)
        .bind(input.display_order.unwrap_or(0))
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let record = resource::fetch_in::<SbMember>(&mut tx, id, false).await?;
        events::record(&mut tx, Activity::new("created", principal.user_id, &record).with_context(&request)).await?;
        tx.commit().await?;
        Ok::<_, AppError>(record)
    }
    .await;

    let record = changes.settle(store, outcome).await?;
    Ok((StatusCode::CREATED, Json(Flash::new("Council member added successfully.", record))))
}

#[utoipa::path(
    put,
    path = "/api/sb-members/{id}",
    tag = "Sangguniang Bayan",
    params(("id" = i64, Path, description = "Member id")),
    request_body(content = SbMemberFormSchema, content_type = "multipart/form-data"),
    responses((status = 200, description = "Member updated"), (status = 422, description = "Validation failed"))
)]
pub async fn update_member(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<Flash<SbMember>>> {
    state.authorize(&principal, PermissionKey::SangguniangBayan)?;

    let existing = resource::fetch::<SbMember>(&state.pool, id).await?;
    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = SbMemberInput::parse(&form)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let photo = resource::stage_single(
        &mut changes,
        store,
        PHOTO_DIR,
        form.file("photo"),
        existing.photo.as_deref(),
        form.flag("remove_photo").unwrap_or(false),
    )
    .await?;

    let outcome = async {
        let mut tx = state.pool.begin().await?;

        sqlx::query(
            "UPDATE sb_members SET name = ?, position = ?, committees = ?, term_start = ?, term_end = ?, photo = ?, display_order = ?, is_featured = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.position)
        .bind(&input.committees)
        .bind(input.term_start)
        .bind(input.term_end)
        .bind(&photo)
        .bind(input.display_order.unwrap_or(existing.display_order))
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let record = resource::fetch_in::<SbMember>(&mut tx, id, false).await?;
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
    Ok(Json(Flash::new("Council member updated successfully.", record)))
}

#[utoipa::path(
    delete,
    path = "/api/sb-members/{id}",
    tag = "Sangguniang Bayan",
    params(("id" = i64, Path, description = "Member id")),
    responses((status = 200, description = "Member and photo deleted"))
)]
pub async fn delete_member(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<SbMember>>> {
    let request = RequestContext::from_headers(&headers);
    resource::destroy::<SbMember>(&state, &principal, id, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/sb-members/{id}/featured",
    tag = "Sangguniang Bayan",
    params(("id" = i64, Path, description = "Member id")),
    responses((status = 200, description = "Featured flag flipped"))
)]
pub async fn toggle_featured(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<SbMember>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<SbMember>(&state, &principal, id, Toggle::Featured, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/sb-members/{id}/status",
    tag = "Sangguniang Bayan",
    params(("id" = i64, Path, description = "Member id")),
    responses((status = 200, description = "Active flag flipped"))
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<SbMember>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<SbMember>(&state, &principal, id, Toggle::Active, &request).await
}
