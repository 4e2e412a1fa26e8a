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
use crate::models::full_disclosure::{
    DbFullDisclosure, FullDisclosure, FullDisclosureFormSchema, FullDisclosureInput, FULL_DISCLOSURE_COLUMNS,
};
use crate::routes::listing::{Detail, Flash, ListParams, Listing};
use crate::routes::resource::{self, FilterParam, Resource, Toggle};
use crate::storage::FileChanges;
use crate::utils::utc_now;

const DOCUMENT_DIR: &str = "disclosures";

impl Resource for FullDisclosure {
    type Row = DbFullDisclosure;

    const TABLE: &'static str = "full_disclosures";
    const COLUMNS: &'static str = FULL_DISCLOSURE_COLUMNS;
    const KEY: PermissionKey = PermissionKey::FullDisclosures;
    const PATH: &'static str = "/api/full-disclosures";
    const SCHEMA: CategorySchema = catalog::FULL_DISCLOSURES;
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "description"];
    const FILTERS: &'static [(FilterParam, &'static str)] = &[(FilterParam::Type, "document_type")];
    const ORDER_BY: &'static str = "fiscal_year DESC, quarter DESC, id DESC";

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
        .route("/", get(list_disclosures).post(create_disclosure))
        .route(
            "/:id",
            get(get_disclosure)
                .post(update_disclosure)
                .put(update_disclosure)
                .delete(delete_disclosure),
        )
        .route("/:id/featured", patch(toggle_featured))
        .route("/:id/status", patch(toggle_status))
}

#[utoipa::path(
    get,
    path = "/api/full-disclosures",
    tag = "Full Disclosure",
    params(ListParams),
    responses((status = 200, description = "Paginated disclosure documents"))
)]
pub async fn list_disclosures(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<FullDisclosure>>> {
    resource::list::<FullDisclosure>(&state, &principal, &params).await
}

#[utoipa::path(
    get,
    path = "/api/full-disclosures/{id}",
    tag = "Full Disclosure",
    params(("id" = i64, Path, description = "Document id")),
    responses((status = 200, description = "Document detail"), (status = 404, description = "Not found"))
)]
pub async fn get_disclosure(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<Detail<FullDisclosure>>> {
    resource::show::<FullDisclosure>(&state, &principal, id).await
}

#[utoipa::path(
    post,
    path = "/api/full-disclosures",
    tag = "Full Disclosure",
    request_body(content = FullDisclosureFormSchema, content_type = "multipart/form-data"),
    responses((status = 201, description = "Document created"), (status = 422, description = "Validation failed"))
)]
pub async fn create_disclosure(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Flash<FullDisclosure>>)> {
    state.authorize(&principal, PermissionKey::FullDisclosures)?;

    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = FullDisclosureInput::parse(&form, true)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let file_path = resource::stage_single(&mut changes, store, DOCUMENT_DIR, form.file("file"), None, false)
        .await?
        .ok_or_else(|| AppError::invalid_field("file", "The file field is required."))?;

    let outcome = async {
        let now = utc_now();
        let mut tx = state.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO full_disclosures (user_id, title, document_type, fiscal_year, quarter, description, file_path, is_featured, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal.user_id)
        .bind(&input.title)
        .bind(&input.document_type)
        .bind(input.fiscal_year)
        .bind(&input.quarter)
        .bind(&input.description)
        .bind(&file_path)
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let record = resource::fetch_in::<FullDisclosure>(&mut tx, id, false).await?;
        events::record(&mut tx, Activity::new("created", principal.user_id, &record).with_context(&request)).await?;
        tx.commit().await?;
        Ok::<_, AppError>(record)
    }
    .await;

    let record = changes.settle(store, outcome).await?;
    Ok((StatusCode::CREATED, Json(Flash::new("Disclosure document created successfully.", record))))
}

#[utoipa::path(
    put,
    path = "/api/full-disclosures/{id}",
    tag = "Full Disclosure",
    params(("id" = i64, Path, description = "Document id")),
    request_body(content = FullDisclosureFormSchema, content_type = "multipart/form-data"),
    responses((status = 200, description = "Document updated"), (status = 422, description = "Validation failed"))
)]
pub async fn update_disclosure(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<Flash<FullDisclosure>>> {
    state.authorize(&principal, PermissionKey::FullDisclosures)?;

    let existing = resource::fetch::<FullDisclosure>(&state.pool, id).await?;
    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = FullDisclosureInput::parse(&form, false)?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let file_path = resource::stage_single(
        &mut changes,
        store,
        DOCUMENT_DIR,
        form.file("file"),
        Some(existing.file_path.as_str()),
        false,
    )
    .await?
    .unwrap_or_else(|| existing.file_path.clone());

    let outcome = async {
        let mut tx = state.pool.begin().await?;

        sqlx::query(
            "UPDATE full_disclosures SET title = ?, document_type = ?, fiscal_year = ?, quarter = ?, description = ?, file_path = ?, is_featured = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.document_type)
        .bind(input.fiscal_year)
        .bind(&input.quarter)
        .bind(&input.description)
        .bind(&file_path)
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let record = resource::fetch_in::<FullDisclosure>(&mut tx, id, false).await?;
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
    Ok(Json(Flash::new("Disclosure document updated successfully.", record)))
}

#[utoipa::path(
    delete,
    path = "/api/full-disclosures/{id}",
    tag = "Full Disclosure",
    params(("id" = i64, Path, description = "Document id")),
    responses((status = 200, description = "Document and its file deleted"))
)]
pub async fn delete_disclosure(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<FullDisclosure>>> {
    let request = RequestContext::from_headers(&headers);
    resource::destroy::<FullDisclosure>(&state, &principal, id, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/full-disclosures/{id}/featured",
    tag = "Full Disclosure",
    params(("id" = i64, Path, description = "Document id")),
    responses((status = 200, description = "Featured flag flipped"))
)]
pub async fn toggle_featured(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<FullDisclosure>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<FullDisclosure>(&state, &principal, id, Toggle::Featured, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/full-disclosures/{id}/status",
    tag = "Full Disclosure",
    params(("id" = i64, Path, description = "Document id")),
    responses((status = 200, description = "Active flag flipped"))
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<FullDisclosure>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<FullDisclosure>(&state, &principal, id, Toggle::Active, &request).await
}
