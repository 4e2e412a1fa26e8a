use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch};
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal};
use crate::catalog::{self, CategorySchema};
use crate::errors::{AppError, AppResult};
use crate::events::{self, Activity, RequestContext};
use crate::forms::FormData;
use crate::models::ordinance_resolution::{
    DbOrdinanceResolution, OrdinanceResolution, OrdinanceResolutionFormSchema, OrdinanceResolutionInput,
    ORDINANCE_RESOLUTION_COLUMNS,
};
use crate::routes::listing::{Detail, Flash, ListParams, Listing};
use crate::routes::resource::{self, FilterParam, Resource, Toggle};
use crate::storage::FileChanges;
use crate::utils::utc_now;

const DOCUMENT_DIR: &str = "ordinances";

impl Resource for OrdinanceResolution {
    type Row = DbOrdinanceResolution;

    const TABLE: &'static str = "ordinance_resolutions";
    const COLUMNS: &'static str = ORDINANCE_RESOLUTION_COLUMNS;
    const KEY: PermissionKey = PermissionKey::OrdinanceResolutions;
    const PATH: &'static str = "/api/ordinance-resolutions";
    const SCHEMA: CategorySchema = catalog::ORDINANCE_RESOLUTIONS;
    const SEARCH_COLUMNS: &'static [&'static str] = &["number", "title", "author", "summary"];
    const FILTERS: &'static [(FilterParam, &'static str)] =
        &[(FilterParam::Type, "kind"), (FilterParam::Status, "status")];
    const ORDER_BY: &'static str = "COALESCE(date_enacted, created_at) DESC, id DESC";

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
        .route("/", get(list_ordinances).post(create_ordinance))
        .route(
            "/:id",
            get(get_ordinance)
                .post(update_ordinance)
                .put(update_ordinance)
                .delete(delete_ordinance),
        )
        .route("/:id/featured", patch(toggle_featured))
        .route("/:id/status", patch(toggle_status))
}

/// Numbers are unique per kind: ordinance 2025-01 and resolution 2025-01 may coexist.
fn number_taken(form: &FormData, kind: &str) -> AppError {
    resource::taken(form, "number", &format!("This {} number has already been taken.", kind))
}

async fn ensure_number_available(
    pool: &SqlitePool,
    form: &FormData,
    kind: &str,
    number: &str,
    except_id: i64,
) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM ordinance_resolutions WHERE kind = ? AND number = ? AND id <> ?")
            .bind(kind)
            .bind(number)
            .bind(except_id)
            .fetch_one(pool)
            .await?;

    if count > 0 {
        return Err(number_taken(form, kind));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/ordinance-resolutions",
    tag = "Ordinances & Resolutions",
    params(ListParams),
    responses((status = 200, description = "Paginated ordinances and resolutions"))
)]
pub async fn list_ordinances(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<OrdinanceResolution>>> {
    resource::list::<OrdinanceResolution>(&state, &principal, &params).await
}

#[utoipa::path(
    get,
    path = "/api/ordinance-resolutions/{id}",
    tag = "Ordinances & Resolutions",
    params(("id" = i64, Path, description = "Ordinance/resolution id")),
    responses((status = 200, description = "Detail"), (status = 404, description = "Not found"))
)]
pub async fn get_ordinance(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<Detail<OrdinanceResolution>>> {
    resource::show::<OrdinanceResolution>(&state, &principal, id).await
}

#[utoipa::path(
    post,
    path = "/api/ordinance-resolutions",
    tag = "Ordinances & Resolutions",
    request_body(content = OrdinanceResolutionFormSchema, content_type = "multipart/form-data"),
    responses((status = 201, description = "Created"), (status = 422, description = "Validation failed"))
)]
pub async fn create_ordinance(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Flash<OrdinanceResolution>>)> {
    state.authorize(&principal, PermissionKey::OrdinanceResolutions)?;

    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = OrdinanceResolutionInput::parse(&form)?;
    ensure_number_available(&state.pool, &form, &input.kind, &input.number, 0).await?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let document = resource::stage_single(&mut changes, store, DOCUMENT_DIR, form.file("document"), None, false).await?;

    let outcome = async {
        let now = utc_now();
        let mut tx = state.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO ordinance_resolutions (user_id, kind, number, title, status, date_enacted, author, summary, document, is_featured, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal.user_id)
        .bind(&input.kind)
        .bind(&input.number)
        .bind(&input.title)
        .bind(&input.status)
        .bind(input.date_enacted)
        .bind(&input.author)
        .bind(&input.summary)
        .bind(&document)
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| resource::on_unique_violation(e, || number_taken(&form, &input.kind)))?
        .last_insert_rowid();

        let record = resource::fetch_in::<OrdinanceResolution>(&mut tx, id, false).await?;
        events::record(&mut tx, Activity::new("created", principal.user_id, &record).with_context(&request)).await?;
        tx.commit().await?;
        Ok::<_, AppError>(record)
    }
    .await;

    let record = changes.settle(store, outcome).await?;
    let message = format!("{} {} created successfully.", kind_label(&record.kind), record.number);
    Ok((StatusCode::CREATED, Json(Flash::new(message, record))))
}

#[utoipa::path(
    put,
    path = "/api/ordinance-resolutions/{id}",
    tag = "Ordinances & Resolutions",
    params(("id" = i64, Path, description = "Ordinance/resolution id")),
    request_body(content = OrdinanceResolutionFormSchema, content_type = "multipart/form-data"),
    responses((status = 200, description = "Updated"), (status = 422, description = "Validation failed"))
)]
pub async fn update_ordinance(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<Flash<OrdinanceResolution>>> {
    state.authorize(&principal, PermissionKey::OrdinanceResolutions)?;

    let existing = resource::fetch::<OrdinanceResolution>(&state.pool, id).await?;
    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = OrdinanceResolutionInput::parse(&form)?;
    ensure_number_available(&state.pool, &form, &input.kind, &input.number, id).await?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let document = resource::stage_single(
        &mut changes,
        store,
        DOCUMENT_DIR,
        form.file("document"),
        existing.document.as_deref(),
        form.flag("remove_document").unwrap_or(false),
    )
    .await?;

    let outcome = async {
        let mut tx = state.pool.begin().await?;

        sqlx::query(
            "UPDATE ordinance_resolutions SET kind = ?, number = ?, title = ?, status = ?, date_enacted = ?, author = ?, summary = ?, document = ?, is_featured = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&input.kind)
        .bind(&input.number)
        .bind(&input.title)
        .bind(&input.status)
        .bind(input.date_enacted)
        .bind(&input.author)
        .bind(&input.summary)
        .bind(&document)
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| resource::on_unique_violation(e, || number_taken(&form, &input.kind)))?;

        let record = resource::fetch_in::<OrdinanceResolution>(&mut tx, id, false).await?;
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
    if record.status != existing.status {
        tracing::info!(id = record.id, from = %existing.status, to = %record.status, "ordinance status changed");
    }
    let message = format!("{} {} updated successfully.", kind_label(&record.kind), record.number);
    Ok(Json(Flash::new(message, record)))
}

#[utoipa::path(
    delete,
    path = "/api/ordinance-resolutions/{id}",
    tag = "Ordinances & Resolutions",
    params(("id" = i64, Path, description = "Ordinance/resolution id")),
    responses((status = 200, description = "Deleted with its document"))
)]
pub async fn delete_ordinance(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<OrdinanceResolution>>> {
    let request = RequestContext::from_headers(&headers);
    resource::destroy::<OrdinanceResolution>(&state, &principal, id, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/ordinance-resolutions/{id}/featured",
    tag = "Ordinances & Resolutions",
    params(("id" = i64, Path, description = "Ordinance/resolution id")),
    responses((status = 200, description = "Featured flag flipped"))
)]
pub async fn toggle_featured(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<OrdinanceResolution>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<OrdinanceResolution>(&state, &principal, id, Toggle::Featured, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/ordinance-resolutions/{id}/status",
    tag = "Ordinances & Resolutions",
    params(("id" = i64, Path, description = "Ordinance/resolution id")),
    responses((status = 200, description = "Active flag flipped"))
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<OrdinanceResolution>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<OrdinanceResolution>(&state, &principal, id, Toggle::Active, &request).await
}

fn kind_label(kind: &str) -> &'static str {
    catalog::label_of(catalog::ORDINANCE_RESOLUTIONS.types, kind).unwrap_or("Record")
}
