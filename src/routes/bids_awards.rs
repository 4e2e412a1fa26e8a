use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch};
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal};
use crate::catalog::{self, CategorySchema};
use crate::db::encode_paths;
use crate::errors::{AppError, AppResult};
use crate::events::{self, Activity, RequestContext};
use crate::forms::FormData;
use crate::models::bids_award::{BidsAward, BidsAwardFormSchema, BidsAwardInput, DbBidsAward, BIDS_AWARD_COLUMNS};
use crate::routes::listing::{Detail, Flash, ListParams, Listing};
use crate::routes::resource::{self, FilterParam, Resource, Toggle};
use crate::storage::FileChanges;
use crate::utils::utc_now;

const DOCUMENT_DIR: &str = "bids-awards";

impl Resource for BidsAward {
    type Row = DbBidsAward;

    const TABLE: &'static str = "bids_awards";
    const COLUMNS: &'static str = BIDS_AWARD_COLUMNS;
    const KEY: PermissionKey = PermissionKey::BidsAwards;
    const PATH: &'static str = "/api/bids-awards";
    const SCHEMA: CategorySchema = catalog::BIDS_AWARDS;
    const SEARCH_COLUMNS: &'static [&'static str] = &["reference_number", "title", "description"];
    const FILTERS: &'static [(FilterParam, &'static str)] =
        &[(FilterParam::Category, "category"), (FilterParam::Status, "status")];

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
        .route("/", get(list_bids_awards).post(create_bids_award))
        .route(
            "/:id",
            get(get_bids_award)
                .post(update_bids_award)
                .put(update_bids_award)
                .delete(delete_bids_award),
        )
        .route("/:id/featured", patch(toggle_featured))
        .route("/:id/status", patch(toggle_status))
}

fn reference_taken(form: &FormData) -> AppError {
    resource::taken(form, "reference_number", "The reference number has already been taken.")
}

async fn ensure_reference_available(pool: &SqlitePool, form: &FormData, reference: &str, except_id: i64) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM bids_awards WHERE reference_number = ? AND id <> ?")
        .bind(reference)
        .bind(except_id)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(reference_taken(form));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/bids-awards",
    tag = "Bids & Awards",
    params(ListParams),
    responses((status = 200, description = "Paginated bids and awards"), (status = 403, description = "Forbidden"))
)]
pub async fn list_bids_awards(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<BidsAward>>> {
    resource::list::<BidsAward>(&state, &principal, &params).await
}

#[utoipa::path(
    get,
    path = "/api/bids-awards/{id}",
    tag = "Bids & Awards",
    params(("id" = i64, Path, description = "Bid/award id")),
    responses((status = 200, description = "Bid/award detail"), (status = 404, description = "Not found"))
)]
pub async fn get_bids_award(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<Detail<BidsAward>>> {
    resource::show::<BidsAward>(&state, &principal, id).await
}

#[utoipa::path(
    post,
    path = "/api/bids-awards",
    tag = "Bids & Awards",
    request_body(content = BidsAwardFormSchema, content_type = "multipart/form-data"),
    responses((status = 201, description = "Bid/award created"), (status = 422, description = "Validation failed"))
)]
pub async fn create_bids_award(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Flash<BidsAward>>)> {
    state.authorize(&principal, PermissionKey::BidsAwards)?;

    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = BidsAwardInput::parse(&form)?;
    ensure_reference_available(&state.pool, &form, &input.reference_number, 0).await?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let documents =
        resource::stage_list(&mut changes, store, DOCUMENT_DIR, form.file_list("documents"), &[], &[]).await?;

    let outcome = async {
        let now = utc_now();
        let mut tx = state.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO bids_awards (user_id, reference_number, title, description, category, status, approved_budget, opening_date, documents, is_featured, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal.user_id)
        .bind(&input.reference_number)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.status)
        .bind(input.approved_budget)
        .bind(input.opening_date)
        .bind(encode_paths(&documents))
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| resource::on_unique_violation(e, || reference_taken(&form)))?
        .last_insert_rowid();

        let record = resource::fetch_in::<BidsAward>(&mut tx, id, false).await?;
        events::record(&mut tx, Activity::new("created", principal.user_id, &record).with_context(&request)).await?;
        tx.commit().await?;
        Ok::<_, AppError>(record)
    }
    .await;

    let record = changes.settle(store, outcome).await?;
    tracing::info!(bids_award_id = record.id, user_id = principal.user_id, "bid/award created");

    Ok((StatusCode::CREATED, Json(Flash::new("Bid/award created successfully.", record))))
}

#[utoipa::path(
    put,
    path = "/api/bids-awards/{id}",
    tag = "Bids & Awards",
    params(("id" = i64, Path, description = "Bid/award id")),
    request_body(content = BidsAwardFormSchema, content_type = "multipart/form-data"),
    responses((status = 200, description = "Bid/award updated"), (status = 422, description = "Validation failed"))
)]
pub async fn update_bids_award(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<Flash<BidsAward>>> {
    state.authorize(&principal, PermissionKey::BidsAwards)?;

    let existing = resource::fetch::<BidsAward>(&state.pool, id).await?;
    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = BidsAwardInput::parse(&form)?;
    ensure_reference_available(&state.pool, &form, &input.reference_number, id).await?;
    let request = RequestContext::from_headers(&headers);
    let store = state.storage();

    let mut changes = FileChanges::new();
    let documents = resource::stage_list(
        &mut changes,
        store,
        DOCUMENT_DIR,
        form.file_list("documents"),
        &existing.documents,
        &form.texts("remove_documents"),
    )
    .await?;

    let outcome = async {
        let mut tx = state.pool.begin().await?;

        sqlx::query(
            "UPDATE bids_awards SET reference_number = ?, title = ?, description = ?, category = ?, status = ?, approved_budget = ?, opening_date = ?, documents = ?, is_featured = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&input.reference_number)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.status)
        .bind(input.approved_budget)
        .bind(input.opening_date)
        .bind(encode_paths(&documents))
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| resource::on_unique_violation(e, || reference_taken(&form)))?;

        let record = resource::fetch_in::<BidsAward>(&mut tx, id, false).await?;
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
    tracing::info!(bids_award_id = record.id, status = %record.status, "bid/award updated");

    Ok(Json(Flash::new("Bid/award updated successfully.", record)))
}

#[utoipa::path(
    delete,
    path = "/api/bids-awards/{id}",
    tag = "Bids & Awards",
    params(("id" = i64, Path, description = "Bid/award id")),
    responses((status = 200, description = "Bid/award and its documents deleted"))
)]
pub async fn delete_bids_award(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<BidsAward>>> {
    let request = RequestContext::from_headers(&headers);
    resource::destroy::<BidsAward>(&state, &principal, id, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/bids-awards/{id}/featured",
    tag = "Bids & Awards",
    params(("id" = i64, Path, description = "Bid/award id")),
    responses((status = 200, description = "Featured flag flipped"))
)]
pub async fn toggle_featured(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<BidsAward>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<BidsAward>(&state, &principal, id, Toggle::Featured, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/bids-awards/{id}/status",
    tag = "Bids & Awards",
    params(("id" = i64, Path, description = "Bid/award id")),
    responses((status = 200, description = "Active flag flipped"))
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<BidsAward>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<BidsAward>(&state, &principal, id, Toggle::Active, &request).await
}
