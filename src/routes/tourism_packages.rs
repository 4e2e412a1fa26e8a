use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal};
use crate::catalog::{self, CategorySchema};
use crate::db::encode_paths;
use crate::errors::{AppError, AppResult};
use crate::events::{self, Activity, RequestContext};
use crate::forms::FormData;
use crate::models::tourism_package::{
    DbTourismPackage, TourismPackage, TourismPackageFormSchema, TourismPackageInput, TOURISM_PACKAGE_COLUMNS,
};
use crate::routes::listing::{Detail, Flash, ListParams, Listing};
use crate::routes::resource::{self, FilterParam, Resource, Toggle};
use crate::storage::FileChanges;
use crate::utils::utc_now;

const IMAGE_DIR: &str = "tourism";
const GALLERY_DIR: &str = "tourism/gallery";

impl Resource for TourismPackage {
    type Row = DbTourismPackage;

    const TABLE: &'static str = "tourism_packages";
    const COLUMNS: &'static str = TOURISM_PACKAGE_COLUMNS;
    const KEY: PermissionKey = PermissionKey::TourismPackages;
    const PATH: &'static str = "/api/tourism-packages";
    const SCHEMA: CategorySchema = catalog::TOURISM_PACKAGES;
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "destination", "description"];
    const FILTERS: &'static [(FilterParam, &'static str)] = &[(FilterParam::Category, "category")];

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
        .route("/", get(list_tourism_packages).post(create_tourism_package))
        .route(
            "/:id",
            get(get_tourism_package)
                .post(update_tourism_package)
                .put(update_tourism_package)
                .delete(delete_tourism_package),
        )
        .route("/:id/featured", patch(toggle_featured))
        .route("/:id/status", patch(toggle_status))
}

#[utoipa::path(
    get,
    path = "/api/tourism-packages",
    tag = "Tourism",
    params(ListParams),
    responses((status = 200, description = "Paginated tourism packages"))
)]
pub async fn list_tourism_packages(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Listing<TourismPackage>>> {
    resource::list::<TourismPackage>(&state, &principal, &params).await
}

#[utoipa::path(
    get,
    path = "/api/tourism-packages/{id}",
    tag = "Tourism",
    params(("id" = i64, Path, description = "Package id")),
    responses((status = 200, description = "Package detail"), (status = 404, description = "Not found"))
)]
pub async fn get_tourism_package(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<Detail<TourismPackage>>> {
    resource::show::<TourismPackage>(&state, &principal, id).await
}

#[utoipa::path(
    post,
    path = "/api/tourism-packages",
    tag = "Tourism",
    request_body(content = TourismPackageFormSchema, content_type = "multipart/form-data"),
    responses((status = 201, description = "Package created"), (status = 422, description = "Validation failed"))
)]
pub async fn create_tourism_package(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Flash<TourismPackage>>)> {
    state.authorize(&principal, PermissionKey::TourismPackages)?;

    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = TourismPackageInput::parse(&form)?;
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
            "INSERT INTO tourism_packages (user_id, name, destination, description, category, price, duration, featured_image, gallery, is_featured, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal.user_id)
        .bind(&input.name)
        .bind(&input.destination)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.price)
        .bind(&input.duration)
        .bind(&featured_image)
        .bind(encode_paths(&gallery))
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let record = resource::fetch_in::<TourismPackage>(&mut tx, id, false).await?;
        events::record(&mut tx, Activity::new("created", principal.user_id, &record).with_context(&request)).await?;
        tx.commit().await?;
        Ok::<_, AppError>(record)
    }
    .await;

    let record = changes.settle(store, outcome).await?;
    tracing::info!(package_id = record.id, user_id = principal.user_id, "tourism package created");

    Ok((StatusCode::CREATED, Json(Flash::new("Tourism package created successfully.", record))))
}

#[utoipa::path(
    put,
    path = "/api/tourism-packages/{id}",
    tag = "Tourism",
    params(("id" = i64, Path, description = "Package id")),
    request_body(content = TourismPackageFormSchema, content_type = "multipart/form-data"),
    responses((status = 200, description = "Package updated"), (status = 422, description = "Validation failed"))
)]
pub async fn update_tourism_package(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<Flash<TourismPackage>>> {
    state.authorize(&principal, PermissionKey::TourismPackages)?;

    let existing = resource::fetch::<TourismPackage>(&state.pool, id).await?;
    let form = FormData::from_multipart(multipart, state.max_upload_bytes).await?;
    let input = TourismPackageInput::parse(&form)?;
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
            "UPDATE tourism_packages SET name = ?, destination = ?, description = ?, category = ?, price = ?, duration = ?, featured_image = ?, gallery = ?, is_featured = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.destination)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.price)
        .bind(&input.duration)
        .bind(&featured_image)
        .bind(encode_paths(&gallery))
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let record = resource::fetch_in::<TourismPackage>(&mut tx, id, false).await?;
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
    Ok(Json(Flash::new("Tourism package updated successfully.", record)))
}

#[utoipa::path(
    delete,
    path = "/api/tourism-packages/{id}",
    tag = "Tourism",
    params(("id" = i64, Path, description = "Package id")),
    responses((status = 200, description = "Package and its images deleted"))
)]
pub async fn delete_tourism_package(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<TourismPackage>>> {
    let request = RequestContext::from_headers(&headers);
    resource::destroy::<TourismPackage>(&state, &principal, id, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/tourism-packages/{id}/featured",
    tag = "Tourism",
    params(("id" = i64, Path, description = "Package id")),
    responses((status = 200, description = "Featured flag flipped"))
)]
pub async fn toggle_featured(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<TourismPackage>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<TourismPackage>(&state, &principal, id, Toggle::Featured, &request).await
}

#[utoipa::path(
    patch,
    path = "/api/tourism-packages/{id}/status",
    tag = "Tourism",
    params(("id" = i64, Path, description = "Package id")),
    responses((status = 200, description = "Active flag flipped"))
)]
pub async fn toggle_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<TourismPackage>>> {
    let request = RequestContext::from_headers(&headers);
    resource::toggle::<TourismPackage>(&state, &principal, id, Toggle::Active, &request).await
}
