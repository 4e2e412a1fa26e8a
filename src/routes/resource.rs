//! The handlers every content category shares: list, show, delete and the
//! featured/active toggles. Create and update live in each category module
//! since their fields and files differ.

use axum::Json;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal};
use crate::catalog::{CategoryOptions, CategorySchema};
use crate::context::ViewContext;
use crate::errors::{AppError, AppResult, ValidationFailure};
use crate::events::{self, Activity, Loggable, RequestContext};
use crate::forms::FormData;
use crate::pagination::Page;
use crate::routes::listing::{Detail, Flash, ListParams, ListSpec, Listing};
use crate::storage::{release, FileChanges, FileStore, UploadedFile};
use crate::utils::{capitalize, utc_now};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterParam {
    Category,
    Status,
    Type,
}

impl FilterParam {
    pub fn name(self) -> &'static str {
        match self {
            FilterParam::Category => "category",
            FilterParam::Status => "status",
            FilterParam::Type => "type",
        }
    }

    fn value(self, params: &ListParams) -> Option<&str> {
        match self {
            FilterParam::Category => params.category.as_deref(),
            FilterParam::Status => params.status.as_deref(),
            FilterParam::Type => params.kind.as_deref(),
        }
    }
}

/// A content category stored in one table.
pub trait Resource: Loggable + Serialize + Sized + Send + Sync + 'static {
    type Row: for<'r> FromRow<'r, SqliteRow> + Into<Self> + Send + Unpin;

    const TABLE: &'static str;
    const COLUMNS: &'static str;
    const KEY: PermissionKey;
    /// Public path, used for pagination links.
    const PATH: &'static str;
    const SCHEMA: CategorySchema;
    const SEARCH_COLUMNS: &'static [&'static str];
    const FILTERS: &'static [(FilterParam, &'static str)];
    const ORDER_BY: &'static str = "created_at DESC, id DESC";
    /// Deleted rows keep their files and move to the trash.
    const SOFT_DELETES: bool = false;

    fn stored_files(&self) -> Vec<String>;
    fn featured(&self) -> bool;
    fn active(&self) -> bool;

    fn options() -> CategoryOptions {
        CategoryOptions::from(&Self::SCHEMA)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Featured,
    Active,
}

impl Toggle {
    fn column(self) -> &'static str {
        match self {
            Toggle::Featured => "is_featured",
            Toggle::Active => "is_active",
        }
    }

    /// Past-tense verb for the new state.
    pub fn word(self, on: bool) -> &'static str {
        match (self, on) {
            (Toggle::Featured, true) => "featured",
            (Toggle::Featured, false) => "unfeatured",
            (Toggle::Active, true) => "activated",
            (Toggle::Active, false) => "deactivated",
        }
    }
}

pub fn not_found<R: Resource>() -> AppError {
    AppError::not_found(format!("{} not found", capitalize(R::entity_label())))
}

/// Loads one row; soft-deleted rows only when `include_trashed`.
pub async fn fetch_in<R: Resource>(conn: &mut SqliteConnection, id: i64, include_trashed: bool) -> AppResult<R> {
    let mut sql = format!("SELECT {} FROM {} WHERE id = ?", R::COLUMNS, R::TABLE);
    if R::SOFT_DELETES && !include_trashed {
        sql.push_str(" AND deleted_at IS NULL");
    }

    let row = sqlx::query_as::<_, R::Row>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Into::into).ok_or_else(not_found::<R>)
}

pub async fn fetch<R: Resource>(pool: &SqlitePool, id: i64) -> AppResult<R> {
    let mut conn = pool.acquire().await?;
    fetch_in::<R>(&mut conn, id, false).await
}

pub async fn list<R: Resource>(state: &AppState, principal: &Principal, params: &ListParams) -> AppResult<Json<Listing<R>>> {
    state.authorize(principal, R::KEY)?;

    let request = params.page_request();
    let mut spec = ListSpec::new(R::TABLE, R::COLUMNS, R::ORDER_BY);
    if R::SOFT_DELETES {
        spec = spec.condition("deleted_at IS NULL");
    }
    spec = spec.search(R::SEARCH_COLUMNS, params.search.as_deref());
    for &(param, column) in R::FILTERS {
        spec = spec.equals(param.name(), column, param.value(params));
    }
    spec = spec
        .flag("featured", "is_featured", params.featured.as_deref())
        .flag("active", "is_active", params.active.as_deref());

    let (rows, total) = spec.fetch::<R::Row>(&state.pool, request).await?;
    let items: Vec<R> = rows.into_iter().map(Into::into).collect();

    Ok(Json(Listing {
        page: Page::new(items, request, total, R::PATH, spec.applied()),
        filters: spec.applied_map(),
        options: Some(R::options()),
        context: ViewContext::build(state, principal).await,
    }))
}

pub async fn show<R: Resource>(state: &AppState, principal: &Principal, id: i64) -> AppResult<Json<Detail<R>>> {
    state.authorize(principal, R::KEY)?;
    let record = fetch::<R>(&state.pool, id).await?;

    Ok(Json(Detail {
        data: record,
        options: Some(R::options()),
        context: ViewContext::build(state, principal).await,
    }))
}

pub async fn toggle<R: Resource>(
    state: &AppState,
    principal: &Principal,
    id: i64,
    toggle: Toggle,
    request: &RequestContext,
) -> AppResult<Json<Flash<R>>> {
    state.authorize(principal, R::KEY)?;

    let mut tx = state.pool.begin().await?;
    let before = fetch_in::<R>(&mut tx, id, false).await?;

    let column = toggle.column();
    let sql = format!(
        "UPDATE {} SET {column} = CASE WHEN {column} = 1 THEN 0 ELSE 1 END, updated_at = ? WHERE id = ?",
        R::TABLE
    );
    sqlx::query(&sql).bind(utc_now()).bind(id).execute(&mut *tx).await?;

    let after = fetch_in::<R>(&mut tx, id, false).await?;
    let on = match toggle {
        Toggle::Featured => after.featured(),
        Toggle::Active => after.active(),
    };
    let word = toggle.word(on);

    events::record(
        &mut tx,
        Activity::new(word, principal.user_id, &after)
            .with_old(&before)
            .with_context(request),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(Flash::new(
        format!("{} {} successfully.", capitalize(R::entity_label()), word),
        after,
    )))
}

/// Deletes a record. Soft-deleting categories keep row and files for the
/// trash; the rest release every referenced file once the row is gone.
pub async fn destroy<R: Resource>(
    state: &AppState,
    principal: &Principal,
    id: i64,
    request: &RequestContext,
) -> AppResult<Json<Flash<R>>> {
    state.authorize(principal, R::KEY)?;

    let mut tx = state.pool.begin().await?;
    let record = fetch_in::<R>(&mut tx, id, false).await?;

    if R::SOFT_DELETES {
        let sql = format!("UPDATE {} SET deleted_at = ?, updated_at = ? WHERE id = ?", R::TABLE);
        let now = utc_now();
        sqlx::query(&sql).bind(now).bind(now).bind(id).execute(&mut *tx).await?;

        let trashed = fetch_in::<R>(&mut tx, id, true).await?;
        events::record(&mut tx, Activity::new("deleted", principal.user_id, &trashed).with_context(request)).await?;
        tx.commit().await?;

        return Ok(Json(Flash::new(
            format!("{} moved to trash.", capitalize(R::entity_label())),
            trashed,
        )));
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", R::TABLE);
    sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
    events::record(&mut tx, Activity::new("deleted", principal.user_id, &record).with_context(request)).await?;
    tx.commit().await?;

    release(state.storage(), record.stored_files()).await;

    Ok(Json(Flash::new(
        format!("{} deleted successfully.", capitalize(R::entity_label())),
        record,
    )))
}

/// Resolves a single-file field on create or update. A new upload replaces
/// (and retires) the current file; `remove` clears it.
pub async fn stage_single(
    changes: &mut FileChanges,
    store: &dyn FileStore,
    directory: &str,
    upload: Option<&UploadedFile>,
    current: Option<&str>,
    remove: bool,
) -> AppResult<Option<String>> {
    match upload {
        Some(file) => {
            let path = changes.store(store, directory, file).await?;
            if let Some(old) = current {
                changes.retire(old);
            }
            Ok(Some(path))
        }
        None if remove => {
            if let Some(old) = current {
                changes.retire(old);
            }
            Ok(None)
        }
        None => Ok(current.map(String::from)),
    }
}

/// Resolves a multi-file field: drops the paths named in `remove`, then
/// appends the new uploads.
pub async fn stage_list(
    changes: &mut FileChanges,
    store: &dyn FileStore,
    directory: &str,
    uploads: &[UploadedFile],
    current: &[String],
    remove: &[String],
) -> AppResult<Vec<String>> {
    let (mut kept, removed) = keep_paths(current, remove);
    changes.retire_all(removed);
    kept.extend(changes.store_all(store, directory, uploads).await?);
    Ok(kept)
}

/// A uniqueness collision reported against `field`.
pub fn taken(form: &FormData, field: &str, message: &str) -> AppError {
    AppError::validation(ValidationFailure::single(field, message).with_old_input(form.old_input()))
}

/// Turns a unique-index failure from a write into `collision()`; any other
/// error passes through. Covers a duplicate committed between the
/// availability check and the write.
pub fn on_unique_violation(err: sqlx::Error, collision: impl FnOnce() -> AppError) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => collision(),
        _ => AppError::from(err),
    }
}

/// Paths from `existing` that survive a `remove_<field>[]` request.
pub fn keep_paths(existing: &[String], remove: &[String]) -> (Vec<String>, Vec<String>) {
    existing.iter().cloned().partition(|path| !remove.contains(path))
}
