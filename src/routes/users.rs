//! Account administration, gated by `user_management`.

use std::collections::{BTreeMap, BTreeSet};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::app::AppState;
use crate::authz::{PermissionKey, Principal, ASSIGNABLE_ROLES};
use crate::context::ViewContext;
use crate::errors::{merge_validation_errors, AppError, AppResult, FieldErrors, ValidationFailure};
use crate::events::{self, Activity, RequestContext};
use crate::models::user::{
    DbUser, PermissionsUpdateRequest, User, UserCreateRequest, UserUpdateRequest, USER_COLUMNS,
};
use crate::pagination::{Page, PageRequest};
use crate::routes::listing::{Flash, ListSpec, Listing};
use crate::routes::resource;
use crate::utils::{hash_password, utc_now};

const PATH: &str = "/api/users";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListParams {
    /// Matches name or email.
    pub search: Option<String>,
    pub role: Option<String>,
    /// `1`/`0`
    pub active: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionOption {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub data: User,
    pub available_permissions: Vec<PermissionOption>,
    pub roles: Vec<&'static str>,
    pub context: ViewContext,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/permissions", get(list_permission_options))
        .route("/:id", get(get_user).put(update_user).post(update_user).delete(delete_user))
        .route("/:id/permissions", put(update_permissions))
        .route("/:id/status", patch(toggle_user_status))
}

fn permission_options() -> Vec<PermissionOption> {
    PermissionKey::ALL
        .iter()
        .map(|key| PermissionOption {
            key: key.as_str().to_string(),
            label: key.label().to_string(),
        })
        .collect()
}

/// Validates and canonicalizes a submitted permission list: known keys
/// only, deduplicated and sorted.
fn normalize_requested(permissions: &[String], errors: &mut FieldErrors) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for raw in permissions {
        match PermissionKey::parse(raw.trim()) {
            Some(key) => {
                keys.insert(key.as_str().to_string());
            }
            None => errors
                .entry("permissions".to_string())
                .or_default()
                .push(format!("The permission {} is not recognized.", raw)),
        }
    }
    keys.into_iter().collect()
}

fn check_role(role: &str, errors: &mut FieldErrors) {
    if !ASSIGNABLE_ROLES.contains(&role) {
        errors
            .entry("role".to_string())
            .or_default()
            .push(format!("The role must be one of: {}.", ASSIGNABLE_ROLES.join(", ")));
    }
}

fn fail_if_any(errors: FieldErrors) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(ValidationFailure::new(errors, BTreeMap::new())))
    }
}

fn encode_permissions(keys: &[String]) -> String {
    serde_json::to_string(keys).unwrap_or_else(|_| "[]".to_string())
}

fn email_taken() -> AppError {
    AppError::invalid_field("email", "The email has already been taken.")
}

async fn ensure_email_available(pool: &SqlitePool, email: &str, except_id: i64) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? COLLATE NOCASE AND id <> ?")
        .bind(email)
        .bind(except_id)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(email_taken());
    }
    Ok(())
}

async fn fetch_user(pool: &SqlitePool, id: i64) -> AppResult<User> {
    DbUser::find(pool, id)
        .await?
        .map(User::from)
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(UserListParams),
    responses((status = 200, description = "Paginated users"), (status = 403, description = "Forbidden"))
)]
pub async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<UserListParams>,
) -> AppResult<Json<Listing<User>>> {
    state.authorize(&principal, PermissionKey::UserManagement)?;

    let request = PageRequest::new(params.page, params.per_page);
    let spec = ListSpec::new("users", USER_COLUMNS, "name ASC, id ASC")
        .search(&["name", "email"], params.search.as_deref())
        .equals("role", "role", params.role.as_deref())
        .flag("active", "is_active", params.active.as_deref());

    let (rows, total) = spec.fetch::<DbUser>(&state.pool, request).await?;
    let items: Vec<User> = rows.into_iter().map(User::from).collect();

    Ok(Json(Listing {
        page: Page::new(items, request, total, PATH, spec.applied()),
        filters: spec.applied_map(),
        options: None,
        context: ViewContext::build(&state, &principal).await,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/permissions",
    tag = "Users",
    responses((status = 200, description = "Permission catalog", body = [PermissionOption]))
)]
pub async fn list_permission_options(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<PermissionOption>>> {
    state.authorize(&principal, PermissionKey::UserManagement)?;
    Ok(Json(permission_options()))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses((status = 200, description = "User detail"), (status = 404, description = "Not found"))
)]
pub async fn get_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<Json<UserDetail>> {
    state.authorize(&principal, PermissionKey::UserManagement)?;
    let user = fetch_user(&state.pool, id).await?;

    Ok(Json(UserDetail {
        data: user,
        available_permissions: permission_options(),
        roles: ASSIGNABLE_ROLES.to_vec(),
        context: ViewContext::build(&state, &principal).await,
    }))
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<Flash<User>>)> {
    state.authorize(&principal, PermissionKey::UserManagement)?;

    let mut errors = FieldErrors::new();
    if let Err(failed) = payload.validate() {
        merge_validation_errors(&mut errors, &failed);
    }
    check_role(&payload.role, &mut errors);
    let permissions = normalize_requested(&payload.permissions, &mut errors);
    fail_if_any(errors)?;

    let email = payload.email.trim().to_lowercase();
    ensure_email_available(&state.pool, &email, 0).await?;

    let password_hash = hash_password(&payload.password)?;
    let request = RequestContext::from_headers(&headers);
    let now = utc_now();

    let mut tx = state.pool.begin().await?;
    let id = sqlx::query(
        "INSERT INTO users (name, email, password_hash, role, permissions, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(&payload.role)
    .bind(encode_permissions(&permissions))
    .bind(payload.is_active)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| resource::on_unique_violation(e, email_taken))?
    .last_insert_rowid();

    let user: User = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?
        .into();
    events::record(&mut tx, Activity::new("created", principal.user_id, &user).with_context(&request)).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(Flash::new("User created successfully.", user))))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<Flash<User>>> {
    state.authorize(&principal, PermissionKey::UserManagement)?;
    let existing = fetch_user(&state.pool, id).await?;

    let mut errors = FieldErrors::new();
    if let Err(failed) = payload.validate() {
        merge_validation_errors(&mut errors, &failed);
    }
    if let Some(role) = &payload.role {
        check_role(role, &mut errors);
    }
    let permissions = payload
        .permissions
        .as_ref()
        .map(|requested| normalize_requested(requested, &mut errors));
    if id == principal.user_id && payload.is_active == Some(false) {
        errors
            .entry("is_active".to_string())
            .or_default()
            .push("You cannot deactivate your own account.".to_string());
    }
    fail_if_any(errors)?;

    let email = payload
        .email
        .as_deref()
        .map(|email| email.trim().to_lowercase())
        .unwrap_or_else(|| existing.email.clone());
    ensure_email_available(&state.pool, &email, id).await?;

    let password_hash = match payload.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    let request = RequestContext::from_headers(&headers);

    let mut tx = state.pool.begin().await?;
    sqlx::query(
        "UPDATE users SET name = ?, email = ?, role = ?, permissions = ?, is_active = ?, password_hash = COALESCE(?, password_hash), updated_at = ? WHERE id = ?",
    )
    .bind(payload.name.as_deref().map(str::trim).unwrap_or(&existing.name))
    .bind(&email)
    .bind(payload.role.as_deref().unwrap_or(&existing.role))
    .bind(encode_permissions(permissions.as_deref().unwrap_or(&existing.permissions)))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(password_hash)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|e| resource::on_unique_violation(e, email_taken))?;

    let user: User = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?
        .into();
    events::record(
        &mut tx,
        Activity::new("updated", principal.user_id, &user)
            .with_old(&existing)
            .with_context(&request),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(Flash::new("User updated successfully.", user)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/permissions",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    request_body = PermissionsUpdateRequest,
    responses(
        (status = 200, description = "Permissions replaced", body = User),
        (status = 422, description = "Unknown permission key")
    )
)]
pub async fn update_permissions(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<PermissionsUpdateRequest>,
) -> AppResult<Json<Flash<User>>> {
    state.authorize(&principal, PermissionKey::UserManagement)?;
    let existing = fetch_user(&state.pool, id).await?;

    let mut errors = FieldErrors::new();
    let permissions = normalize_requested(&payload.permissions, &mut errors);
    fail_if_any(errors)?;

    let request = RequestContext::from_headers(&headers);
    let mut tx = state.pool.begin().await?;
    sqlx::query("UPDATE users SET permissions = ?, updated_at = ? WHERE id = ?")
        .bind(encode_permissions(&permissions))
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let user: User = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?
        .into();
    events::record(
        &mut tx,
        Activity::new("permissions_updated", principal.user_id, &user)
            .with_old(&existing)
            .with_context(&request),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(Flash::new("Permissions updated successfully.", user)))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/status",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Active flag flipped", body = User),
        (status = 422, description = "Own account")
    )
)]
pub async fn toggle_user_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<User>>> {
    state.authorize(&principal, PermissionKey::UserManagement)?;
    if id == principal.user_id {
        return Err(AppError::invalid_field("is_active", "You cannot deactivate your own account."));
    }
    let existing = fetch_user(&state.pool, id).await?;

    let request = RequestContext::from_headers(&headers);
    let mut tx = state.pool.begin().await?;
    sqlx::query("UPDATE users SET is_active = CASE WHEN is_active = 1 THEN 0 ELSE 1 END, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let user: User = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?
        .into();
    let word = if user.is_active { "activated" } else { "deactivated" };
    events::record(
        &mut tx,
        Activity::new(word, principal.user_id, &user)
            .with_old(&existing)
            .with_context(&request),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(Flash::new(format!("User {} successfully.", word), user)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 422, description = "Own account, or the user still owns content")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Json<Flash<User>>> {
    state.authorize(&principal, PermissionKey::UserManagement)?;
    if id == principal.user_id {
        return Err(AppError::invalid_field("user", "You cannot delete your own account."));
    }
    let existing = fetch_user(&state.pool, id).await?;

    let request = RequestContext::from_headers(&headers);
    let mut tx = state.pool.begin().await?;
    let deleted = sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(&mut *tx).await;
    if let Err(sqlx::Error::Database(db_err)) = &deleted {
        if db_err.is_foreign_key_violation() {
            return Err(AppError::invalid_field(
                "user",
                "This user still owns content. Reassign or delete it first.",
            ));
        }
    }
    deleted?;

    events::record(&mut tx, Activity::new("deleted", principal.user_id, &existing).with_context(&request)).await?;
    tx.commit().await?;

    Ok(Json(Flash::new("User deleted successfully.", existing)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_permissions_are_deduplicated_and_sorted() {
        let mut errors = FieldErrors::new();
        let keys = normalize_requested(
            &["trash".to_string(), "news".to_string(), " news ".to_string()],
            &mut errors,
        );
        assert!(errors.is_empty());
        assert_eq!(keys, vec!["news", "trash"]);
    }

    #[test]
    fn unknown_permission_is_a_field_error() {
        let mut errors = FieldErrors::new();
        let keys = normalize_requested(&["news".to_string(), "payroll".to_string()], &mut errors);
        assert_eq!(keys, vec!["news"]);
        assert_eq!(errors["permissions"].len(), 1);
    }

    #[test]
    fn legacy_roles_cannot_be_assigned() {
        let mut errors = FieldErrors::new();
        check_role("staff", &mut errors);
        assert!(errors.is_empty());
        check_role("superuser", &mut errors);
        assert!(errors.contains_key("role"));
    }
}
