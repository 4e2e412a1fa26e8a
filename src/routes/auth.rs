use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::events::{self, Activity, RequestContext};
use crate::models::user::{AuthResponse, DbUser, LoginRequest, User, USER_COLUMNS};
use crate::utils::{utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account deactivated")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = DbUser::find_by_email(&state.pool, payload.email.trim())
        .await?
        .ok_or_else(|| AppError::unauthorized("These credentials do not match our records."))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::info!(email = %payload.email, "failed login attempt");
        return Err(AppError::unauthorized("These credentials do not match our records."));
    }

    if !db_user.is_active {
        return Err(AppError::forbidden("Your account has been deactivated."));
    }

    let request = RequestContext::from_headers(&headers);
    let mut tx = state.pool.begin().await?;
    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(db_user.id)
        .execute(&mut *tx)
        .await?;
    let refreshed = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(db_user.id)
        .fetch_one(&mut *tx)
        .await?;
    let user = User::from(refreshed);
    events::record(&mut tx, Activity::new("logged_in", user.id, &user).with_context(&request)).await?;
    tx.commit().await?;

    let token = state.jwt.encode(user.id)?;
    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<User>> {
    let db_user = DbUser::find(&state.pool, principal.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(User::from(db_user)))
}

/// Tokens are stateless; the client discards its copy.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse))
)]
pub async fn logout(principal: Principal) -> Json<MessageResponse> {
    tracing::debug!(user_id = principal.user_id, "logout");
    Json(MessageResponse {
        message: "Logged out".to_string(),
    })
}
