use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::Principal;
use crate::badges::{compute_badge_counts, BadgeCounts, SqliteBadgeSource};
use crate::context::ViewContext;

#[utoipa::path(
    get,
    path = "/api/context",
    tag = "Context",
    responses(
        (status = 200, description = "Signed-in user, section flags and badge counts", body = ViewContext),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn show_context(State(state): State<AppState>, principal: Principal) -> Json<ViewContext> {
    Json(ViewContext::build(&state, &principal).await)
}

#[utoipa::path(
    get,
    path = "/api/badges",
    tag = "Context",
    responses((status = 200, description = "Navigation badge counts keyed by section"))
)]
pub async fn show_badges(State(state): State<AppState>, principal: Principal) -> Json<BadgeCounts> {
    let source = SqliteBadgeSource::new(state.pool.clone());
    Json(compute_badge_counts(state.authz.as_ref(), &source, &principal).await)
}
