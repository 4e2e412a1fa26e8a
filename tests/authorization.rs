mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use common::{assert_status, news_form, setup};

#[tokio::test]
async fn admin_passes_every_gate() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("admin@lgu.test", "admin", &[]).await?;

    for uri in [
        "/api/news",
        "/api/bids-awards",
        "/api/tourism-packages",
        "/api/awards-recognitions",
        "/api/full-disclosures",
        "/api/ordinance-resolutions",
        "/api/sb-members",
        "/api/trash",
        "/api/users",
        "/api/activity-logs",
    ] {
        let (status, body) = t.get(uri, &token).await?;
        assert_status(status, StatusCode::OK, &body);
    }

    let (status, body) = t.get("/api/context", &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["permissions"]["news"], true);
    assert_eq!(body["permissions"]["activity_logs"], true);
    Ok(())
}

#[tokio::test]
async fn staff_is_limited_to_granted_keys() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    let (status, body) = t.get("/api/news", &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["context"]["permissions"]["news"], true);
    assert_eq!(body["context"]["permissions"]["bids_awards"], false);

    let (status, body) = t.get("/api/bids-awards", &token).await?;
    assert_status(status, StatusCode::FORBIDDEN, &body);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = t.get("/api/users", &token).await?;
    assert_status(status, StatusCode::FORBIDDEN, &body);

    // nothing is written when the gate denies
    let (_, other) = t.login_as("clerk@lgu.test", "staff", &["bids_awards"]).await?;
    let (status, body) = t.multipart("POST", "/api/news", &other, news_form("Denied", "event")).await?;
    assert_status(status, StatusCode::FORBIDDEN, &body);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news").fetch_one(&t.pool).await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn news_permission_opens_trash() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    let (status, body) = t.get("/api/trash", &token).await?;
    assert_status(status, StatusCode::OK, &body);
    Ok(())
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() -> anyhow::Result<()> {
    let t = setup().await?;

    let req = Request::builder().method("GET").uri("/api/news").body(Body::empty())?;
    let (status, _) = t.send(req).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.get("/api/news", "not-a-token").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn deactivated_account_is_refused() -> anyhow::Result<()> {
    let t = setup().await?;
    let id = t.seed_user("gone@lgu.test", "admin", &[], false).await?;
    let token = t.token(id)?;

    let (status, body) = t.get("/api/news", &token).await?;
    assert_status(status, StatusCode::FORBIDDEN, &body);

    let (status, body) = t
        .json(
            "POST",
            "/api/auth/login",
            "",
            serde_json::json!({ "email": "gone@lgu.test", "password": common::PASSWORD }),
        )
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, &body);
    Ok(())
}

#[tokio::test]
async fn browser_navigation_is_redirected_back() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    let req = Request::builder()
        .method("GET")
        .uri("/api/bids-awards")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::ACCEPT, "text/html,application/xhtml+xml")
        .header(header::REFERER, "/admin/news")
        .body(Body::empty())?;
    let resp = tower::ServiceExt::oneshot(t.app.clone(), req).await?;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/admin/news");
    assert!(resp.headers().contains_key(civic_portal::app::FLASH_ERROR_HEADER));
    Ok(())
}

#[tokio::test]
async fn login_returns_token_and_records_activity() -> anyhow::Result<()> {
    let t = setup().await?;
    t.seed_user("admin@lgu.test", "admin", &[], true).await?;

    let (status, body) = t
        .json(
            "POST",
            "/api/auth/login",
            "",
            serde_json::json!({ "email": "ADMIN@lgu.test", "password": "wrong-password" }),
        )
        .await?;
    assert_status(status, StatusCode::UNAUTHORIZED, &body);

    let (status, body) = t
        .json(
            "POST",
            "/api/auth/login",
            "",
            serde_json::json!({ "email": "admin@lgu.test", "password": common::PASSWORD }),
        )
        .await?;
    assert_status(status, StatusCode::OK, &body);
    let token = body["token"].as_str().expect("token").to_string();
    assert!(body["user"]["last_login_at"].is_string());

    let (status, me) = t.get("/api/auth/me", &token).await?;
    assert_status(status, StatusCode::OK, &me);
    assert_eq!(me["email"], "admin@lgu.test");

    let logins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activity_logs WHERE event_name = 'user.logged_in'")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(logins, 1);
    Ok(())
}
