mod common;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::util::ServiceExt; // for `oneshot`

use civic_portal::create_app;

fn health_request() -> Result<Request<Body>> {
    Ok(Request::builder().method("GET").uri("/api/health").body(Body::empty())?)
}

#[tokio::test]
async fn app_from_env_reports_db_and_version() -> Result<()> {
    let dir = tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("portal.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    std::env::set_var("UPLOAD_ROOT", dir.path().join("uploads"));
    let app = create_app(pool.clone()).await?;

    let resp = app.oneshot(health_request()?).await?;
    assert_eq!(resp.status(), StatusCode::OK, "health endpoint did not return 200");

    let v: Value = serde_json::from_slice(&body::to_bytes(resp.into_body(), 10_485_760).await?)?;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["db_ok"], true, "expected db_ok: true, got: {}", v);
    assert!(v["db_error"].is_null());
    assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));

    // the upload root is created on startup
    assert!(dir.path().join("uploads").is_dir());
    Ok(())
}

#[tokio::test]
async fn unreachable_database_is_reported_not_raised() -> Result<()> {
    let t = common::setup().await?;
    t.pool.close().await;

    let (status, body) = t.send(health_request()?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["db_ok"], false, "{body}");
    assert!(body["db_error"].as_str().map(|e| !e.is_empty()).unwrap_or(false));
    Ok(())
}

#[tokio::test]
async fn health_needs_no_token_but_context_does() -> Result<()> {
    let t = common::setup().await?;

    let (status, _) = t.send(health_request()?).await?;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder().method("GET").uri("/api/context").body(Body::empty())?;
    let (status, body) = t.send(req).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    Ok(())
}
