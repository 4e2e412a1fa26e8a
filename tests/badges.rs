mod common;

use axum::http::StatusCode;

use common::{assert_status, news_form, setup};

#[tokio::test]
async fn counts_follow_permissions() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, writer) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    for title in ["One", "Two"] {
        let (status, body) = t.multipart("POST", "/api/news", &writer, news_form(title, "event")).await?;
        assert_status(status, StatusCode::CREATED, &body);
    }

    let (status, body) = t.get("/api/badges", &writer).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["news"], 2);
    assert_eq!(body["trash"], 0);
    assert!(body.get("bids_awards").is_none());
    assert!(body.get("users").is_none());

    let (_, admin) = t.login_as("admin@lgu.test", "admin", &[]).await?;
    let (_, body) = t.get("/api/badges", &admin).await?;
    assert_eq!(body["news"], 2);
    assert_eq!(body["bids_awards"], 0);
    assert_eq!(body["users"], 2);
    Ok(())
}

#[tokio::test]
async fn failing_count_reports_zero_without_breaking_the_rest() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, admin) = t.login_as("admin@lgu.test", "admin", &[]).await?;

    let (status, body) = t.multipart("POST", "/api/news", &admin, news_form("Still counted", "event")).await?;
    assert_status(status, StatusCode::CREATED, &body);

    sqlx::query("DROP TABLE tourism_packages").execute(&t.pool).await?;

    let (status, body) = t.get("/api/context", &admin).await?;
    assert_status(status, StatusCode::OK, &body);
    let badges = &body["badges"];
    assert_eq!(badges["tourism_packages"], 0);
    assert_eq!(badges["news"], 1);
    assert_eq!(badges["users"], 1);
    assert!(badges["activity_logs"].as_i64().unwrap_or(0) >= 1);
    Ok(())
}
