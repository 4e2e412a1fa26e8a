mod common;

use axum::http::StatusCode;

use common::{assert_status, news_form, setup};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\ntrash";

#[tokio::test]
async fn soft_delete_then_restore() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    let form = news_form("Temporary notice", "announcement").file("featured_image", "n.png", "image/png", PNG);
    let (status, body) = t.multipart("POST", "/api/news", &token, form).await?;
    assert_status(status, StatusCode::CREATED, &body);
    let id = body["data"]["id"].as_i64().expect("id");
    let image = body["data"]["featured_image"].as_str().expect("image").to_string();

    let (status, body) = t.delete(&format!("/api/news/{}", id), &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["message"], "News moved to trash.");
    assert!(body["data"]["deleted_at"].is_string());
    assert!(t.stored(&image), "soft delete must keep files");

    let (_, body) = t.get("/api/news", &token).await?;
    assert_eq!(body["total"], 0);
    let (status, _) = t.get(&format!("/api/news/{}", id), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t.get("/api/trash", &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], id);
    assert_eq!(body["context"]["badges"]["trash"], 1);

    let (status, body) = t.patch(&format!("/api/trash/{}/restore", id), &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert!(body["data"]["deleted_at"].is_null());

    let (_, body) = t.get("/api/news", &token).await?;
    assert_eq!(body["total"], 1);
    let (_, body) = t.get("/api/trash", &token).await?;
    assert_eq!(body["total"], 0);

    // live records are not in the trash
    let (status, _) = t.patch(&format!("/api/trash/{}/restore", id), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn force_delete_removes_row_and_files() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    let form = news_form("Old notice", "update")
        .file("featured_image", "n.png", "image/png", PNG)
        .file("gallery[]", "g.webp", "image/webp", b"webp");
    let (status, body) = t.multipart("POST", "/api/news", &token, form).await?;
    assert_status(status, StatusCode::CREATED, &body);
    let id = body["data"]["id"].as_i64().expect("id");
    assert_eq!(t.stored_count(), 2);

    // only trashed news can be purged
    let (status, _) = t.delete(&format!("/api/trash/{}", id), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.delete(&format!("/api/news/{}", id), &token).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = t.delete(&format!("/api/trash/{}", id), &token).await?;
    assert_status(status, StatusCode::OK, &body);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news").fetch_one(&t.pool).await?;
    assert_eq!(rows, 0);
    assert_eq!(t.stored_count(), 0);

    let purged: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM activity_logs WHERE event_name = 'news.force_deleted' AND severity = 'critical'",
    )
    .fetch_one(&t.pool)
    .await?;
    assert_eq!(purged, 1);
    Ok(())
}

#[tokio::test]
async fn trash_key_alone_opens_the_trash() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, janitor) = t.login_as("janitor@lgu.test", "staff", &["trash"]).await?;
    let (_, nobody) = t.login_as("nobody@lgu.test", "staff", &["sangguniang_bayan"]).await?;

    let (status, body) = t.get("/api/trash", &janitor).await?;
    assert_status(status, StatusCode::OK, &body);
    let (status, _) = t.get("/api/trash", &nobody).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn activity_log_chain_is_listed_newest_first() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, admin) = t.login_as("admin@lgu.test", "admin", &[]).await?;

    let (_, body) = t.multipart("POST", "/api/news", &admin, news_form("Logged", "event")).await?;
    let id = body["data"]["id"].as_i64().expect("id");
    t.delete(&format!("/api/news/{}", id), &admin).await?;

    let (status, body) = t.get("/api/activity-logs", &admin).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["event_name"], "news.deleted");
    assert_eq!(body["items"][1]["event_name"], "news.created");

    let (status, body) = t.get("/api/activity-logs?event=news.created", &admin).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["total"], 1);

    let hashes: Vec<(Option<String>, String)> =
        sqlx::query_as("SELECT prev_hash, hash FROM activity_logs ORDER BY id").fetch_all(&t.pool).await?;
    assert!(hashes[0].0.is_none());
    assert_eq!(hashes[1].0.as_deref(), Some(hashes[0].1.as_str()));
    Ok(())
}
