mod common;

use axum::http::StatusCode;

use common::{assert_status, news_form, setup};

#[tokio::test]
async fn category_and_search_narrow_the_list() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    for (title, category) in [
        ("Flood advisory for riverside barangays", "advisory"),
        ("Typhoon advisory lifted", "advisory"),
        ("Fiesta parade route", "event"),
        ("New mayor's office hours", "announcement"),
    ] {
        let (status, body) = t.multipart("POST", "/api/news", &token, news_form(title, category)).await?;
        assert_status(status, StatusCode::CREATED, &body);
    }

    let (status, body) = t.get("/api/news?category=advisory", &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["total"], 2);
    let items = body["items"].as_array().expect("items");
    assert!(items.iter().all(|item| item["category"] == "advisory"));
    assert_eq!(body["filters"]["category"], "advisory");
    assert!(body["links"]["first"].as_str().expect("first").contains("category=advisory"));
    assert!(body["options"]["categories"].is_array());

    let (_, body) = t.get("/api/news?category=advisory&search=flood", &token).await?;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Flood advisory for riverside barangays");
    let first = body["links"]["first"].as_str().expect("first");
    assert!(first.contains("search=flood") && first.contains("category=advisory"), "links lost filters: {first}");

    // blank filters are ignored
    let (_, body) = t.get("/api/news?category=&search=", &token).await?;
    assert_eq!(body["total"], 4);
    assert!(body["filters"].as_object().map(|f| f.is_empty()).unwrap_or(false));
    Ok(())
}

#[tokio::test]
async fn pagination_links_follow_the_page() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    for i in 0..5 {
        let (status, body) = t.multipart("POST", "/api/news", &token, news_form(&format!("Notice {i}"), "update")).await?;
        assert_status(status, StatusCode::CREATED, &body);
    }

    let (status, body) = t.get("/api/news?per_page=2&page=2&category=update", &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["total"], 5);
    assert_eq!(body["last_page"], 3);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["links"]["next"], "/api/news?category=update&per_page=2&page=3");
    assert_eq!(body["links"]["prev"], "/api/news?category=update&per_page=2&page=1");
    Ok(())
}

#[tokio::test]
async fn status_and_type_filters_apply_per_category() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("secretary@lgu.test", "staff", &["ordinance_resolutions"]).await?;

    for (kind, number, status) in [
        ("ordinance", "2025-001", "active"),
        ("ordinance", "2025-002", "pending"),
        ("resolution", "2025-001", "active"),
    ] {
        let form = common::Multipart::new()
            .text("type", kind)
            .text("number", number)
            .text("title", &format!("{kind} {number}"))
            .text("status", status);
        let (code, body) = t.multipart("POST", "/api/ordinance-resolutions", &token, form).await?;
        assert_status(code, StatusCode::CREATED, &body);
    }

    let (_, body) = t.get("/api/ordinance-resolutions?type=ordinance", &token).await?;
    assert_eq!(body["total"], 2);

    let (_, body) = t.get("/api/ordinance-resolutions?type=ordinance&status=active", &token).await?;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["number"], "2025-001");

    let dup = common::Multipart::new()
        .text("type", "ordinance")
        .text("number", "2025-001")
        .text("title", "Duplicate")
        .text("status", "pending");
    let (code, body) = t.multipart("POST", "/api/ordinance-resolutions", &token, dup).await?;
    assert_status(code, StatusCode::UNPROCESSABLE_ENTITY, &body);
    assert!(body["errors"]["number"].is_array());
    Ok(())
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("writer@lgu.test", "staff", &["news"]).await?;

    let (status, body) = t.multipart("POST", "/api/news", &token, news_form("Only one", "event")).await?;
    assert_status(status, StatusCode::CREATED, &body);

    for (uri, total) in [
        ("/api/news?page=18446744073709551615&per_page=100", 1),
        ("/api/news?page=18446744073709551615", 1),
        ("/api/trash?page=18446744073709551615&per_page=100", 0),
    ] {
        let (status, body) = t.get(uri, &token).await?;
        assert_status(status, StatusCode::OK, &body);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0), "{uri}: {body}");
        assert_eq!(body["total"], total);
        assert!(body["links"].get("next").is_none());
    }
    Ok(())
}
