use serde_json::Value;

#[test]
fn openapi_describes_content_and_context() -> anyhow::Result<()> {
    let doc = civic_portal::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let schemas = v
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .expect("components.schemas must exist");

    let news = schemas
        .get("News")
        .and_then(|n| n.get("properties"))
        .and_then(Value::as_object)
        .expect("components.schemas.News.properties must exist");
    for k in ["title", "category", "featured_image", "gallery", "is_featured", "is_active", "deleted_at"] {
        assert!(news.contains_key(k), "OpenAPI News schema missing '{}'", k);
    }

    let context = schemas
        .get("ViewContext")
        .and_then(|n| n.get("properties"))
        .and_then(Value::as_object)
        .expect("components.schemas.ViewContext.properties must exist");
    for k in ["user", "is_admin", "permissions", "badges"] {
        assert!(context.contains_key(k), "OpenAPI ViewContext schema missing '{}'", k);
    }

    let paths = v.get("paths").and_then(Value::as_object).expect("paths must exist");
    for p in [
        "/api/news",
        "/api/news/{id}",
        "/api/bids-awards",
        "/api/tourism-packages",
        "/api/awards-recognitions",
        "/api/full-disclosures",
        "/api/ordinance-resolutions",
        "/api/sb-members",
        "/api/users/{id}/permissions",
        "/api/trash/{id}/restore",
        "/api/activity-logs",
        "/api/context",
    ] {
        assert!(paths.contains_key(p), "OpenAPI missing path '{}'", p);
    }

    Ok(())
}
