mod common;

use axum::http::StatusCode;
use serde_json::Value;

use common::{assert_status, setup, Multipart};

const PDF: &[u8] = b"%PDF-1.4 disclosure";
const JPG: &[u8] = b"\xff\xd8\xffjpeg";

fn disclosure_form(title: &str) -> Multipart {
    Multipart::new()
        .text("title", title)
        .text("document_type", "budget")
        .text("fiscal_year", "2024")
        .text("quarter", "q2")
}

fn paths(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn disclosure_requires_a_file_and_stores_nothing_when_invalid() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("treasurer@lgu.test", "staff", &["full_disclosures"]).await?;

    let (status, body) = t.multipart("POST", "/api/full-disclosures", &token, disclosure_form("2024 Budget")).await?;
    assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, &body);
    assert!(body["errors"]["file"].is_array());

    // a valid file alongside an invalid field is not kept either
    let form = Multipart::new()
        .text("title", "No type")
        .text("fiscal_year", "2024")
        .file("file", "budget.pdf", "application/pdf", PDF);
    let (status, body) = t.multipart("POST", "/api/full-disclosures", &token, form).await?;
    assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, &body);
    assert!(body["errors"]["document_type"].is_array());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM full_disclosures").fetch_one(&t.pool).await?;
    assert_eq!(rows, 0);
    assert_eq!(t.stored_count(), 0);
    Ok(())
}

#[tokio::test]
async fn disclosure_update_keeps_or_replaces_the_file() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("treasurer@lgu.test", "staff", &["full_disclosures"]).await?;

    let form = disclosure_form("2024 Budget").file("file", "budget.pdf", "application/pdf", PDF);
    let (status, body) = t.multipart("POST", "/api/full-disclosures", &token, form).await?;
    assert_status(status, StatusCode::CREATED, &body);
    let id = body["data"]["id"].as_i64().expect("id");
    let old = body["data"]["file_path"].as_str().expect("file_path").to_string();
    assert!(old.starts_with("disclosures/"));
    assert!(t.stored(&old));

    // no upload keeps the current document
    let (status, body) = t
        .multipart("PUT", &format!("/api/full-disclosures/{}", id), &token, disclosure_form("2024 Budget (final)"))
        .await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(body["data"]["file_path"], old.as_str());
    assert!(t.stored(&old));

    let form = disclosure_form("2024 Budget (amended)").file("file", "amended.pdf", "application/pdf", PDF);
    let (status, body) = t.multipart("PUT", &format!("/api/full-disclosures/{}", id), &token, form).await?;
    assert_status(status, StatusCode::OK, &body);
    let new = body["data"]["file_path"].as_str().expect("file_path").to_string();
    assert_ne!(new, old);
    assert!(t.stored(&new));
    assert!(!t.stored(&old));
    assert_eq!(t.stored_count(), 1);

    let (status, body) = t.delete(&format!("/api/full-disclosures/{}", id), &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert_eq!(t.stored_count(), 0);
    Ok(())
}

#[tokio::test]
async fn tourism_gallery_drops_removed_and_adds_new() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("tourism@lgu.test", "staff", &["tourism_packages"]).await?;

    let package = || {
        Multipart::new()
            .text("name", "Heritage walk")
            .text("destination", "Poblacion")
            .text("description", "Old churches and ancestral houses.")
            .text("category", "heritage")
            .text("price", "1,200")
    };

    let form = package()
        .file("gallery[]", "one.jpg", "image/jpeg", JPG)
        .file("gallery[]", "two.jpg", "image/jpeg", JPG)
        .file("gallery[]", "three.jpg", "image/jpeg", JPG);
    let (status, body) = t.multipart("POST", "/api/tourism-packages", &token, form).await?;
    assert_status(status, StatusCode::CREATED, &body);
    let id = body["data"]["id"].as_i64().expect("id");
    let original = paths(&body["data"]["gallery"]);
    assert_eq!(original.len(), 3);

    let form = package()
        .text("remove_gallery[]", &original[0])
        .text("remove_gallery[]", &original[2])
        .file("gallery[]", "four.webp", "image/webp", b"webp");
    let (status, body) = t.multipart("POST", &format!("/api/tourism-packages/{}", id), &token, form).await?;
    assert_status(status, StatusCode::OK, &body);

    let gallery = paths(&body["data"]["gallery"]);
    assert_eq!(gallery.len(), 2, "{body}");
    assert_eq!(gallery[0], original[1]);
    assert!(gallery[1].ends_with(".webp"));
    assert!(!t.stored(&original[0]));
    assert!(t.stored(&original[1]));
    assert!(!t.stored(&original[2]));
    assert!(t.stored(&gallery[1]));
    assert_eq!(t.stored_count(), 2);
    Ok(())
}

#[tokio::test]
async fn member_delete_releases_photo() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("sb@lgu.test", "staff", &["sangguniang_bayan"]).await?;

    let form = Multipart::new()
        .text("name", "Hon. Juan dela Cruz")
        .text("position", "councilor")
        .text("term_start", "2022-06-30")
        .text("term_end", "2025-06-30")
        .file("photo", "juan.png", "image/png", b"\x89PNG\r\n\x1a\nphoto");
    let (status, body) = t.multipart("POST", "/api/sb-members", &token, form).await?;
    assert_status(status, StatusCode::CREATED, &body);
    let id = body["data"]["id"].as_i64().expect("id");
    let photo = body["data"]["photo"].as_str().expect("photo").to_string();
    assert!(t.stored(&photo));

    let (status, body) = t.delete(&format!("/api/sb-members/{}", id), &token).await?;
    assert_status(status, StatusCode::OK, &body);
    assert!(!t.stored(&photo));
    let (status, _) = t.get(&format!("/api/sb-members/{}", id), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn award_image_replaced_then_removed() -> anyhow::Result<()> {
    let t = setup().await?;
    let (_, token) = t.login_as("pio@lgu.test", "staff", &["awards_recognitions"]).await?;

    let award = || {
        Multipart::new()
            .text("title", "Seal of Good Local Governance")
            .text("awarding_body", "DILG")
            .text("category", "national")
            .text("year", "2023")
    };

    let (status, body) = t
        .multipart("POST", "/api/awards-recognitions", &token, award().file("image", "seal.jpg", "image/jpeg", JPG))
        .await?;
    assert_status(status, StatusCode::CREATED, &body);
    let id = body["data"]["id"].as_i64().expect("id");
    let old = body["data"]["image"].as_str().expect("image").to_string();

    let (status, body) = t
        .multipart(
            "PUT",
            &format!("/api/awards-recognitions/{}", id),
            &token,
            award().file("image", "seal-2.jpg", "image/jpeg", JPG),
        )
        .await?;
    assert_status(status, StatusCode::OK, &body);
    let new = body["data"]["image"].as_str().expect("image").to_string();
    assert!(!t.stored(&old));
    assert!(t.stored(&new));

    let (status, body) = t
        .multipart("PUT", &format!("/api/awards-recognitions/{}", id), &token, award().text("remove_image", "1"))
        .await?;
    assert_status(status, StatusCode::OK, &body);
    assert!(body["data"]["image"].is_null());
    assert_eq!(t.stored_count(), 0);
    Ok(())
}
