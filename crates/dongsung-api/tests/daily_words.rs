mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::{Form, TestApp, app};

fn word(date: &str, password: &str) -> Form {
    Form::new()
        .text("date", date)
        .text("title", "Psalm 23")
        .text("passage", "Psalm 23:1-6")
        .text("content", "The Lord is my shepherd")
        .text("authorName", "Pastor Kim")
        .text("password", password)
}

fn image_urls(data: &Value) -> Vec<String> {
    data["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["imageUrl"].as_str().unwrap().to_string())
        .collect()
}

async fn fetch(app: &TestApp, date: &str) -> Value {
    let (status, body) = app.get(&format!("/api/daily-words/{}", date), None).await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

#[tokio::test]
async fn create_then_edit_replaces_images_in_place() {
    let app = app().await;

    let form = word("2025-06-01", "pw")
        .file("image", "a.jpg", b"a")
        .file("image", "b.jpg", b"b")
        .file("image", "c.jpg", b"c");
    let (status, body) = app.multipart("/api/daily-words", form, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = &body["data"];
    assert!(created.get("password").is_none());
    let before = image_urls(created);
    assert_eq!(before.len(), 3);
    assert_eq!(created["imageUrl"].as_str().unwrap(), before[0]);
    assert_eq!(app.uploaded(&before[1]), b"b");

    let b_id = created["images"][1]["id"].as_i64().unwrap();
    let form = word("2025-06-01", "pw")
        .text("deleteImages", &b_id.to_string())
        .file("image", "d.jpg", b"d");
    let (status, body) = app.multipart("/api/daily-words", form, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], created["id"]);

    let after = image_urls(&fetch(&app, "2025-06-01").await);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[2]);
    assert_eq!(app.uploaded(&after[2]), b"d");
}

#[tokio::test]
async fn wrong_password_is_forbidden_and_changes_nothing() {
    let app = app().await;
    let (status, _) = app.multipart("/api/daily-words", word("2025-06-01", "pw"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let uploads_before = app.upload_count();

    let form = Form::new()
        .text("date", "2025-06-01")
        .text("title", "Hijacked")
        .text("content", "x")
        .text("authorName", "Mallory")
        .text("password", "guess")
        .file("image", "x.jpg", b"x");
    let (status, body) = app.multipart("/api/daily-words", form, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].is_string());
    assert_eq!(app.upload_count(), uploads_before);

    let current = fetch(&app, "2025-06-01").await;
    assert_eq!(current["title"], "Psalm 23");
    assert_eq!(current["authorName"], "Pastor Kim");

    let (status, _) = app
        .json(Method::DELETE, "/api/daily-words/2025-06-01", json!({"password": "guess"}), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!fetch(&app, "2025-06-01").await.is_null());
}

#[tokio::test]
async fn delete_by_date_then_gone() {
    let app = app().await;
    app.multipart("/api/daily-words", word("2025-06-01", "pw").file("image", "a.jpg", b"a"), None)
        .await;

    let (status, _) = app
        .json(Method::DELETE, "/api/daily-words/2025-06-01", json!({"password": "pw"}), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::DELETE, "/api/daily-words/2025-06-01", json!({"password": "pw"}), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(fetch(&app, "2025-06-01").await.is_null());
}

#[tokio::test]
async fn attachment_survives_edits_without_a_new_file() {
    let app = app().await;
    let (_, body) = app
        .multipart("/api/daily-words", word("2025-06-01", "pw").file("file", "bulletin.pdf", b"%PDF"), None)
        .await;
    let file_url = body["data"]["fileUrl"].as_str().unwrap().to_string();
    assert!(file_url.ends_with(".pdf"));

    let (status, body) = app.multipart("/api/daily-words", word("2025-06-01", "pw"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fileUrl"].as_str().unwrap(), file_url);
}

#[tokio::test]
async fn missing_fields_and_bad_dates_are_rejected() {
    let app = app().await;

    let form = Form::new().text("date", "2025-06-01").text("title", "t");
    let (status, _) = app.multipart("/api/daily-words", form, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.multipart("/api/daily-words", word("2025-13-01", "pw"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/daily-words/yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut form = word("2025-06-01", "pw");
    for i in 0..11 {
        form = form.file("image", &format!("{}.jpg", i), b"i");
    }
    let (status, _) = app.multipart("/api/daily-words", form, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn body_cut_off_after_a_file_leaves_no_upload_behind() {
    let app = app().await;

    let body = Form::new()
        .text("date", "2025-06-01")
        .file("image", "a.jpg", b"a")
        .cut_off_in("title");
    let (status, body) = app.multipart_body("/api/daily-words", body, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
    assert_eq!(app.upload_count(), 0);
    assert!(fetch(&app, "2025-06-01").await.is_null());
}

#[tokio::test]
async fn junk_delete_ids_are_skipped_not_rejected() {
    let app = app().await;
    let form = word("2025-06-01", "pw").file("image", "a.jpg", b"a").file("image", "b.jpg", b"b");
    let (_, body) = app.multipart("/api/daily-words", form, None).await;
    let a_id = body["data"]["images"][0]["id"].as_i64().unwrap();
    let b_url = body["data"]["images"][1]["imageUrl"].as_str().unwrap().to_string();

    let form = word("2025-06-01", "pw").text("deleteImages", &format!("undefined,{},x", a_id));
    let (status, body) = app.multipart("/api/daily-words", form, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(image_urls(&body["data"]), [b_url]);
}
