mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

use common::{app, app_with};
use dongsung_api::Policy;

#[tokio::test]
async fn register_login_and_session_gate() {
    let app = app().await;

    let (status, body) = app
        .json(Method::POST, "/api/register", json!({"username": "alice", "password": "secret1"}), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["userId"].is_i64());

    let (status, body) = app
        .json(Method::POST, "/api/login", json!({"username": "alice", "password": "wrong"}), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = app
        .json(Method::POST, "/api/login", json!({"username": "alice", "password": "secret1"}), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/posts", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token, authorization denied");

    let (status, _) = app.get("/api/posts", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/posts", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_user_gets_same_login_error() {
    let app = app().await;
    let (status, body) = app
        .json(Method::POST, "/api/login", json!({"username": "ghost", "password": "secret1"}), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn legacy_token_header_is_accepted() {
    let app = app().await;
    let (_, token) = app.member("alice", "secret1").await;

    let req = Request::builder()
        .uri("/api/posts")
        .header("x-auth-token", token)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn registration_validates_and_rejects_duplicates() {
    let app = app().await;
    app.member("alice", "secret1").await;

    let (status, body) = app
        .json(Method::POST, "/api/register", json!({"username": "alice", "password": "other12"}), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists");

    let (status, _) = app
        .json(Method::POST, "/api/register", json!({"username": "al", "password": "secret1"}), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(Method::POST, "/api/register", json!({"username": "bobby", "password": "123"}), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(Method::POST, "/api/register", json!({"username": "bobby"}), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn change_password_checks_current_one() {
    let app = app().await;
    let (_, token) = app.member("alice", "secret1").await;

    let (status, _) = app
        .json(
            Method::PUT,
            "/api/users/password",
            json!({"currentPassword": "wrong", "newPassword": "secret2"}),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::PUT,
            "/api/users/password",
            json!({"currentPassword": "secret1", "newPassword": "secret2"}),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::POST, "/api/login", json!({"username": "alice", "password": "secret2"}), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reset_by_username_can_be_disabled() {
    let app = app().await;
    app.member("alice", "secret1").await;

    let (status, _) = app
        .json(Method::POST, "/api/reset-password", json!({"username": "alice", "newPassword": "fresh99"}), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .json(Method::POST, "/api/login", json!({"username": "alice", "password": "fresh99"}), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::POST, "/api/reset-password", json!({"username": "nobody", "newPassword": "fresh99"}), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let locked = app_with(Policy {
        allow_username_reset: false,
        ..Policy::default()
    })
    .await;
    locked.member("alice", "secret1").await;
    let (status, _) = locked
        .json(Method::POST, "/api/reset-password", json!({"username": "alice", "newPassword": "fresh99"}), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
