mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{app, login, send, signup};

#[tokio::test]
async fn signup_returns_id_and_token() {
    let app = app();
    let (id, token) = signup(&app, "Ann", "ann@example.com", "Female").await;

    let (status, body) = send(&app, "GET", &format!("/users/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id);
    assert_eq!(body["user"]["name"], "Ann");
    assert_eq!(body["user"]["gender"], "Female");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn signup_reports_field_errors() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "name": "  ", "email": "not-an-email", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["errors"]["name"], "Please enter a name");
    assert_eq!(body["errors"]["email"], "Please enter a valid email address");
    assert_eq!(body["errors"]["password"], "Please enter at least 6 characters");
}

#[tokio::test]
async fn signup_rejects_malformed_json() {
    let app = app();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/users/signup")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"name\":"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = app();
    signup(&app, "Ann", "ann@example.com", "Female").await;

    let (status, body) = send(
        &app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "name": "Other", "email": " ANN@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errors"]["email"], "email address already exists");
}

#[tokio::test]
async fn list_and_male_filter() {
    let app = app();
    let (_, token) = signup(&app, "Ann", "ann@example.com", "Female").await;
    signup(&app, "Bob", "bob@example.com", "Male").await;
    signup(&app, "Cid", "cid@example.com", "Male").await;

    let (status, body) = send(&app, "GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"Ann"));

    let (status, body) = send(&app, "GET", "/users/male", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let males = body.as_array().unwrap();
    assert_eq!(males.len(), 2);
    assert!(males.iter().all(|u| u["gender"] == "Male"));
}

#[tokio::test]
async fn full_lifecycle() {
    let app = app();
    let (id, _) = signup(&app, "Ann", "ann@example.com", "Female").await;
    let (access, _) = login(&app, "ann@example.com", "secret1").await;
    let path = format!("/users/{id}");

    let (status, body) = send(
        &app,
        "PATCH",
        &path,
        Some(&access),
        Some(json!({ "name": "Annie", "password": "new-secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Annie");

    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "ann@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, "ann@example.com", "new-secret").await;

    let (status, body) = send(&app, "DELETE", &path, Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User has been deleted");

    let (_, other) = signup(&app, "Bob", "bob@example.com", "Male").await;
    let (status, _) = send(&app, "GET", &path, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &path, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_users_token_is_refused() {
    let app = app();
    let (id, token) = signup(&app, "Ann", "ann@example.com", "Female").await;

    let (status, _) = send(&app, "DELETE", &format!("/users/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User no longer exists");
}

#[tokio::test]
async fn patch_rejects_gender_and_leaves_record_unchanged() {
    let app = app();
    let (id, token) = signup(&app, "Ann", "ann@example.com", "Female").await;
    let path = format!("/users/{id}");

    let (status, body) = send(
        &app,
        "PATCH",
        &path,
        Some(&token),
        Some(json!({ "name": "Changed", "gender": "Male" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["gender"], "gender cannot be updated");

    let (_, body) = send(&app, "GET", &path, Some(&token), None).await;
    assert_eq!(body["user"]["name"], "Ann");
    assert_eq!(body["user"]["gender"], "Female");
}

#[tokio::test]
async fn patch_to_taken_email_is_a_conflict() {
    let app = app();
    let (id, token) = signup(&app, "Ann", "ann@example.com", "Female").await;
    signup(&app, "Bob", "bob@example.com", "Male").await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/users/{id}"),
        Some(&token),
        Some(json!({ "email": "bob@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let app = app();
    let (_, token) = signup(&app, "Ann", "ann@example.com", "Female").await;

    let (status, body) = send(&app, "GET", "/users/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "user not found");

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/users/{missing}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/users/{missing}"),
        Some(&token),
        Some(json!({ "name": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signup_reports_unknown_gender_per_field() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/users/signup",
        None,
        Some(json!({
            "name": "Ann",
            "email": "ann@example.com",
            "password": "secret1",
            "gender": "male",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["errors"]["gender"], "Gender must be either Male or Female");
}

#[tokio::test]
async fn signup_password_is_trimmed() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "name": "Ann", "email": "ann@example.com", "password": " secret1 " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    login(&app, "ann@example.com", "secret1").await;
}
