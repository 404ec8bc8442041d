#![allow(dead_code)]

use accounts::{app::build_app, state::AppState};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // For oneshot()

pub fn app() -> Router {
    build_app(AppState::fake())
}

// Helper to parse JSON response body
pub async fn json_body(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response.into_body()).await)
}

/// Registers a user and returns `(id, signup token)`.
pub async fn signup(app: &Router, name: &str, email: &str, gender: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": "secret1", "gender": gender })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    (
        body["user"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

/// Logs in and returns `(access, refresh)`.
pub async fn login(app: &Router, email: &str, password: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}
