//! Tests for the session cookie endpoints and the authorization gate

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use recommender::config::Config;
use recommender::database::{init_db, Collection, Document, Filter, FindOptions};
use recommender::middleware::AuthUser;
use recommender::query_service::QueryService;
use recommender::recommendation_service::RecommendationService;
use recommender::route::create_app;
use recommender::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        database_path: String::new(),
        token_secret: "test-secret".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        production: false,
    }
}

fn setup_test_app() -> (axum::Router, AppState, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let store = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");
    let state = AppState::new(store, test_config());
    (create_app(state.clone()), state, temp_db)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

fn cookie_for(state: &AppState, email: &str) -> String {
    format!("token={}", state.tokens.issue(email).unwrap())
}

fn add_query_request(cookie: Option<&str>, owner: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/add-query")
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(
            json!({"userEmail": owner, "productName": "Phone"}).to_string(),
        ))
        .unwrap()
}

fn query_count(state: &AppState) -> u64 {
    state.store.count(Collection::Queries, &Filter::new()).unwrap()
}

#[tokio::test]
async fn test_welcome() {
    let (app, _state, _temp_db) = setup_test_app();

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"welcome!");
}

#[tokio::test]
async fn test_issue_token_sets_http_only_cookie() {
    let (app, state, _temp_db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/jwt")
                .header("content-type", "application/json")
                .body(Body::from(json!({"email": "a@b.com"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=21600"));

    let token = cookie
        .strip_prefix("token=")
        .and_then(|rest| rest.split(';').next())
        .unwrap();
    assert_eq!(state.tokens.verify(token).unwrap(), "a@b.com");

    let body = response_json(response.into_body()).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_clear_token_expires_cookie() {
    let (app, _state, _temp_db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/clear-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_gate_rejects_missing_cookie_without_writing() {
    let (app, state, _temp_db) = setup_test_app();

    let response = app
        .oneshot(add_query_request(None, "a@b.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "unauthorized access");
    assert_eq!(query_count(&state), 0);
}

#[tokio::test]
async fn test_gate_rejects_invalid_and_expired_tokens_alike() {
    let (app, state, _temp_db) = setup_test_app();

    let expired = state
        .tokens
        .issue_at("a@b.com", Utc::now() - Duration::hours(7))
        .unwrap();
    let cookies = [
        "token=garbage".to_string(),
        format!("token={}", expired),
        "other=value".to_string(),
    ];

    let mut bodies = Vec::new();
    for cookie in &cookies {
        let response = app
            .clone()
            .oneshot(add_query_request(Some(cookie), "a@b.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(response_json(response.into_body()).await);
    }

    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(query_count(&state), 0);
}

#[tokio::test]
async fn test_ownership_mismatch_is_forbidden_without_writing() {
    let (app, state, _temp_db) = setup_test_app();
    let cookie = cookie_for(&state, "a@b.com");

    let response = app
        .oneshot(add_query_request(Some(&cookie), "c@d.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(query_count(&state), 0);
}

#[tokio::test]
async fn test_jwt_then_my_queries_scenario() {
    let (app, _state, _temp_db) = setup_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/jwt")
                .header("content-type", "application/json")
                .body(Body::from(json!({"email": "a@b.com"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(add_query_request(Some(&cookie), "a@b.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/my-queries?userEmail=a@b.com")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    let queries = body.as_array().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["userEmail"], "a@b.com");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/my-queries?userEmail=c@d.com")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_routes_need_no_cookie() {
    let (app, _state, _temp_db) = setup_test_app();

    for uri in ["/all-queries", "/recent-queries", "/query-comments"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn snapshot(state: &AppState) -> (Vec<Document>, Vec<Document>) {
    let all = FindOptions::default();
    (
        state.store.find(Collection::Queries, &Filter::new(), &all).unwrap(),
        state
            .store
            .find(Collection::Recommendations, &Filter::new(), &all)
            .unwrap(),
    )
}

#[tokio::test]
async fn test_every_protected_route_rejects_missing_and_expired_sessions() {
    let (app, state, _temp_db) = setup_test_app();

    let alice = AuthUser {
        email: "a@b.com".to_string(),
    };
    let bob = AuthUser {
        email: "bob@x.com".to_string(),
    };
    let query_id = QueryService::new(&state.store)
        .create(&alice, object(json!({"userEmail": "a@b.com", "productName": "Phone"})))
        .unwrap()
        .inserted_id;
    let rec_id = RecommendationService::new(&state.store)
        .create(
            &bob,
            object(json!({"queryId": query_id, "recommenderEmail": "bob@x.com"})),
        )
        .unwrap()
        .inserted_id;

    let before = snapshot(&state);
    assert_eq!(before.0[0]["recommendationCount"], 1);

    let routes: Vec<(&str, String, Option<Value>)> = vec![
        ("GET", "/my-queries?userEmail=a@b.com".to_string(), None),
        ("GET", "/all-recommendations?email=a@b.com".to_string(), None),
        (
            "POST",
            "/add-query".to_string(),
            Some(json!({"userEmail": "a@b.com"})),
        ),
        (
            "POST",
            "/add-recommendation".to_string(),
            Some(json!({"queryId": query_id, "recommenderEmail": "bob@x.com"})),
        ),
        (
            "PATCH",
            format!("/update-query?id={}&email=a@b.com", query_id),
            Some(json!({"productName": "Changed"})),
        ),
        (
            "DELETE",
            format!("/delete-query/{}?email=a@b.com", query_id),
            None,
        ),
        (
            "DELETE",
            format!("/delete-recommendation?id={}&email=bob@x.com", rec_id),
            None,
        ),
        (
            "DELETE",
            format!("/delete-recommendation/{}?email=bob@x.com", rec_id),
            None,
        ),
    ];

    let expired = format!(
        "token={}",
        state
            .tokens
            .issue_at("a@b.com", Utc::now() - Duration::hours(7))
            .unwrap()
    );

    for (method, uri, body) in &routes {
        for cookie in [None, Some(expired.as_str())] {
            let mut builder = Request::builder().method(*method).uri(uri.as_str());
            if let Some(cookie) = cookie {
                builder = builder.header(header::COOKIE, cookie);
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(
                response.status(),
                StatusCode::UNAUTHORIZED,
                "{} {} (cookie: {})",
                method,
                uri,
                cookie.is_some()
            );
            let body = response_json(response.into_body()).await;
            assert_eq!(body["error"], "Unauthorized");
        }
    }

    assert_eq!(snapshot(&state), before);
}

#[tokio::test]
async fn test_issue_token_without_json_content_type_is_json_error() {
    let (app, _state, _temp_db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/jwt")
                .body(Body::from(json!({"email": "a@b.com"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "BadRequest");
    assert!(body["message"].as_str().unwrap().contains("Content-Type"));
}
