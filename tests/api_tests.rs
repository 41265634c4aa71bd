use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use userbase::config::Config;

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // Keep test hashing cheap; production defaults are much heavier.
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = userbase::api::create_app_state_from_config(config)
        .await
        .expect("Failed to create app state");
    userbase::api::router(state).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &Router, username: &str, email: &str, password: &str) -> (StatusCode, Value) {
    post_json(
        app,
        "/api/register",
        json!({ "username": username, "email": email, "password": password }),
    )
    .await
}

#[tokio::test]
async fn register_then_login_round_trips() {
    let app = spawn_app().await;

    let (status, body) = register(&app, "alice", "a@x.com", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"]["password_hash"].is_null());
    let registered_at = body["data"]["updated_at"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &app,
        "/api/login",
        json!({ "username": "alice", "password": "secret1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    // Login counts as an access-time touch.
    assert_ne!(body["data"]["updated_at"].as_str().unwrap(), registered_at);

    // Email works as the identifier too
    let (status, _) = post_json(
        &app,
        "/api/login",
        json!({ "username": "a@x.com", "password": "secret1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_failures_map_to_statuses() {
    let app = spawn_app().await;

    register(&app, "alice", "a@x.com", "secret1").await;

    let (status, _) = post_json(
        &app,
        "/api/login",
        json!({ "username": "alice", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        "/api/login",
        json!({ "username": "nobody", "password": "secret1" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&app, "/api/login", json!({ "username": "alice" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_enforces_validation_order() {
    let app = spawn_app().await;

    let (status, body) = post_json(
        &app,
        "/api/register",
        json!({ "username": "alice", "password": "secret1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("email"));

    let (status, _) = register(&app, "alice", "a@x.com", "short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    register(&app, "alice", "a@x.com", "secret1").await;

    let (status, body) = register(&app, "alice", "b@x.com", "secret2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Username"));

    let (status, body) = register(&app, "bob", "a@x.com", "secret2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Email"));
}

#[tokio::test]
async fn email_is_normalized_before_storage() {
    let app = spawn_app().await;

    let (status, body) = register(&app, "carol", "  Carol@X.Com ", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "carol@x.com");

    // Normalized duplicate is rejected
    let (status, _) = register(&app, "carol2", "CAROL@x.com", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn seeded_accounts_can_log_in() {
    let app = spawn_app().await;

    let (status, body) = post_json(
        &app,
        "/api/login",
        json!({ "username": "admin", "password": "admin123" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");

    let (status, body) = post_json(
        &app,
        "/api/login",
        json!({ "username": "user", "password": "password" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "user");
}

#[tokio::test]
async fn user_crud_flow() {
    let app = spawn_app().await;

    let (_, body) = register(&app, "dave", "d@x.com", "secret1").await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = request(&app, "GET", &format!("/api/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "dave");

    let (status, _) = request(&app, "GET", "/api/users/99999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/users/{id}"),
        Some(json!({ "email": "dave@new.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "dave@new.com");

    // Changing a field to its current value is not a collision
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/users/{id}"),
        Some(json!({ "username": "dave" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Colliding with another account is
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/users/{id}"),
        Some(json!({ "username": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/users/{id}"),
        Some(json!({ "email": "admin@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Email"));

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/users/{id}"),
        Some(json!({ "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(&app, "DELETE", &format!("/api/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted_user_id"].as_i64().unwrap(), id);

    let (status, _) = request(&app, "DELETE", &format!("/api/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_role_is_ignored_not_rejected() {
    let app = spawn_app().await;

    let (_, body) = register(&app, "erin", "e@x.com", "secret1").await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/users/{id}"),
        Some(json!({ "role": "superuser" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "user");

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/users/{id}"),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn last_admin_cannot_be_deleted() {
    let app = spawn_app().await;

    // The seeded admin is the only one
    let (status, body) = request(&app, "GET", "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    let admin_id = body["data"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["role"] == "admin")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let (status, _) = request(&app, "DELETE", &format!("/api/users/{admin_id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Promote a second admin, then deletion succeeds
    let (_, body) = register(&app, "frank", "f@x.com", "secret1").await;
    let frank_id = body["data"]["id"].as_i64().unwrap();
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/users/{frank_id}"),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&app, "DELETE", &format!("/api/users/{admin_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    // The remaining admin is now the last one again
    let (status, _) = request(&app, "DELETE", &format!("/api/users/{frank_id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_users_by_substring() {
    let app = spawn_app().await;

    register(&app, "grace", "g@x.com", "secret1").await;

    let (status, body) = request(&app, "GET", "/api/users/search?q=rac", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["users"][0]["username"], "grace");

    // Matches the email column too
    let (status, body) = request(&app, "GET", "/api/users/search?q=g@x", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);

    let (status, _) = request(&app, "GET", "/api/users/search?q=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&app, "GET", "/api/users/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_and_recent_results_are_capped() {
    let app = spawn_app().await;

    for i in 0..25 {
        let (status, _) = register(
            &app,
            &format!("bulk{i:02}"),
            &format!("bulk{i:02}@x.com"),
            "secret1",
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // 25 accounts match, search returns at most 20
    let (status, body) = request(&app, "GET", "/api/users/search?q=bulk", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 20);
    assert_eq!(body["data"]["users"].as_array().unwrap().len(), 20);

    // Stats carry the full counts but only the 5 most recent accounts
    let (status, body) = request(&app, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_users"], 27);
    assert_eq!(body["data"]["recent_users"].as_array().unwrap().len(), 5);
    for user in body["data"]["recent_users"].as_array().unwrap() {
        assert!(user["username"].as_str().unwrap().starts_with("bulk"));
    }
}

#[tokio::test]
async fn stats_reflect_seed_and_registrations() {
    let app = spawn_app().await;

    register(&app, "alice", "a@x.com", "secret1").await;

    let (status, body) = request(&app, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_users"], 3);
    assert_eq!(body["data"]["admin_users"], 1);
    assert_eq!(body["data"]["regular_users"], 2);
    assert_eq!(body["data"]["recent_users"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn list_users_excludes_credentials() {
    let app = spawn_app().await;

    let (status, body) = request(&app, "GET", "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);
    for user in body["data"]["users"].as_array().unwrap() {
        assert!(user["password_hash"].is_null());
        assert!(user["password"].is_null());
    }
}

#[tokio::test]
async fn health_reports_store_connectivity() {
    let app = spawn_app().await;

    let (status, body) = request(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn unmatched_routes_return_json_404() {
    let app = spawn_app().await;

    let (status, body) = request(&app, "GET", "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
