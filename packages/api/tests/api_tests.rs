// ABOUTME: Integration tests driving the HTTP surface end to end
// ABOUTME: In-memory SQLite, tempdir artifact store, no Docker daemon required

use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use botdock_api::{create_router, AppState};
use botdock_artifacts::ArtifactStore;
use botdock_auth::{Algorithm, AuthConfig};
use botdock_lifecycle::LifecycleManager;
use botdock_sandbox::SandboxDriver;
use botdock_storage::DbState;

struct TestApp {
    base: tempfile::TempDir,
    router: Router,
    state: AppState,
}

async fn setup() -> TestApp {
    let db = DbState::connect("sqlite::memory:").await.unwrap();
    db.plans.seed_defaults().await.unwrap();

    let base = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(base.path());
    let lifecycle = Arc::new(LifecycleManager::new(
        db.clone(),
        artifacts,
        Arc::new(SandboxDriver::new()),
    ));
    let auth = Arc::new(AuthConfig::new("test-secret", Algorithm::HS256, 60));

    let state = AppState::new(db, lifecycle, auth);
    let router = create_router(state.clone());

    TestApp {
        base,
        router,
        state,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn multipart_request(uri: &str, token: &str, filename: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "botdock-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}

async fn register(router: &Router, email: &str) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/auth/register",
            None,
            &json!({"email": email, "password": "password1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["access_token"].as_str().unwrap().to_string()
}

fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, data) in entries {
            writer
                .start_file(name.to_string(), zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

#[tokio::test]
async fn health_answers() {
    let app = setup().await;
    let (status, body) = send(&app.router, bare_request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn register_login_me_flow() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    // Duplicate registration conflicts
    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/auth/register",
            None,
            &json!({"email": "a@x.io", "password": "password1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Login works with the right password
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/auth/login",
            None,
            &json!({"email": "a@x.io", "password": "password1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");

    // And not with the wrong one
    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/auth/login",
            None,
            &json!({"email": "a@x.io", "password": "password2"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app.router, bare_request("GET", "/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@x.io");
    assert_eq!(body["role"], "USER");
}

#[tokio::test]
async fn register_validates_inputs() {
    let app = setup().await;

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/auth/register",
            None,
            &json!({"email": "not-an-email", "password": "password1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/auth/register",
            None,
            &json!({"email": "a@x.io", "password": "short"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bots_require_authentication() {
    let app = setup().await;
    let (status, _) = send(&app.router, bare_request("GET", "/bots", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_bot_and_list() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "echo", "runtime": "python"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "echo");
    assert_eq!(body["runtime"], "python");
    assert_eq!(body["status"], "CREATED");
    // The container handle never appears in a view
    assert!(body.get("container_id").is_none());

    let (status, body) = send(&app.router, bare_request("GET", "/bots", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["bots"][0]["name"], "echo");
}

#[tokio::test]
async fn unknown_runtime_is_rejected() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "rbbot", "runtime": "ruby"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Unsupported runtime"));
}

#[tokio::test]
async fn bot_name_boundaries() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let too_long = "a".repeat(51);
    let max_len = "a".repeat(50);
    for (name, expected) in [
        ("ab", StatusCode::BAD_REQUEST),
        (too_long.as_str(), StatusCode::BAD_REQUEST),
        (max_len.as_str(), StatusCode::CREATED),
    ] {
        let (status, _) = send(
            &app.router,
            json_request(
                "POST",
                "/bots",
                Some(&token),
                &json!({"name": name, "runtime": "python", "plan_id": 3}),
            ),
        )
        .await;
        assert_eq!(status, expected, "name: {}", name);
    }
}

#[tokio::test]
async fn dangerous_start_command_is_rejected() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "bad", "runtime": "python",
                    "start_cmd": "python main.py; rm -rf /"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn free_plan_quota_conflicts_on_second_bot() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "first", "runtime": "python"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "second", "runtime": "python"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Bot limit reached"));
}

#[tokio::test]
async fn cross_tenant_delete_is_forbidden() {
    let app = setup().await;
    let owner = register(&app.router, "a@x.io").await;
    let intruder = register(&app.router, "b@x.io").await;

    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&owner),
            &json!({"name": "mine", "runtime": "python"}),
        ),
    )
    .await;
    let bot_id = body["id"].as_i64().unwrap();

    let (status, _) = send(
        &app.router,
        bare_request("DELETE", &format!("/bots/{}", bot_id), Some(&intruder)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Still visible to its owner
    let (_, body) = send(&app.router, bare_request("GET", "/bots", Some(&owner))).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn start_without_files_is_rejected() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "empty", "runtime": "python"}),
        ),
    )
    .await;
    let bot_id = body["id"].as_i64().unwrap();

    let (status, body) = send(
        &app.router,
        bare_request("POST", &format!("/bots/{}/start", bot_id), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("No files uploaded"));

    // State machine untouched
    let (_, body) = send(&app.router, bare_request("GET", "/bots", Some(&token))).await;
    assert_eq!(body["bots"][0]["status"], "CREATED");
}

#[tokio::test]
async fn upload_single_file() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "echo", "runtime": "python"}),
        ),
    )
    .await;
    let bot_id = body["id"].as_i64().unwrap();

    let (status, body) = send(
        &app.router,
        multipart_request(
            &format!("/bots/{}/upload", bot_id),
            &token,
            "main.py",
            b"print('hi')",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "main.py");
    assert_eq!(body["message"], "Files uploaded successfully");

    let (_, body) = send(&app.router, bare_request("GET", "/bots", Some(&token))).await;
    assert_eq!(body["bots"][0]["source_type"], "file");
}

#[tokio::test]
async fn upload_zip_with_traversal_member_is_rejected() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "trav", "runtime": "python"}),
        ),
    )
    .await;
    let bot_id = body["id"].as_i64().unwrap();

    let payload = make_zip(&[("../evil.py", b"boom".as_slice())]);
    let (status, body) = send(
        &app.router,
        multipart_request(&format!("/bots/{}/upload", bot_id), &token, "trav.zip", &payload),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid file path"));

    // Nothing was written into the bot's artifact directory
    let bot_dir = app.base.path().join(bot_id.to_string());
    let entries: Vec<_> = std::fs::read_dir(&bot_dir).unwrap().collect();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn upload_zip_with_disallowed_extension_is_rejected() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "shelly", "runtime": "python"}),
        ),
    )
    .await;
    let bot_id = body["id"].as_i64().unwrap();

    let payload = make_zip(&[
        ("main.py", b"print('hi')".as_slice()),
        ("run.sh", b"#!/bin/sh".as_slice()),
    ]);
    let (status, body) = send(
        &app.router,
        multipart_request(&format!("/bots/{}/upload", bot_id), &token, "code.zip", &payload),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains(".sh"));
}

#[tokio::test]
async fn delete_bot_answers_no_content() {
    let app = setup().await;
    let token = register(&app.router, "a@x.io").await;

    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/bots",
            Some(&token),
            &json!({"name": "gone", "runtime": "python"}),
        ),
    )
    .await;
    let bot_id = body["id"].as_i64().unwrap();

    let (status, _) = send(
        &app.router,
        bare_request("DELETE", &format!("/bots/{}", bot_id), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app.router, bare_request("GET", "/bots", Some(&token))).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn admin_surface_requires_the_role() {
    let app = setup().await;
    let user_token = register(&app.router, "user@x.io").await;

    let (status, _) = send(
        &app.router,
        bare_request("GET", "/admin/users", Some(&user_token)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promote a second account to ADMIN directly in the store
    let admin_token = register(&app.router, "admin@x.io").await;
    sqlx::query("UPDATE users SET role = 'ADMIN' WHERE email = 'admin@x.io'")
        .execute(&app.state.db.pool)
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        bare_request("GET", "/admin/users", Some(&admin_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn suspended_users_are_locked_out() {
    let app = setup().await;
    let user_token = register(&app.router, "user@x.io").await;
    let admin_token = register(&app.router, "admin@x.io").await;
    sqlx::query("UPDATE users SET role = 'ADMIN' WHERE email = 'admin@x.io'")
        .execute(&app.state.db.pool)
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        bare_request("POST", "/admin/users/1/suspend", Some(&admin_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("suspended"));

    // Existing token stops working
    let (status, _) = send(&app.router, bare_request("GET", "/bots", Some(&user_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Login is refused
    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/auth/login",
            None,
            &json!({"email": "user@x.io", "password": "password1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reactivation restores access
    let (status, _) = send(
        &app.router,
        bare_request("POST", "/admin/users/1/activate", Some(&admin_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, bare_request("GET", "/bots", Some(&user_token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_cannot_suspend_admin() {
    let app = setup().await;
    register(&app.router, "first@x.io").await;
    let a1 = register(&app.router, "a1@x.io").await;
    register(&app.router, "a2@x.io").await;
    sqlx::query("UPDATE users SET role = 'ADMIN' WHERE email IN ('a1@x.io', 'a2@x.io')")
        .execute(&app.state.db.pool)
        .await
        .unwrap();

    let (status, _) = send(
        &app.router,
        bare_request("POST", "/admin/users/3/suspend", Some(&a1)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // OWNER may
    sqlx::query("UPDATE users SET role = 'OWNER' WHERE email = 'a1@x.io'")
        .execute(&app.state.db.pool)
        .await
        .unwrap();
    let (status, _) = send(
        &app.router,
        bare_request("POST", "/admin/users/3/suspend", Some(&a1)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
