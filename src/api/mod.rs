pub mod auth;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod users;

pub use state::AppState;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::files::MAX_UPLOAD_SIZE;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    database: bool,
}

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Public
        .route("/", get(auth::greeting))
        .route("/api/health", get(health))
        .route("/registration", post(auth::register))
        .route("/activate/{code}", get(auth::activate))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        // Feed
        .route("/main", get(messages::feed).post(messages::add_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/like", post(messages::like))
        .route(
            "/user-messages/{author}",
            get(messages::user_messages).post(messages::update_message),
        )
        // Accounts
        .route("/user", get(users::user_list).post(users::user_save))
        .route("/user/profile", get(users::get_profile).post(users::update_profile))
        .route("/user/{id}", get(users::user_edit_form))
        .route("/user/subscribe/{id}", post(users::subscribe))
        .route("/user/unsubscribe/{id}", post(users::unsubscribe))
        .route("/user/subscriptions/{id}/list", get(users::subscriptions))
        .route("/user/subscribers/{id}/list", get(users::subscribers))
        // Identity and route policy for everything above
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> axum::Json<HealthResponse> {
    let database = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    axum::Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::service::notify::testing::RecordingMailSender;

    async fn app() -> (Router, Arc<RecordingMailSender>) {
        let (app, sender, _) = app_with(Config::default()).await;
        (app, sender)
    }

    async fn app_with(config: Config) -> (Router, Arc<RecordingMailSender>, AppState) {
        let sender = Arc::new(RecordingMailSender::default());
        let state = AppState::with_mail_sender(test_pool().await, Arc::new(config), sender.clone());
        (create_router(state.clone()), sender, state)
    }

    /// Config whose uploads go to a fresh directory under the temp dir.
    fn upload_config() -> (Config, PathBuf) {
        let root = std::env::temp_dir().join(format!("sweeter-api-{}", uuid::Uuid::new_v4()));
        let config = Config {
            upload_path: root.clone(),
            ..Config::default()
        };
        (config, root)
    }

    fn files_in(root: &Path) -> Vec<String> {
        match std::fs::read_dir(root) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn multipart(uri: &str, token: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
        let boundary = "sweeter-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                     Content-Type: image/png\r\n\r\n",
                    boundary, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    /// Register, activate through the mailed link and log in.
    async fn signed_in(app: &Router, sender: &RecordingMailSender, username: &str) -> String {
        let (status, _) = send(
            app,
            json_request(
                Method::POST,
                "/registration",
                None,
                json!({
                    "username": username,
                    "password": "secret",
                    "password2": "secret",
                    "email": format!("{}@example.com", username),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let mail = sender.sent().pop().unwrap();
        let code = mail.body.rsplit("/activate/").next().unwrap().trim().to_string();
        let (status, _) = send(app, get(&format!("/activate/{}", code), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app,
            json_request(
                Method::POST,
                "/login",
                None,
                json!({ "username": username, "password": "secret" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["session_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_public_routes_need_no_session() {
        let (app, _) = app().await;

        let (status, body) = send(&app, get("/", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("Sweeter"));

        let (status, body) = send(&app, get("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let (app, _) = app().await;

        let (status, _) = send(&app, get("/main", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, get("/main", Some("not-a-session"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_registration_errors() {
        let (app, sender) = app().await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/registration",
                None,
                json!({ "username": "", "password": "a", "password2": "b", "email": "nope" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["username"].is_string());
        assert!(body["errors"]["password2"].is_string());
        assert!(body["errors"]["email"].is_string());

        signed_in(&app, &sender, "alice").await;
        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/registration",
                None,
                json!({ "username": "alice", "password": "x", "password2": "x" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_log_in() {
        let (app, _) = app().await;

        send(
            &app,
            json_request(
                Method::POST,
                "/registration",
                None,
                json!({ "username": "bob", "password": "pw", "password2": "pw", "email": "bob@example.com" }),
            ),
        )
        .await;

        let (status, _) = send(
            &app,
            json_request(Method::POST, "/login", None, json!({ "username": "bob", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            json_request(Method::POST, "/login", None, json!({ "username": "bob", "password": "bad" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, get("/activate/unknown-code", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_and_read_feed() {
        let (app, sender) = app().await;
        let token = signed_in(&app, &sender, "alice").await;

        let boundary = "sweeter-boundary";
        let form = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\nhello world\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"tag\"\r\n\r\nrust\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/main")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(form))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["text"], "hello world");
        assert_eq!(body["tag"], "rust");

        let (status, body) = send(&app, get("/main?filter=rust", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"]["total_elements"], 1);
        assert_eq!(body["page"]["content"][0]["author_name"], "alice");

        let (_, body) = send(&app, get("/main?filter=other", Some(&token))).await;
        assert_eq!(body["page"]["total_elements"], 0);
    }

    #[tokio::test]
    async fn test_user_admin_routes_need_admin() {
        let (app, sender) = app().await;
        let token = signed_in(&app, &sender, "alice").await;

        let (status, _) = send(&app, get("/user", Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, get("/user/profile", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let (app, sender) = app().await;
        let alice = signed_in(&app, &sender, "alice").await;
        let _bob = signed_in(&app, &sender, "bob").await;

        // bob was registered second
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/user/subscribe/2", Some(&alice), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subscribers_count"], 1);
        assert_eq!(body["is_subscriber"], true);

        let (_, body) = send(&app, get("/user/subscribers/2/list", Some(&alice))).await;
        assert_eq!(body["users"][0]["username"], "alice");

        let (_, body) = send(
            &app,
            json_request(Method::POST, "/user/unsubscribe/2", Some(&alice), json!({})),
        )
        .await;
        assert_eq!(body["subscribers_count"], 0);
        assert_eq!(body["is_subscriber"], false);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (app, sender) = app().await;
        let token = signed_in(&app, &sender, "alice").await;

        let (status, _) = send(&app, json_request(Method::POST, "/logout", Some(&token), json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, get("/main", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_huge_page_number_returns_empty_page() {
        let (app, sender) = app().await;
        let token = signed_in(&app, &sender, "alice").await;

        let uri = format!("/main?page={}", i64::MAX);
        let (status, body) = send(&app, get(&uri, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"]["number"], i64::MAX);
        assert_eq!(body["page"]["content"].as_array().unwrap().len(), 0);

        let uri = format!("/user-messages/1?page={}", i64::MAX);
        let (status, _) = send(&app, get(&uri, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_message_edit_is_author_only_and_stores_nothing_when_refused() {
        let (config, root) = upload_config();
        let (app, sender, _) = app_with(config).await;
        let alice = signed_in(&app, &sender, "alice").await;
        let bob = signed_in(&app, &sender, "bob").await;

        let (status, _) = send(
            &app,
            multipart("/main", &alice, &[("text", "original"), ("tag", "news")], None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // Someone else's message
        let (status, _) = send(
            &app,
            multipart(
                "/user-messages/1",
                &bob,
                &[("id", "1"), ("text", "hijacked"), ("tag", "")],
                Some(("evil.png", &b"evil"[..])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(files_in(&root).is_empty());

        // Text over the limit
        let long = "x".repeat(3000);
        let (status, body) = send(
            &app,
            multipart(
                "/user-messages/1",
                &alice,
                &[("id", "1"), ("text", &long), ("tag", "")],
                Some(("cat.png", &b"meow"[..])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["text"], "Message too long (more than 2kB)");
        assert!(files_in(&root).is_empty());

        // No id
        let (status, body) = send(
            &app,
            multipart("/user-messages/1", &alice, &[("text", "edited")], None),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["id"].is_string());

        let (status, body) = send(
            &app,
            multipart(
                "/user-messages/1",
                &alice,
                &[("id", "1"), ("text", "edited"), ("tag", " ")],
                Some(("cat.png", &b"meow"[..])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "edited");
        assert_eq!(body["tag"], "news");
        let stored = body["filename"].as_str().unwrap().to_string();
        assert!(stored.ends_with(".cat.png"));
        assert_eq!(files_in(&root), vec![stored]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_like_toggles() {
        let (app, sender) = app().await;
        let alice = signed_in(&app, &sender, "alice").await;
        let bob = signed_in(&app, &sender, "bob").await;
        send(&app, multipart("/main", &alice, &[("text", "like me")], None)).await;

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/messages/1/like", Some(&bob), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["liked"], true);

        let (_, body) = send(&app, get("/messages/1", Some(&bob))).await;
        assert_eq!(body["likes"], 1);
        assert_eq!(body["me_liked"], true);

        let (_, body) = send(
            &app,
            json_request(Method::POST, "/messages/1/like", Some(&bob), json!({})),
        )
        .await;
        assert_eq!(body["liked"], false);

        let (status, _) = send(
            &app,
            json_request(Method::POST, "/messages/99/like", Some(&bob), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_channel_page() {
        let (app, sender) = app().await;
        let alice = signed_in(&app, &sender, "alice").await;
        let bob = signed_in(&app, &sender, "bob").await;
        send(&app, multipart("/main", &alice, &[("text", "mine")], None)).await;
        send(&app, multipart("/main", &bob, &[("text", "theirs")], None)).await;

        let (status, body) = send(&app, get("/user-messages/1", Some(&alice))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channel_name"], "alice");
        assert_eq!(body["is_current_user"], true);
        assert_eq!(body["page"]["total_elements"], 1);
        assert_eq!(body["page"]["content"][0]["text"], "mine");

        send(&app, json_request(Method::POST, "/user/subscribe/1", Some(&bob), json!({}))).await;
        let (_, body) = send(&app, get("/user-messages/1", Some(&bob))).await;
        assert_eq!(body["is_current_user"], false);
        assert_eq!(body["stats"]["subscribers_count"], 1);
        assert_eq!(body["stats"]["is_subscriber"], true);

        let (status, _) = send(&app, get("/user-messages/42", Some(&bob))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_saves_user() {
        let (app, sender, state) = app_with(Config::default()).await;
        let admin = signed_in(&app, &sender, "alice").await;
        signed_in(&app, &sender, "bob").await;

        let alice = state.registry.require(1).await.unwrap();
        state
            .registry
            .set_roles_and_username(&alice, "alice", ["USER", "ADMIN"])
            .await
            .unwrap();

        let (status, body) = send(&app, get("/user", Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = send(&app, get("/user/2", Some(&admin))).await;
        assert_eq!(body["user"]["username"], "bob");
        assert_eq!(body["all_roles"], json!(["USER", "ADMIN"]));

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/user",
                Some(&admin),
                json!({ "user_id": 2, "username": "robert", "roles": ["USER", "BOGUS"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "robert");
        assert_eq!(body["roles"], json!(["USER"]));

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/user",
                Some(&admin),
                json!({ "user_id": 2, "username": "alice", "roles": ["USER"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/user",
                Some(&admin),
                json!({ "user_id": 2, "username": "robert", "roles": [] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["roles"].is_string());
    }
}
