#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::app::auth::AuthService;
use yatube::app::groups::GroupService;
use yatube::app::posts::PostService;
use yatube::config::AppConfig;
use yatube::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const TEST_PASETO_ACCESS_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";
pub const DEFAULT_PASSWORD: &str = "testpassword123";
pub const UPLOAD_MAX_BYTES: usize = 64 * 1024;

/// 2x1 GIF used for upload tests.
pub const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\
\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\
\x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";

const BOUNDARY: &str = "yatube-test-boundary";

// ---------------------------------------------------------------------------
// TestApp: one in-memory database and media root per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    media_root: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    location: Option<String>,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn body(&self) -> &[u8] {
        &self.body_bytes
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub access_token: String,
}

/// Multipart form part.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub async fn app() -> TestApp {
    TestApp::setup().await
}

impl TestApp {
    async fn setup() -> Self {
        let media_root = tempfile::tempdir().expect("cannot create media root");

        let config = AppConfig {
            http_addr: "127.0.0.1:0".into(),
            database_url: "sqlite::memory:".into(),
            db_max_connections: 1,
            db_connect_timeout_seconds: 30,
            media_root: media_root.path().to_path_buf(),
            upload_max_bytes: UPLOAD_MAX_BYTES,
            index_cache_ttl_seconds: 20,
            admin_token: Some(TEST_ADMIN_TOKEN.into()),
            paseto_access_key: TEST_PASETO_ACCESS_KEY,
            access_ttl_minutes: 60,
        };

        let state = AppState::from_config(&config)
            .await
            .expect("failed to build AppState");
        let router = yatube::http::router(state.clone());

        TestApp {
            router,
            state,
            media_root,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<(String, Vec<u8>)>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }

        let request = match body {
            Some((content_type, bytes)) => builder
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(bytes))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            location,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let body = ("application/json".to_string(), body.to_string().into_bytes());
        self.request(Method::POST, path, Some(body), token).await
    }

    /// POST as `application/x-www-form-urlencoded`.
    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        token: Option<&str>,
    ) -> TestResponse {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish();
        let body = (
            "application/x-www-form-urlencoded".to_string(),
            encoded.into_bytes(),
        );
        self.request(Method::POST, path, Some(body), token).await
    }

    /// POST as `multipart/form-data`.
    pub async fn post_multipart(
        &self,
        path: &str,
        parts: &[Part<'_>],
        token: Option<&str>,
    ) -> TestResponse {
        let mut bytes = Vec::new();
        for part in parts {
            bytes.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    bytes.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    bytes.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    data,
                } => {
                    bytes.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: {}\r\n\r\n",
                            name, file_name, content_type
                        )
                        .as_bytes(),
                    );
                    bytes.extend_from_slice(data);
                }
            }
            bytes.extend_from_slice(b"\r\n");
        }
        bytes.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        self.request(Method::POST, path, Some((content_type, bytes)), token)
            .await
    }

    pub async fn delete_admin(&self, path: &str, admin_token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(t) = admin_token {
            builder = builder.header("x-admin-token", t);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_admin(
        &self,
        path: &str,
        body: Value,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = admin_token {
            builder = builder.header("x-admin-token", t);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();
        TestResponse {
            status,
            location,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Insert a user directly and issue a token for it. The password hash is
    /// left empty, so these users cannot log in with a password.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password_hash) VALUES (?1, '') RETURNING id",
        )
        .bind(username)
        .fetch_one(self.pool())
        .await
        .expect("insert test user failed");

        let auth = AuthService::new(
            self.state.db.clone(),
            self.state.paseto_access_key,
            self.state.access_ttl_minutes,
        );
        let token = auth.issue_access_token(id).expect("issue token failed");

        TestUser {
            id,
            username: username.to_string(),
            access_token: token.token,
        }
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> i64 {
        GroupService::new(self.state.db.clone())
            .create_group(title.into(), slug.into(), format!("{} description", title))
            .await
            .expect("insert test group failed")
            .id
    }

    pub async fn create_post(&self, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        PostService::new(self.state.db.clone())
            .create_post(author_id, text.into(), group_id, None)
            .await
            .expect("insert test post failed")
            .id
    }

    pub async fn follow(&self, user_id: i64, author_id: i64) {
        sqlx::query("INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(author_id)
            .execute(self.pool())
            .await
            .expect("insert follow failed");
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.pool())
            .await
            .expect("count failed")
    }

    pub async fn post_text(&self, post_id: i64) -> Option<String> {
        sqlx::query_scalar("SELECT text FROM posts WHERE id = ?1")
            .bind(post_id)
            .fetch_optional(self.pool())
            .await
            .expect("select post failed")
    }

    pub async fn post_image(&self, post_id: i64) -> Option<String> {
        sqlx::query_scalar::<_, Option<String>>("SELECT image FROM posts WHERE id = ?1")
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .expect("select post image failed")
    }

    /// Return the pool for direct DB assertions.
    pub fn pool(&self) -> &SqlitePool {
        self.state.db.pool()
    }

    pub fn media_root(&self) -> &std::path::Path {
        self.media_root.path()
    }
}
