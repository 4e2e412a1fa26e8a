#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use civic_portal::jwt::JwtConfig;
use civic_portal::storage::LocalDisk;
use civic_portal::utils::hash_password;
use civic_portal::{create_app_with, AppState};

pub const BOUNDARY: &str = "civicportaltestboundary";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub jwt: JwtConfig,
    pub upload_root: PathBuf,
    _dir: TempDir,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    let migrator = Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let upload_root = dir.path().join("uploads");
    let disk = LocalDisk::new(&upload_root).await?;
    let jwt = JwtConfig::new("test-secret", 1);

    let state = AppState::new(pool.clone(), jwt.clone(), Arc::new(disk), 2 * 1024 * 1024);
    let app = create_app_with(state);

    Ok(TestApp {
        app,
        pool,
        jwt,
        upload_root,
        _dir: dir,
    })
}

impl TestApp {
    /// Inserts a user and returns its id.
    pub async fn seed_user(&self, email: &str, role: &str, permissions: &[&str], active: bool) -> anyhow::Result<i64> {
        let now = chrono::Utc::now();
        let id = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role, permissions, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(email.split('@').next().unwrap_or(email))
        .bind(email)
        .bind(hash_password(PASSWORD)?)
        .bind(role)
        .bind(serde_json::to_string(permissions)?)
        .bind(active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub fn token(&self, user_id: i64) -> anyhow::Result<String> {
        Ok(self.jwt.encode(user_id)?)
    }

    /// Seeds a user and returns its bearer token.
    pub async fn login_as(&self, email: &str, role: &str, permissions: &[&str]) -> anyhow::Result<(i64, String)> {
        let id = self.seed_user(email, role, permissions, true).await?;
        Ok((id, self.token(id)?))
    }

    pub async fn send(&self, req: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, json))
    }

    pub async fn get(&self, uri: &str, token: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.send(authed(Request::builder().method("GET").uri(uri), token).body(Body::empty())?).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.send(authed(Request::builder().method("DELETE").uri(uri), token).body(Body::empty())?).await
    }

    pub async fn patch(&self, uri: &str, token: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.send(authed(Request::builder().method("PATCH").uri(uri), token).body(Body::empty())?).await
    }

    pub async fn json(&self, method: &str, uri: &str, token: &str, payload: Value) -> anyhow::Result<(StatusCode, Value)> {
        let req = authed(Request::builder().method(method).uri(uri), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload)?))?;
        self.send(req).await
    }

    pub async fn multipart(&self, method: &str, uri: &str, token: &str, form: Multipart) -> anyhow::Result<(StatusCode, Value)> {
        let req = authed(Request::builder().method(method).uri(uri), token)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(form.finish()))?;
        self.send(req).await
    }

    pub fn stored(&self, relative: &str) -> bool {
        self.upload_root.join(relative).exists()
    }

    /// Number of regular files anywhere under the upload root.
    pub fn stored_count(&self) -> usize {
        fn walk(dir: &Path) -> usize {
            let Ok(entries) = std::fs::read_dir(dir) else { return 0 };
            entries
                .flatten()
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() { walk(&path) } else { 1 }
                })
                .sum()
        }
        walk(&self.upload_root)
    }
}

fn authed(builder: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Hand-built multipart body.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

pub fn news_form(title: &str, category: &str) -> Multipart {
    Multipart::new()
        .text("title", title)
        .text("content", "Body text for the article.")
        .text("category", category)
}

pub fn assert_status(status: StatusCode, expected: StatusCode, body: &Value) {
    if status != expected {
        panic!("expected {}, got {}: {}", expected, status, body);
    }
}
