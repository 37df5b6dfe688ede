//! Test harness driving the router in-process.
//!
//! Each `TestApp` owns a fresh SQLite file and a router over it. Requests go
//! through `tower::ServiceExt::oneshot`, so the full middleware stack runs
//! without binding a socket. A `Client` remembers its session cookie the way a
//! browser would.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use medibills_api::{ApiSettings, AppState, router};
use medibills_store::Database;
use medibills_test_utils::{
    TEST_SESSION_SECRET, TestDir, test_database_config, test_rate_limit_config,
    test_session_config,
};
use medibills_types::config::Environment;
use serde_json::{Value, json};
use tower::ServiceExt;

/// A router over a throwaway database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TestDir,
}

impl TestApp {
    /// Starts an app with a generous rate limit.
    pub async fn new() -> Self {
        Self::with_rate_limit(10_000).await
    }

    /// Starts an app allowing `max_requests` per client per minute.
    pub async fn with_rate_limit(max_requests: u64) -> Self {
        let dir = TestDir::new();
        let db = Database::open(&test_database_config(&dir)).await.unwrap();
        db.migrate().await.unwrap();

        let settings = ApiSettings::builder()
            .environment(Environment::Test)
            .session(test_session_config())
            .rate_limit(test_rate_limit_config(max_requests))
            .bcrypt_cost(4)
            .build();
        let state = AppState::new(db, TEST_SESSION_SECRET, settings).unwrap();
        state.health.mark_ready();
        Self { router: router(state.clone()), state, _dir: dir }
    }

    /// A client without a session.
    pub fn client(&self) -> Client {
        Client { router: self.router.clone(), cookie: None, forwarded_for: None }
    }

    /// Registers `username` and returns a logged-in client.
    pub async fn user(&self, username: &str) -> Client {
        let mut client = self.client();
        let response = client
            .post(
                "/auth/register",
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "Demo123!",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "register {username}: {}", response.body);
        client
    }
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `data` from the envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// `data.id` as a string.
    pub fn id(&self) -> String {
        self.body["data"]["id"].as_str().expect("response carries data.id").to_string()
    }

    /// The first `Set-Cookie` header, if any.
    pub fn set_cookie(&self) -> Option<&str> {
        self.headers.get(header::SET_COOKIE).and_then(|v| v.to_str().ok())
    }

    /// `(field, message)` pairs from a validation failure.
    pub fn details(&self) -> Vec<(String, String)> {
        self.body["details"]
            .as_array()
            .map(|details| {
                details
                    .iter()
                    .map(|d| {
                        (
                            d["field"].as_str().unwrap_or_default().to_string(),
                            d["message"].as_str().unwrap_or_default().to_string(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A cookie-carrying client.
#[derive(Clone)]
pub struct Client {
    router: Router,
    cookie: Option<String>,
    forwarded_for: Option<String>,
}

impl Client {
    /// Sends requests as coming from `ip`.
    pub fn from_ip(mut self, ip: &str) -> Self {
        self.forwarded_for = Some(ip.to_string());
        self
    }

    /// The current `name=value` cookie pair, if any.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Replaces the stored cookie pair.
    pub fn set_cookie(&mut self, cookie: Option<String>) {
        self.cookie = cookie;
    }

    pub async fn send(&mut self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(ip) = &self.forwarded_for {
            builder = builder.header("x-forwarded-for", ip);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        self.remember_cookie(&headers);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse { status, headers, body }
    }

    fn remember_cookie(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let pair = value.split(';').next().unwrap_or_default().trim();
            let removed = value.contains("Max-Age=0") || pair.ends_with('=');
            self.cookie = if removed { None } else { Some(pair.to_string()) };
        }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&mut self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None).await
    }

    pub async fn delete_with(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::DELETE, path, Some(body)).await
    }

    /// Creates a provider and returns its id.
    pub async fn provider(&mut self, name: &str) -> String {
        let response = self.post("/api/medical-providers", json!({ "name": name })).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.id()
    }

    /// Creates a bill for `provider` and returns its id.
    pub async fn bill(&mut self, provider: &str, total: Value) -> String {
        let response = self
            .post(
                "/api/medical-bills",
                json!({ "medicalProviderId": provider, "dateOfService": "2024-03-01", "total": total }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.id()
    }
}
