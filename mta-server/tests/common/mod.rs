//! Shared helpers for mta-server integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use mta_common::db::RuntimeSettings;
use mta_common::webhook::calculate_signature;
use mta_common::Role;
use mta_server::AppState;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const PASSWORD: &str = "masaj2024";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: SqlitePool,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_state(|state| state).await
    }

    /// Build the app after `configure` adds optional integrations
    pub async fn with_state(configure: impl FnOnce(AppState) -> AppState) -> Self {
        let pool = mta_common::db::connect_in_memory()
            .await
            .expect("Failed to create in-memory database");
        let settings = RuntimeSettings::load(&pool).await.expect("Failed to load settings");
        let state = configure(AppState::new(pool.clone(), settings).with_webhook_secret(WEBHOOK_SECRET));
        let router = mta_server::build_router(state.clone());
        Self { router, state, pool }
    }

    /// Send a request, returning status and JSON body (`Null` when empty)
    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, token, Some(body)).await
    }

    /// Register a student; returns (token, user id)
    pub async fn student(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({"email": email, "password": PASSWORD, "display_name": "Student"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Register a user and promote them to admin; returns (token, user id)
    pub async fn admin(&self, email: &str) -> (String, String) {
        let (token, id) = self.student(email).await;
        mta_server::db::users::set_role(&self.pool, &id, Role::Admin).await.unwrap();
        (token, id)
    }

    /// A category and a published topic at `access_level`; returns the topic id
    pub async fn published_topic(&self, admin_token: &str, access_level: &str) -> String {
        let (status, category) = self
            .post(
                "/api/categories",
                Some(admin_token),
                json!({"name": {"ru": "Техники", "ro": "Tehnici"}}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", category);

        let (status, topic) = self
            .post(
                "/api/topics",
                Some(admin_token),
                json!({
                    "category_id": category["id"],
                    "title": {"ru": "Шведский массаж", "ro": "Masaj suedez"},
                    "summary": {"ru": "Основы", "ro": "Bazele"},
                    "body": {"ru": "Полный текст", "ro": "Text complet"},
                    "access_level": access_level
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", topic);
        let id = topic["id"].as_str().unwrap().to_string();

        let (status, _) = self
            .post(&format!("/api/topics/{}/publish", id), Some(admin_token), json!({"published": true}))
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    /// Payment notice as the provider would send it
    pub fn signed_notice(order_reference: &str, status: &str, secret: &str) -> Value {
        let mut body = json!({
            "order_reference": order_reference,
            "status": status,
            "provider_reference": "PAYID-42",
            "timestamp": mta_common::time::now_ms(),
            "signature": ""
        });
        body["signature"] = Value::String(calculate_signature(&body, secret));
        body
    }

    /// Check out `plan` and settle it through the webhook; returns the settlement
    pub async fn buy_plan(&self, token: &str, plan: &str) -> Value {
        let (status, payment) = self
            .post("/api/subscriptions/checkout", Some(token), json!({"plan_id": plan, "provider": "maib"}))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", payment);

        let reference = payment["order_reference"].as_str().unwrap();
        let (status, settled) = self
            .post("/api/payments/webhook", None, Self::signed_notice(reference, "paid", WEBHOOK_SECRET))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", settled);
        settled
    }

    /// Log in again with the shared test password
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .post("/api/auth/login", None, json!({"email": email, "password": PASSWORD}))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }
}
