//! Integration tests: periodic maintenance pass

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use mta_common::db::settings::{set_setting, CHAT_MAX_MESSAGE_LEN};
use mta_server::services::maintenance::run_once;
use serde_json::{json, Value};

async fn unread(app: &TestApp, token: &str) -> i64 {
    let (_, body) = app.get("/api/notifications/unread-count", Some(token)).await;
    body["unread"].as_i64().unwrap()
}

#[tokio::test]
async fn test_expiry_flips_status_and_notifies_once() {
    let app = TestApp::new().await;
    let (ana, _) = app.student("ana@example.com").await;
    let (ion, _) = app.student("ion@example.com").await;
    app.buy_plan(&ana, "basic-monthly").await;
    app.buy_plan(&ion, "basic-monthly").await;
    let (status, _) = app.post("/api/subscriptions/me/cancel", Some(&ion), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // Nothing is due yet
    let report = run_once(&app.state, Utc::now()).await.unwrap();
    assert_eq!(report.subscriptions_expired, 0);

    let later = Utc::now() + Duration::days(31);
    let report = run_once(&app.state, later).await.unwrap();
    assert_eq!(report.subscriptions_expired, 2);
    // Both 30-day sessions lapsed too
    assert_eq!(report.sessions_removed, 2);

    let report = run_once(&app.state, later).await.unwrap();
    assert_eq!(report.subscriptions_expired, 0);

    for email in ["ana@example.com", "ion@example.com"] {
        let token = app.login(email).await;
        let (_, mine) = app.get("/api/subscriptions/me", Some(&token)).await;
        assert_eq!(mine["effective_tier"], "free");
        assert_eq!(mine["history"][0]["status"], "expired");
        assert!(mine["active"].as_array().unwrap().is_empty());

        // Activation plus expiry, nothing more
        assert_eq!(unread(&app, &token).await, 2);
    }
}

async fn event_starting_in(app: &TestApp, admin: &str, minutes: i64) -> String {
    let starts_at = Utc::now() + Duration::minutes(minutes);
    let (status, event) = app
        .post(
            "/api/schedule",
            Some(admin),
            json!({
                "title": {"ru": "Занятие", "ro": "Curs"},
                "starts_at": starts_at,
                "ends_at": starts_at + Duration::hours(1)
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", event);
    event["id"].as_str().unwrap().to_string()
}

async fn register(app: &TestApp, token: &str, event_id: &str) {
    let (status, body) = app
        .post(&format!("/api/schedule/{}/register", event_id), Some(token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_reminders_sent_once_per_event() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com").await;
    let (ana, _) = app.student("ana@example.com").await;
    let (ion, _) = app.student("ion@example.com").await;

    let soon = event_starting_in(&app, &admin, 30).await;
    let later = event_starting_in(&app, &admin, 180).await;
    register(&app, &ana, &soon).await;
    register(&app, &ion, &soon).await;
    register(&app, &ana, &later).await;

    let now = Utc::now();
    let report = run_once(&app.state, now).await.unwrap();
    assert_eq!(report.reminders_sent, 2);

    let report = run_once(&app.state, now).await.unwrap();
    assert_eq!(report.reminders_sent, 0);

    // The second event enters the reminder window
    let report = run_once(&app.state, now + Duration::minutes(150)).await.unwrap();
    assert_eq!(report.reminders_sent, 1);

    let (_, inbox) = app.get("/api/notifications", Some(&ana)).await;
    let reminders: Vec<&Value> = inbox["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["kind"] == "schedule")
        .collect();
    assert_eq!(reminders.len(), 2);
    assert_eq!(unread(&app, &ion).await, 1);
}

#[tokio::test]
async fn test_settings_changes_picked_up() {
    let app = TestApp::new().await;
    let (ana, _) = app.student("ana@example.com").await;
    let (_, ion_id) = app.student("ion@example.com").await;
    let (_, conversation) = app.post("/api/conversations", Some(&ana), json!({"user_id": ion_id})).await;
    let uri = format!("/api/conversations/{}/messages", conversation["id"].as_str().unwrap());

    let report = run_once(&app.state, Utc::now()).await.unwrap();
    assert!(!report.settings_reloaded);

    set_setting(&app.pool, CHAT_MAX_MESSAGE_LEN, 5).await.unwrap();
    let (status, _) = app.post(&uri, Some(&ana), json!({"body": "Bună ziua"})).await;
    assert_eq!(status, StatusCode::CREATED);

    let report = run_once(&app.state, Utc::now()).await.unwrap();
    assert!(report.settings_reloaded);
    assert_eq!(app.state.settings().chat_max_message_len, 5);

    let (status, _) = app.post(&uri, Some(&ana), json!({"body": "Bună ziua"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
