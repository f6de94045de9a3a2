//! Integration tests: class schedule and registrations

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use serde_json::{json, Value};

async fn create_event(app: &TestApp, admin: &str, starts_in: Duration, capacity: Option<i64>, access_level: &str) -> Value {
    let starts_at = Utc::now() + starts_in;
    let (status, event) = app
        .post(
            "/api/schedule",
            Some(admin),
            json!({
                "title": {"ru": "Практика", "ro": "Practică"},
                "starts_at": starts_at,
                "ends_at": starts_at + Duration::hours(2),
                "online_url": "https://meet.example/clasa",
                "capacity": capacity,
                "access_level": access_level
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", event);
    event
}

#[tokio::test]
async fn test_event_validation() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let starts_at = Utc::now() + Duration::days(1);

    let (status, _) = app
        .post(
            "/api/schedule",
            Some(&admin),
            json!({"title": {"ro": "Curs"}, "starts_at": starts_at, "ends_at": starts_at}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/schedule",
            Some(&admin),
            json!({
                "title": {"ro": "Curs"},
                "starts_at": starts_at,
                "ends_at": starts_at + Duration::hours(1),
                "capacity": 0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_registration_and_capacity() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (ana, _) = app.student("ana@example.com").await;
    let (ion, _) = app.student("ion@example.com").await;
    let event = create_event(&app, &admin, Duration::days(2), Some(1), "free").await;
    let uri = format!("/api/schedule/{}/register", event["id"].as_str().unwrap());

    let (status, body) = app.post(&uri, Some(&ana), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registered"], true);
    assert_eq!(body["seats_taken"], 1);

    // Registering twice keeps the single seat
    let (status, body) = app.post(&uri, Some(&ana), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seats_taken"], 1);

    let (status, body) = app.post(&uri, Some(&ion), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = app.call("DELETE", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registered"], false);
    assert_eq!(body["seats_taken"], 0);

    let (status, _) = app.post(&uri, Some(&ion), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = app.get("/api/schedule", Some(&ion)).await;
    assert_eq!(listing[0]["registered"], true);
    assert_eq!(listing[0]["seats_taken"], 1);
}

#[tokio::test]
async fn test_started_event_closed() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;
    let event = create_event(&app, &admin, Duration::hours(-1), None, "free").await;

    let (status, _) = app
        .post(&format!("/api/schedule/{}/register", event["id"].as_str().unwrap()), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/schedule/missing/register", Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_locked_event_hides_link() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;
    let event = create_event(&app, &admin, Duration::days(1), None, "basic").await;

    let (status, listing) = app.get("/api/schedule", Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing[0]["locked"], true);
    assert!(listing[0].get("online_url").is_none());

    let (status, body) = app
        .post(&format!("/api/schedule/{}/register", event["id"].as_str().unwrap()), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "UPGRADE_REQUIRED");

    let (_, listing) = app.get("/api/schedule", Some(&admin)).await;
    assert_eq!(listing[0]["online_url"], "https://meet.example/clasa");

    let (status, _) = app.get("/api/schedule?from=2026-02-01T00:00:00Z&to=2026-01-01T00:00:00Z", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancelled_event_notifies_registrants() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;
    let event = create_event(&app, &admin, Duration::days(3), None, "free").await;
    let id = event["id"].as_str().unwrap();

    app.post(&format!("/api/schedule/{}/register", id), Some(&student), json!({})).await;

    let (status, _) = app.call("DELETE", &format!("/api/schedule/{}", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, inbox) = app.get("/api/notifications", Some(&student)).await;
    assert_eq!(inbox["total"], 1);
    assert_eq!(inbox["items"][0]["kind"], "schedule");

    let (_, listing) = app.get("/api/schedule", Some(&student)).await;
    assert!(listing.as_array().unwrap().is_empty());
}
