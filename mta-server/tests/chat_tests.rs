//! Integration tests: conversations, notifications and announcements

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_open_direct_conversation() {
    let app = TestApp::new().await;
    let (ana, ana_id) = app.student("ana@example.com").await;
    let (ion, ion_id) = app.student("ion@example.com").await;

    let (status, _) = app.post("/api/conversations", Some(&ana), json!({"user_id": ana_id})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/conversations", Some(&ana), json!({"user_id": "nobody"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, first) = app.post("/api/conversations", Some(&ana), json!({"user_id": ion_id})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["kind"], "direct");
    assert_eq!(first["members"].as_array().unwrap().len(), 2);

    // Either side reopening gets the same conversation
    let (status, again) = app.post("/api/conversations", Some(&ion), json!({"user_id": ana_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], first["id"]);
}

#[tokio::test]
async fn test_messages_unread_and_notifications() {
    let app = TestApp::new().await;
    let (ana, _) = app.student("ana@example.com").await;
    let (ion, ion_id) = app.student("ion@example.com").await;
    let (_, conversation) = app.post("/api/conversations", Some(&ana), json!({"user_id": ion_id})).await;
    let id = conversation["id"].as_str().unwrap();
    let messages_uri = format!("/api/conversations/{}/messages", id);

    let (status, _) = app.post(&messages_uri, Some(&ana), json!({"body": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, message) = app.post(&messages_uri, Some(&ana), json!({"body": "  Bună, Ion!  "})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["body"], "Bună, Ion!");
    app.post(&messages_uri, Some(&ana), json!({"body": "Ai timp mâine?"})).await;

    let (_, history) = app.get(&messages_uri, Some(&ion)).await;
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (status, _) = app.get(&format!("{}?limit=0", messages_uri), Some(&ion)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.get("/api/conversations", Some(&ion)).await;
    assert_eq!(list[0]["unread_count"], 2);
    assert_eq!(list[0]["last_message"]["body"], "Ai timp mâine?");

    // The sender has nothing unread
    let (_, list) = app.get("/api/conversations", Some(&ana)).await;
    assert_eq!(list[0]["unread_count"], 0);

    let (status, read) = app.post(&format!("/api/conversations/{}/read", id), Some(&ion), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["conversation_id"], id);
    let (_, list) = app.get("/api/conversations", Some(&ion)).await;
    assert_eq!(list[0]["unread_count"], 0);

    // Each message left a notification for the recipient only
    let (_, inbox) = app.get("/api/notifications", Some(&ion)).await;
    assert_eq!(inbox["total"], 2);
    assert_eq!(inbox["items"][0]["kind"], "message");
    let (_, inbox) = app.get("/api/notifications", Some(&ana)).await;
    assert_eq!(inbox["total"], 0);
}

#[tokio::test]
async fn test_non_member_is_rejected() {
    let app = TestApp::new().await;
    let (ana, _) = app.student("ana@example.com").await;
    let (_, ion_id) = app.student("ion@example.com").await;
    let (eve, _) = app.student("eve@example.com").await;
    let (_, conversation) = app.post("/api/conversations", Some(&ana), json!({"user_id": ion_id})).await;
    let uri = format!("/api/conversations/{}/messages", conversation["id"].as_str().unwrap());

    let (status, _) = app.get(&uri, Some(&eve)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post(&uri, Some(&eve), json!({"body": "salut"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/conversations/missing/messages", Some(&eve)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_support_conversation_includes_admins() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com").await;
    let (student, _) = app.student("s@example.com").await;

    let (status, support) = app.post("/api/conversations/support", Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(support["kind"], "support");
    assert_eq!(support["members"].as_array().unwrap().len(), 2);

    let (status, again) = app.post("/api/conversations/support", Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], support["id"]);

    let (status, _) = app.post("/api/conversations/support", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.get("/api/conversations", Some(&admin)).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_notification_inbox_operations() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com").await;
    let (student, _) = app.student("s@example.com").await;

    let (status, _) = app
        .post(
            "/api/admin/announcements",
            Some(&student),
            json!({"title": {"ro": "Nu"}, "body": {"ro": "Nu"}}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/admin/announcements",
            Some(&admin),
            json!({"title": {"ro": "Anunț"}, "body": {"ro": "Text"}, "link": "javascript:alert(1)"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, sent) = app
        .post(
            "/api/admin/announcements",
            Some(&admin),
            json!({
                "title": {"ru": "Объявление", "ro": "Anunț"},
                "body": {"ru": "Новый курс", "ro": "Curs nou"},
                "link": "/topics"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["stored"], 2);
    assert_eq!(sent["delivered"], 0);

    let (_, count) = app.get("/api/notifications/unread-count", Some(&student)).await;
    assert_eq!(count["unread"], 1);

    let (_, inbox) = app.get("/api/notifications?unread_only=true", Some(&student)).await;
    let id = inbox["items"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(inbox["items"][0]["kind"], "system");
    assert_eq!(inbox["items"][0]["link"], "/topics");

    // Another user cannot touch it
    let (status, _) = app.post(&format!("/api/notifications/{}/read", id), Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, read) = app.post(&format!("/api/notifications/{}/read", id), Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(read["read_at"].is_string());

    let (_, count) = app.get("/api/notifications/unread-count", Some(&student)).await;
    assert_eq!(count["unread"], 0);

    let (_, all) = app.post("/api/notifications/read-all", Some(&admin), json!({})).await;
    assert_eq!(all["updated"], 1);

    let (status, _) = app.call("DELETE", &format!("/api/notifications/{}", id), Some(&student), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, inbox) = app.get("/api/notifications", Some(&student)).await;
    assert_eq!(inbox["total"], 0);
}

#[tokio::test]
async fn test_socket_requires_token_and_upgrade() {
    let app = TestApp::new().await;
    let (token, _) = app.student("s@example.com").await;

    let (status, _) = app.get("/ws", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/ws?token=bogus", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A valid token over plain HTTP is not an upgrade
    let (status, _) = app.get(&format!("/ws?token={}", token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
