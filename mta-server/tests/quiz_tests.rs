//! Integration tests: quiz authoring, play and scoring

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

fn question(ro: &str, correct_index: usize) -> Value {
    json!({
        "prompt": {"ru": "Вопрос", "ro": ro},
        "options": [
            {"ru": "А", "ro": "A"},
            {"ru": "Б", "ro": "B"},
            {"ru": "В", "ro": "C"}
        ],
        "correct_index": correct_index,
        "explanation": {"ru": "Потому что", "ro": "Pentru că"}
    })
}

async fn create_quiz(app: &TestApp, admin: &str, access_level: &str) -> Value {
    let (status, quiz) = app
        .post(
            "/api/admin/quizzes",
            Some(admin),
            json!({
                "title": {"ru": "Анатомия спины", "ro": "Anatomia spatelui"},
                "access_level": access_level,
                "pass_percent": 60,
                "published": true,
                "questions": [question("Întrebarea 1", 0), question("Întrebarea 2", 1)]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", quiz);
    quiz
}

#[tokio::test]
async fn test_invalid_questions_rejected() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;

    let mut bad = question("Întrebare", 5);
    let (status, _) = app
        .post(
            "/api/admin/quizzes",
            Some(&admin),
            json!({"title": {"ro": "Test"}, "questions": [bad.clone()]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    bad["correct_index"] = json!(0);
    bad["options"] = json!([{"ro": "Singura"}]);
    let (status, _) = app
        .post(
            "/api/admin/quizzes",
            Some(&admin),
            json!({"title": {"ro": "Test"}, "questions": [bad]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_play_hides_answers() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;
    let quiz = create_quiz(&app, &admin, "free").await;
    let id = quiz["id"].as_str().unwrap();

    let (status, play) = app.get(&format!("/api/quizzes/{}/play", id), Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    let questions = play["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    for q in questions {
        assert!(q.get("correct_index").is_none());
        assert!(q.get("explanation").is_none());
        assert_eq!(q["options"].as_array().unwrap().len(), 3);
    }

    // Playing needs an account
    let (status, _) = app.get(&format!("/api/quizzes/{}/play", id), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_submit_scores_and_records_attempt() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;
    let quiz = create_quiz(&app, &admin, "free").await;
    let id = quiz["id"].as_str().unwrap();
    let first = quiz["questions"][0]["id"].as_str().unwrap();
    let second = quiz["questions"][1]["id"].as_str().unwrap();

    // One right, one wrong: 50% against a 60% pass mark
    let (status, result) = app
        .post(
            &format!("/api/quizzes/{}/attempts", id),
            Some(&student),
            json!({"answers": [
                {"question_id": first, "option_index": 0},
                {"question_id": second, "option_index": 2}
            ], "duration_secs": 42}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", result);
    assert_eq!(result["correct"], 1);
    assert_eq!(result["total"], 2);
    assert_eq!(result["percent"], 50);
    assert_eq!(result["passed"], false);
    assert_eq!(result["review"].as_array().unwrap().len(), 2);

    // Unanswered counts as wrong; duplicates keep the first answer
    let (_, result) = app
        .post(
            &format!("/api/quizzes/{}/attempts", id),
            Some(&student),
            json!({"answers": [
                {"question_id": first, "option_index": 0},
                {"question_id": first, "option_index": 2}
            ]}),
        )
        .await;
    assert_eq!(result["correct"], 1);

    let (_, result) = app
        .post(
            &format!("/api/quizzes/{}/attempts", id),
            Some(&student),
            json!({"answers": [
                {"question_id": first, "option_index": 0},
                {"question_id": second, "option_index": 1}
            ]}),
        )
        .await;
    assert_eq!(result["percent"], 100);
    assert_eq!(result["passed"], true);

    let (status, attempts) = app.get(&format!("/api/quizzes/{}/attempts", id), Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(attempts.as_array().unwrap().len(), 3);

    // Another student sees only their own attempts
    let (other, _) = app.student("other@example.com").await;
    let (_, attempts) = app.get(&format!("/api/quizzes/{}/attempts", id), Some(&other)).await;
    assert!(attempts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_answers_rejected() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;
    let quiz = create_quiz(&app, &admin, "free").await;
    let id = quiz["id"].as_str().unwrap();
    let first = quiz["questions"][0]["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            &format!("/api/quizzes/{}/attempts", id),
            Some(&student),
            json!({"answers": [{"question_id": "nope", "option_index": 0}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/api/quizzes/{}/attempts", id),
            Some(&student),
            json!({"answers": [{"question_id": first, "option_index": 9}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_locked_quiz_requires_upgrade() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;
    let quiz = create_quiz(&app, &admin, "premium").await;
    let id = quiz["id"].as_str().unwrap();

    let (_, list) = app.get("/api/quizzes", Some(&student)).await;
    assert_eq!(list[0]["locked"], true);
    assert_eq!(list[0]["question_count"], 2);

    let (status, body) = app.get(&format!("/api/quizzes/{}/play", id), Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "UPGRADE_REQUIRED");

    let (status, _) = app.get(&format!("/api/quizzes/{}/play", id), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unpublished_quiz_hidden() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("a@example.com").await;
    let (student, _) = app.student("s@example.com").await;

    let (_, quiz) = app
        .post(
            "/api/admin/quizzes",
            Some(&admin),
            json!({"title": {"ro": "Ciornă"}, "questions": [question("Întrebare", 0)]}),
        )
        .await;
    assert_eq!(quiz["published"], false);
    let id = quiz["id"].as_str().unwrap();

    let (status, _) = app.get(&format!("/api/quizzes/{}/play", id), Some(&student)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.get("/api/quizzes", Some(&student)).await;
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = app.call("DELETE", &format!("/api/admin/quizzes/{}", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/admin/quizzes/{}", id), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
