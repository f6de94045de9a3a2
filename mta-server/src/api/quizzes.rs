//! Quiz endpoints: authoring, play and attempts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use mta_common::{LocalizedText, Tier};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{AdminUser, CurrentUser, Viewer};
use super::require_text;
use crate::db::quizzes::{self, Attempt, NewAttempt, Question, QuestionInput, Quiz, QuizInput, ReviewItem};
use crate::db::topics::{self, Origin};
use crate::error::{ApiError, ApiResult};
use crate::services::access;
use crate::services::quiz_engine::{self, Answer, PlayView};
use crate::AppState;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 8;

#[derive(Debug, Serialize)]
pub struct QuizListItem {
    pub id: String,
    pub topic_id: Option<String>,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub access_level: Tier,
    pub pass_percent: u8,
    pub published: bool,
    pub question_count: i64,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuizQuery {
    pub topic_id: Option<String>,
}

/// GET /api/quizzes
pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<QuizQuery>,
) -> ApiResult<Json<Vec<QuizListItem>>> {
    let items = quizzes::list(&state.db, query.topic_id.as_deref(), viewer.is_admin())
        .await?
        .into_iter()
        .map(|entry| QuizListItem {
            locked: !viewer.can_access(entry.quiz.access_level),
            id: entry.quiz.id,
            topic_id: entry.quiz.topic_id,
            title: entry.quiz.title,
            description: entry.quiz.description,
            access_level: entry.quiz.access_level,
            pass_percent: entry.quiz.pass_percent,
            published: entry.quiz.published,
            question_count: entry.question_count,
            created_at: entry.quiz.created_at,
        })
        .collect();
    Ok(Json(items))
}

/// A quiz the caller may take: published (or caller is admin) and within tier
async fn playable(state: &AppState, viewer: &Viewer, id: &str) -> ApiResult<Quiz> {
    let quiz = quizzes::get(&state.db, id)
        .await?
        .filter(|q| q.published || viewer.is_admin())
        .ok_or_else(|| ApiError::NotFound(format!("Quiz not found: {}", id)))?;
    access::ensure_access(viewer.tier(), quiz.access_level)?;
    Ok(quiz)
}

/// GET /api/quizzes/:id/play
pub async fn play(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<PlayView>> {
    let quiz = playable(&state, &Viewer(Some(session)), &id).await?;
    let questions = quizzes::questions(&state.db, &quiz.id).await?;
    let view = quiz_engine::play_view(&quiz, &questions, &mut rand::thread_rng());
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct AttemptRequest {
    pub answers: Vec<Answer>,
    pub duration_secs: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt_id: String,
    pub correct: u32,
    pub total: u32,
    pub percent: u8,
    pub passed: bool,
    pub review: Vec<ReviewItem>,
}

/// POST /api/quizzes/:id/attempts
pub async fn submit_attempt(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<AttemptRequest>,
) -> ApiResult<Json<AttemptResult>> {
    let user_id = session.user.id.clone();
    let quiz = playable(&state, &Viewer(Some(session)), &id).await?;
    let questions = quizzes::questions(&state.db, &quiz.id).await?;
    let score = quiz_engine::score(&questions, &req.answers, quiz.pass_percent)?;

    let attempt_id = quizzes::insert_attempt(
        &state.db,
        NewAttempt {
            quiz_id: &quiz.id,
            user_id: &user_id,
            correct: score.correct,
            total: score.total,
            percent: score.percent,
            passed: score.passed,
            review: &score.review,
            duration_secs: req.duration_secs,
        },
    )
    .await?;
    info!("Quiz {} attempt by {}: {}%", quiz.id, user_id, score.percent);

    Ok(Json(AttemptResult {
        attempt_id,
        correct: score.correct,
        total: score.total,
        percent: score.percent,
        passed: score.passed,
        review: score.review,
    }))
}

/// GET /api/quizzes/:id/attempts
pub async fn my_attempts(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Attempt>>> {
    Ok(Json(quizzes::attempts(&state.db, &id, &session.user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    pub topic_id: Option<String>,
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub access_level: Tier,
    pub pass_percent: Option<u8>,
    #[serde(default = "default_true")]
    pub shuffle_questions: bool,
    #[serde(default = "default_true")]
    pub shuffle_options: bool,
    #[serde(default)]
    pub published: bool,
    pub questions: Vec<QuestionInput>,
}

fn default_true() -> bool {
    true
}

/// Structural checks on one question
pub fn validate_question(index: usize, question: &QuestionInput) -> ApiResult<()> {
    let n = index + 1;
    if question.prompt.is_blank() {
        return Err(ApiError::BadRequest(format!("Question {}: prompt is required", n)));
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&question.options.len()) {
        return Err(ApiError::BadRequest(format!(
            "Question {}: needs {} to {} options",
            n, MIN_OPTIONS, MAX_OPTIONS
        )));
    }
    if question.options.iter().any(LocalizedText::is_blank) {
        return Err(ApiError::BadRequest(format!("Question {}: options must not be blank", n)));
    }
    if question.correct_index >= question.options.len() {
        return Err(ApiError::BadRequest(format!(
            "Question {}: correct_index {} out of range",
            n, question.correct_index
        )));
    }
    Ok(())
}

async fn to_input(state: &AppState, req: QuizRequest) -> ApiResult<QuizInput> {
    let title = require_text("title", &req.title)?;
    let pass_percent = req.pass_percent.unwrap_or(state.settings().quiz_pass_percent);
    if pass_percent > 100 {
        return Err(ApiError::BadRequest("pass_percent must be between 0 and 100".to_string()));
    }
    if let Some(topic_id) = &req.topic_id {
        if topics::get(&state.db, topic_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("Unknown topic: {}", topic_id)));
        }
    }
    for (index, question) in req.questions.iter().enumerate() {
        validate_question(index, question)?;
    }

    Ok(QuizInput {
        topic_id: req.topic_id,
        title,
        description: req.description.trimmed(),
        access_level: req.access_level,
        pass_percent,
        shuffle_questions: req.shuffle_questions,
        shuffle_options: req.shuffle_options,
        published: req.published,
        questions: req.questions,
    })
}

/// Quiz with answers, for authors
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

async fn detail(state: &AppState, id: &str) -> ApiResult<QuizDetail> {
    let quiz = quizzes::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Quiz not found: {}", id)))?;
    let questions = quizzes::questions(&state.db, id).await?;
    Ok(QuizDetail { quiz, questions })
}

/// POST /api/admin/quizzes
pub async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<QuizRequest>,
) -> ApiResult<(StatusCode, Json<QuizDetail>)> {
    let input = to_input(&state, req).await?;
    let quiz = quizzes::create(&state.db, &input, Origin::Manual).await?;
    Ok((StatusCode::CREATED, Json(detail(&state, &quiz.id).await?)))
}

/// GET /api/admin/quizzes/:id
pub async fn get_full(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<QuizDetail>> {
    Ok(Json(detail(&state, &id).await?))
}

/// PUT /api/admin/quizzes/:id (questions replaced wholesale)
pub async fn replace(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<QuizRequest>,
) -> ApiResult<Json<QuizDetail>> {
    let input = to_input(&state, req).await?;
    quizzes::replace(&state.db, &id, &input)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Quiz not found: {}", id)))?;
    Ok(Json(detail(&state, &id).await?))
}

/// DELETE /api/admin/quizzes/:id
pub async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !quizzes::delete(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("Quiz not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route("/api/quizzes", get(list))
        .route("/api/quizzes/:id/play", get(play))
        .route("/api/quizzes/:id/attempts", get(my_attempts).post(submit_attempt))
        .route("/api/admin/quizzes", post(create))
        .route("/api/admin/quizzes/:id", get(get_full).put(replace).delete(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: usize, correct_index: usize) -> QuestionInput {
        QuestionInput {
            prompt: LocalizedText::new("Вопрос", "Întrebare"),
            options: (0..options).map(|i| LocalizedText::new(format!("{}", i), format!("{}", i))).collect(),
            correct_index,
            explanation: LocalizedText::default(),
        }
    }

    #[test]
    fn test_validate_question() {
        assert!(validate_question(0, &question(4, 3)).is_ok());
        assert!(validate_question(0, &question(1, 0)).is_err());
        assert!(validate_question(0, &question(9, 0)).is_err());
        assert!(validate_question(0, &question(3, 3)).is_err());

        let mut blank = question(3, 0);
        blank.prompt = LocalizedText::default();
        assert!(validate_question(0, &blank).is_err());
    }
}
