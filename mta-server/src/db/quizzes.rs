//! Quizzes, questions and attempts

use chrono::{DateTime, Utc};
use mta_common::{LocalizedText, Tier};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use super::topics::Origin;
use super::{localized, new_id, parsed};

#[derive(Debug, Clone, Serialize)]
pub struct Quiz {
    pub id: String,
    pub topic_id: Option<String>,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub access_level: Tier,
    pub pass_percent: u8,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub published: bool,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Quiz {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            topic_id: row.try_get("topic_id")?,
            title: localized(row, "title")?,
            description: localized(row, "description")?,
            access_level: parsed(row, "access_level")?,
            pass_percent: row.try_get("pass_percent")?,
            shuffle_questions: row.try_get("shuffle_questions")?,
            shuffle_options: row.try_get("shuffle_options")?,
            published: row.try_get("published")?,
            origin: parsed(row, "origin")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub quiz_id: String,
    pub position: i64,
    pub prompt: LocalizedText,
    pub options: Vec<LocalizedText>,
    pub correct_index: usize,
    pub explanation: LocalizedText,
}

impl<'r> FromRow<'r, SqliteRow> for Question {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let options: Json<Vec<LocalizedText>> = row.try_get("options")?;
        let correct_index: i64 = row.try_get("correct_index")?;
        Ok(Self {
            id: row.try_get("id")?,
            quiz_id: row.try_get("quiz_id")?,
            position: row.try_get("position")?,
            prompt: localized(row, "prompt")?,
            options: options.0,
            correct_index: usize::try_from(correct_index).map_err(|e| sqlx::Error::ColumnDecode {
                index: "correct_index".to_string(),
                source: Box::new(e),
            })?,
            explanation: localized(row, "explanation")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub prompt: LocalizedText,
    pub options: Vec<LocalizedText>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: LocalizedText,
}

#[derive(Debug, Clone)]
pub struct QuizInput {
    pub topic_id: Option<String>,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub access_level: Tier,
    pub pass_percent: u8,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub published: bool,
    pub questions: Vec<QuestionInput>,
}

async fn insert_questions(
    conn: &mut SqliteConnection,
    quiz_id: &str,
    questions: &[QuestionInput],
) -> sqlx::Result<()> {
    for (position, question) in questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO quiz_questions
                (id, quiz_id, position, prompt_ru, prompt_ro, options, correct_index, explanation_ru, explanation_ro)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_id())
        .bind(quiz_id)
        .bind(position as i64)
        .bind(&question.prompt.ru)
        .bind(&question.prompt.ro)
        .bind(Json(&question.options))
        .bind(question.correct_index as i64)
        .bind(&question.explanation.ru)
        .bind(&question.explanation.ro)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn create(pool: &SqlitePool, input: &QuizInput, origin: Origin) -> sqlx::Result<Quiz> {
    let id = new_id();
    let now = mta_common::time::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO quizzes (
            id, topic_id, title_ru, title_ro, description_ru, description_ro, access_level,
            pass_percent, shuffle_questions, shuffle_options, published, origin, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&input.topic_id)
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.description.ru)
    .bind(&input.description.ro)
    .bind(input.access_level.as_str())
    .bind(input.pass_percent)
    .bind(input.shuffle_questions)
    .bind(input.shuffle_options)
    .bind(input.published)
    .bind(origin.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    insert_questions(&mut tx, &id, &input.questions).await?;
    tx.commit().await?;

    get(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Replace quiz fields and its full question list
pub async fn replace(pool: &SqlitePool, id: &str, input: &QuizInput) -> sqlx::Result<Option<Quiz>> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE quizzes
        SET topic_id = ?, title_ru = ?, title_ro = ?, description_ru = ?, description_ro = ?,
            access_level = ?, pass_percent = ?, shuffle_questions = ?, shuffle_options = ?,
            published = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.topic_id)
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.description.ru)
    .bind(&input.description.ro)
    .bind(input.access_level.as_str())
    .bind(input.pass_percent)
    .bind(input.shuffle_questions)
    .bind(input.shuffle_options)
    .bind(input.published)
    .bind(mta_common::time::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_questions(&mut tx, id, &input.questions).await?;
    tx.commit().await?;

    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Quiz>> {
    sqlx::query_as("SELECT * FROM quizzes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn questions(pool: &SqlitePool, quiz_id: &str) -> sqlx::Result<Vec<Question>> {
    sqlx::query_as("SELECT * FROM quiz_questions WHERE quiz_id = ? ORDER BY position")
        .bind(quiz_id)
        .fetch_all(pool)
        .await
}

pub async fn delete(pool: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone)]
pub struct QuizWithCount {
    pub quiz: Quiz,
    pub question_count: i64,
}

pub async fn list(
    pool: &SqlitePool,
    topic_id: Option<&str>,
    include_unpublished: bool,
) -> sqlx::Result<Vec<QuizWithCount>> {
    let rows = sqlx::query(
        r#"
        SELECT q.*,
               (SELECT COUNT(*) FROM quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count
        FROM quizzes q
        WHERE (? IS NULL OR q.topic_id = ?)
          AND (? OR q.published = 1)
        ORDER BY q.created_at DESC
        "#,
    )
    .bind(topic_id)
    .bind(topic_id)
    .bind(include_unpublished)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(QuizWithCount {
                quiz: Quiz::from_row(row)?,
                question_count: row.try_get("question_count")?,
            })
        })
        .collect()
}

/// Per-question outcome stored with an attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub question_id: String,
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: LocalizedText,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub correct: i64,
    pub total: i64,
    pub percent: i64,
    pub passed: bool,
    pub review: Vec<ReviewItem>,
    pub duration_secs: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Attempt {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let review: Json<Vec<ReviewItem>> = row.try_get("answers")?;
        Ok(Self {
            id: row.try_get("id")?,
            quiz_id: row.try_get("quiz_id")?,
            user_id: row.try_get("user_id")?,
            correct: row.try_get("correct")?,
            total: row.try_get("total")?,
            percent: row.try_get("percent")?,
            passed: row.try_get("passed")?,
            review: review.0,
            duration_secs: row.try_get("duration_secs")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub struct NewAttempt<'a> {
    pub quiz_id: &'a str,
    pub user_id: &'a str,
    pub correct: u32,
    pub total: u32,
    pub percent: u8,
    pub passed: bool,
    pub review: &'a [ReviewItem],
    pub duration_secs: Option<u32>,
}

pub async fn insert_attempt(pool: &SqlitePool, attempt: NewAttempt<'_>) -> sqlx::Result<String> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO quiz_attempts (id, quiz_id, user_id, correct, total, percent, passed, answers, duration_secs, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(attempt.quiz_id)
    .bind(attempt.user_id)
    .bind(attempt.correct as i64)
    .bind(attempt.total as i64)
    .bind(attempt.percent)
    .bind(attempt.passed)
    .bind(Json(attempt.review))
    .bind(attempt.duration_secs)
    .bind(mta_common::time::now())
    .execute(pool)
    .await?;
    Ok(id)
}

/// Newest first
pub async fn attempts(pool: &SqlitePool, quiz_id: &str, user_id: &str) -> sqlx::Result<Vec<Attempt>> {
    sqlx::query_as("SELECT * FROM quiz_attempts WHERE quiz_id = ? AND user_id = ? ORDER BY created_at DESC")
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizProgress {
    pub quiz_id: String,
    pub title: LocalizedText,
    pub best_percent: i64,
    pub passed: bool,
    pub attempts: i64,
}

/// Best result per attempted quiz
pub async fn best_results(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<QuizProgress>> {
    let rows = sqlx::query(
        r#"
        SELECT q.id AS quiz_id, q.title_ru, q.title_ro,
               MAX(a.percent) AS best_percent,
               MAX(a.passed) AS passed,
               COUNT(a.id) AS attempts
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        WHERE a.user_id = ?
        GROUP BY q.id
        ORDER BY MAX(a.created_at) DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(QuizProgress {
                quiz_id: row.try_get("quiz_id")?,
                title: localized(row, "title")?,
                best_percent: row.try_get("best_percent")?,
                passed: row.try_get("passed")?,
                attempts: row.try_get("attempts")?,
            })
        })
        .collect()
}
