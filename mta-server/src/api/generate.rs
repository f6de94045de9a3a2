//! AI-assisted content drafting

use axum::{extract::State, routing::post, Json, Router};
use mta_common::Tier;
use mta_gen::prompts::PromptOptions;
use mta_gen::{Draft, DraftKind, GenerationRequest, QuizDraft};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::AdminUser;
use super::resolve_slug;
use crate::db::categories;
use crate::db::quizzes::{self, QuestionInput, QuizInput};
use crate::db::topics::{self, Origin, TopicInput, TopicKind};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub kind: DraftKind,
    pub subject: String,
    pub category_id: Option<String>,
    pub topic_id: Option<String>,
    pub question_count: Option<u8>,
    pub level: Option<String>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub save: bool,
}

/// Where a saved draft ended up
#[derive(Debug, Serialize)]
pub struct SavedDraft {
    pub kind: DraftKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub draft: Draft,
    pub saved: Option<SavedDraft>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/admin/generate
pub async fn generate(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let generator = state
        .generator
        .clone()
        .ok_or_else(|| ApiError::NotConfigured("Content generator needs an Anthropic API key".to_string()))?;

    let subject = req.subject.trim().to_string();
    if subject.is_empty() {
        return Err(ApiError::BadRequest("subject is required".to_string()));
    }

    // Check the save target before spending a generation on it
    if req.save {
        check_save_target(&state, &req).await?;
    }

    let request = GenerationRequest {
        kind: req.kind,
        subject,
        options: PromptOptions {
            question_count: req.question_count,
            level: trimmed(req.level.clone()),
            instructions: trimmed(req.instructions.clone()),
        },
    };
    let draft = generator.generate(&request).await?;

    let saved = if req.save {
        Some(save_draft(&state, &draft, &req, &admin.user.id).await?)
    } else {
        None
    };
    if let Some(saved) = &saved {
        info!("Generated {} saved as {} by {}", saved.kind.as_str(), saved.id, admin.user.id);
    }

    Ok(Json(GenerateResponse { draft, saved }))
}

async fn check_save_target(state: &AppState, req: &GenerateRequest) -> ApiResult<()> {
    match req.kind {
        DraftKind::Topic | DraftKind::Protocol => {
            let category_id = req
                .category_id
                .as_deref()
                .ok_or_else(|| ApiError::BadRequest("category_id is required to save".to_string()))?;
            if !categories::exists(&state.db, category_id).await? {
                return Err(ApiError::BadRequest(format!("Unknown category: {}", category_id)));
            }
        }
        DraftKind::Quiz => {
            if let Some(topic_id) = &req.topic_id {
                if topics::get(&state.db, topic_id).await?.is_none() {
                    return Err(ApiError::BadRequest(format!("Unknown topic: {}", topic_id)));
                }
            }
        }
    }
    Ok(())
}

/// Store a draft unpublished with `origin = generated`
async fn save_draft(state: &AppState, draft: &Draft, req: &GenerateRequest, author_id: &str) -> ApiResult<SavedDraft> {
    let (kind, title, summary, body) = match draft {
        Draft::Quiz(quiz) => {
            let input = quiz_input(quiz, req.topic_id.clone(), state.settings().quiz_pass_percent);
            let saved = quizzes::create(&state.db, &input, Origin::Generated).await?;
            return Ok(SavedDraft {
                kind: DraftKind::Quiz,
                id: saved.id,
                slug: None,
            });
        }
        Draft::Topic(topic) => (TopicKind::Article, &topic.title, topic.summary.clone(), topic.body.clone()),
        Draft::Protocol(protocol) => (
            TopicKind::Protocol,
            &protocol.title,
            protocol.summary.clone(),
            protocol.body(),
        ),
    };

    let category_id = req
        .category_id
        .clone()
        .ok_or_else(|| ApiError::BadRequest("category_id is required to save".to_string()))?;
    let slug = resolve_slug(state, "topics", None, title, None).await?;
    let input = TopicInput {
        category_id,
        slug,
        kind,
        title: title.clone(),
        summary,
        body,
        access_level: Tier::default(),
        position: 0,
        source_url: None,
    };
    let topic = topics::create(&state.db, &input, Origin::Generated, Some(author_id)).await?;

    Ok(SavedDraft {
        kind: draft.kind(),
        id: topic.id,
        slug: Some(topic.slug),
    })
}

fn quiz_input(quiz: &QuizDraft, topic_id: Option<String>, pass_percent: u8) -> QuizInput {
    QuizInput {
        topic_id,
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        access_level: Tier::default(),
        pass_percent,
        shuffle_questions: true,
        shuffle_options: true,
        published: false,
        questions: quiz
            .questions
            .iter()
            .map(|q| QuestionInput {
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                correct_index: q.correct_index,
                explanation: q.explanation.clone(),
            })
            .collect(),
    }
}

pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/api/admin/generate", post(generate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_common::LocalizedText;
    use mta_gen::drafts::QuestionDraft;

    #[test]
    fn test_quiz_input_from_draft() {
        let draft = QuizDraft {
            title: LocalizedText::new("Анатомия", "Anatomie"),
            description: LocalizedText::default(),
            questions: vec![QuestionDraft {
                prompt: LocalizedText::new("Сколько?", "Câte?"),
                options: vec![LocalizedText::new("1", "1"), LocalizedText::new("2", "2")],
                correct_index: 1,
                explanation: LocalizedText::default(),
            }],
        };

        let input = quiz_input(&draft, Some("t1".into()), 70);
        assert!(!input.published);
        assert_eq!(input.pass_percent, 70);
        assert_eq!(input.questions.len(), 1);
        assert_eq!(input.questions[0].correct_index, 1);
    }
}
