//! Topic endpoints and learning progress

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use mta_common::{Locale, LocalizedText, Tier};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{AdminUser, CurrentUser, Viewer};
use super::{require_text, resolve_slug, validate_url};
use crate::db::categories;
use crate::db::notifications::NotificationKind;
use crate::db::quizzes::{self, QuizProgress};
use crate::db::topics::{self, CategoryProgress, Origin, Topic, TopicFilter, TopicInput, TopicKind};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::services::{access, notifier};
use crate::AppState;

/// Topic as shown to a viewer; `body` is absent in lists and when locked
#[derive(Debug, Serialize)]
pub struct TopicView {
    pub id: String,
    pub category_id: String,
    pub slug: String,
    pub kind: TopicKind,
    pub title: LocalizedText,
    pub summary: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<LocalizedText>,
    pub access_level: Tier,
    pub published: bool,
    pub position: i64,
    pub origin: Origin,
    pub source_url: Option<String>,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TopicView {
    fn new(topic: Topic, viewer: &Viewer, with_body: bool) -> Self {
        let locked = !viewer.can_access(topic.access_level);
        Self {
            body: (with_body && !locked).then_some(topic.body),
            id: topic.id,
            category_id: topic.category_id,
            slug: topic.slug,
            kind: topic.kind,
            title: topic.title,
            summary: topic.summary,
            access_level: topic.access_level,
            published: topic.published,
            position: topic.position,
            origin: topic.origin,
            source_url: topic.source_url,
            locked,
            created_at: topic.created_at,
            updated_at: topic.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopicQuery {
    pub category_id: Option<String>,
    pub q: Option<String>,
    pub kind: Option<TopicKind>,
}

/// GET /api/topics
pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<TopicQuery>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<TopicView>>> {
    let filter = TopicFilter {
        category_id: query.category_id,
        query: query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        kind: query.kind,
        include_unpublished: viewer.is_admin(),
    };

    let total = topics::count(&state.db, &filter).await?;
    let pagination = page.paginate(total);
    let items = topics::list(&state.db, &filter, pagination.per_page, pagination.offset)
        .await?
        .into_iter()
        .map(|topic| TopicView::new(topic, &viewer, false))
        .collect();

    Ok(Json(Page::new(items, total, pagination)))
}

/// Published topic by id or slug; admins also see drafts
async fn visible_topic(state: &AppState, viewer: &Viewer, key: &str) -> ApiResult<Topic> {
    topics::find_by_id_or_slug(&state.db, key)
        .await?
        .filter(|t| t.published || viewer.is_admin())
        .ok_or_else(|| ApiError::NotFound(format!("Topic not found: {}", key)))
}

/// GET /api/topics/:id_or_slug
pub async fn get_one(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> ApiResult<Json<TopicView>> {
    let topic = visible_topic(&state, &viewer, &key).await?;
    Ok(Json(TopicView::new(topic, &viewer, true)))
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub category_id: String,
    pub slug: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: TopicKind,
    pub title: LocalizedText,
    #[serde(default)]
    pub summary: LocalizedText,
    #[serde(default)]
    pub body: LocalizedText,
    #[serde(default)]
    pub access_level: Tier,
    #[serde(default)]
    pub position: i64,
    pub source_url: Option<String>,
}

fn default_kind() -> TopicKind {
    TopicKind::Article
}

async fn to_input(state: &AppState, req: TopicRequest, id: Option<&str>) -> ApiResult<TopicInput> {
    let title = require_text("title", &req.title)?;
    if !categories::exists(&state.db, &req.category_id).await? {
        return Err(ApiError::BadRequest(format!("Unknown category: {}", req.category_id)));
    }
    let source_url = req.source_url.as_deref().map(validate_url).transpose()?;
    let slug = resolve_slug(state, "topics", req.slug.as_deref(), &title, id).await?;

    Ok(TopicInput {
        category_id: req.category_id,
        slug,
        kind: req.kind,
        title,
        summary: req.summary.trimmed(),
        body: req.body,
        access_level: req.access_level,
        position: req.position,
        source_url,
    })
}

/// POST /api/topics (created unpublished)
pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<TopicRequest>,
) -> ApiResult<(StatusCode, Json<Topic>)> {
    let input = to_input(&state, req, None).await?;
    let topic = topics::create(&state.db, &input, Origin::Manual, Some(&admin.user.id)).await?;
    info!("Topic {} created by {}", topic.slug, admin.user.id);
    Ok((StatusCode::CREATED, Json(topic)))
}

/// PUT /api/topics/:id
pub async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<TopicRequest>,
) -> ApiResult<Json<Topic>> {
    let input = to_input(&state, req, Some(&id)).await?;
    topics::update(&state.db, &id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Topic not found: {}", id)))
}

/// DELETE /api/topics/:id
pub async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !topics::delete(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("Topic not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

/// POST /api/topics/:id/publish
///
/// Publishing a draft announces it to every connected client.
pub async fn publish(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> ApiResult<Json<Topic>> {
    let before = topics::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Topic not found: {}", id)))?;
    let topic = topics::set_published(&state.db, &id, req.published)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Topic not found: {}", id)))?;

    if topic.published && !before.published {
        let locale = Locale::default();
        let delivered = notifier::broadcast(
            &state,
            NotificationKind::Content,
            topic.title.get(locale),
            topic.summary.get(locale),
            Some(&format!("/topics/{}", topic.slug)),
        );
        info!("Topic {} published, announced to {} connections", topic.slug, delivered);
    }
    Ok(Json(topic))
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub topic_id: String,
    pub completed_at: DateTime<Utc>,
}

/// POST /api/topics/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(key): Path<String>,
) -> ApiResult<Json<CompletionResponse>> {
    let viewer = Viewer(Some(session.clone()));
    let topic = visible_topic(&state, &viewer, &key).await?;
    access::ensure_access(session.tier, topic.access_level)?;

    let completed_at = topics::mark_complete(&state.db, &session.user.id, &topic.id).await?;
    Ok(Json(CompletionResponse {
        topic_id: topic.id,
        completed_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub categories: Vec<CategoryProgress>,
    pub quizzes: Vec<QuizProgress>,
}

/// GET /api/progress/me
pub async fn my_progress(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Json<ProgressResponse>> {
    Ok(Json(ProgressResponse {
        categories: topics::progress_by_category(&state.db, &session.user.id).await?,
        quizzes: quizzes::best_results(&state.db, &session.user.id).await?,
    }))
}

pub fn topic_routes() -> Router<AppState> {
    Router::new()
        .route("/api/topics", get(list).post(create))
        .route("/api/topics/:id", get(get_one).put(update).delete(delete))
        .route("/api/topics/:id/publish", post(publish))
        .route("/api/topics/:id/complete", post(complete))
        .route("/api/progress/me", get(my_progress))
}
