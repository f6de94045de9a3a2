//! Conversations and messages over REST

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::CurrentUser;
use crate::db::chat::{self, Conversation, ConversationSummary, MemberInfo, Message};
use crate::db::users;
use crate::error::{ApiError, ApiResult};
use crate::services::chat as chat_service;
use crate::AppState;

pub const DEFAULT_MESSAGE_LIMIT: i64 = 50;
pub const MAX_MESSAGE_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub members: Vec<MemberInfo>,
}

async fn view(state: &AppState, conversation: Conversation, created: bool) -> ApiResult<(StatusCode, Json<ConversationView>)> {
    let members = chat::members(&state.db, &conversation.id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ConversationView { conversation, members })))
}

#[derive(Debug, Deserialize)]
pub struct DirectRequest {
    pub user_id: String,
}

/// POST /api/conversations
pub async fn open_direct(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(req): Json<DirectRequest>,
) -> ApiResult<(StatusCode, Json<ConversationView>)> {
    if req.user_id == session.user.id {
        return Err(ApiError::BadRequest("Cannot start a conversation with yourself".to_string()));
    }
    if users::find_by_id(&state.db, &req.user_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("User not found: {}", req.user_id)));
    }

    let (conversation, created) = chat::get_or_create_direct(&state.db, &session.user.id, &req.user_id).await?;
    if created {
        info!("Direct conversation {} opened by {}", conversation.id, session.user.id);
    }
    view(&state, conversation, created).await
}

/// POST /api/conversations/support
pub async fn open_support(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<(StatusCode, Json<ConversationView>)> {
    if session.is_admin() {
        return Err(ApiError::BadRequest("Admins answer support conversations".to_string()));
    }
    let admins = users::admin_ids(&state.db).await?;
    let (conversation, created) = chat::get_or_create_support(&state.db, &session.user.id, &admins).await?;
    if created {
        info!("Support conversation {} opened by {}", conversation.id, session.user.id);
    }
    view(&state, conversation, created).await
}

/// GET /api/conversations
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(chat::list_for_user(&state.db, &session.user.id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// GET /api/conversations/:id/messages
pub async fn history(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    if !(1..=MAX_MESSAGE_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!("limit must be between 1 and {}", MAX_MESSAGE_LIMIT)));
    }
    chat_service::ensure_member(&state, &id, &session.user.id).await?;
    Ok(Json(chat::messages(&state.db, &id, query.before, limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

/// POST /api/conversations/:id/messages
pub async fn post_message(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = chat_service::post_message(&state, &session.user, &id, &req.body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub conversation_id: String,
    pub read_at: DateTime<Utc>,
}

/// POST /api/conversations/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ReadResponse>> {
    let read_at = chat_service::mark_read(&state, &session.user.id, &id).await?;
    Ok(Json(ReadResponse {
        conversation_id: id,
        read_at,
    }))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/conversations", get(list).post(open_direct))
        .route("/api/conversations/support", post(open_support))
        .route("/api/conversations/:id/messages", get(history).post(post_message))
        .route("/api/conversations/:id/read", post(mark_read))
}
