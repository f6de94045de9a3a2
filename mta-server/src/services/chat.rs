//! Chat operations shared by REST and the socket

use chrono::{DateTime, Utc};
use mta_common::events::RealtimeEvent;
use mta_common::LocalizedText;

use crate::db::chat::{self, Conversation, Message};
use crate::db::notifications::NotificationKind;
use crate::db::users::User;
use crate::error::{ApiError, ApiResult};
use crate::realtime::Room;
use crate::services::notifier::{self, Notice};
use crate::AppState;

/// Characters of a message quoted in its notification
const PREVIEW_CHARS: usize = 120;

/// Trimmed body, non-empty and at most `max_chars` characters
pub fn validate_body(body: &str, max_chars: usize) -> ApiResult<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Message body is empty".to_string()));
    }
    if body.chars().count() > max_chars {
        return Err(ApiError::BadRequest(format!(
            "Message body exceeds {} characters",
            max_chars
        )));
    }
    Ok(body.to_string())
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_CHARS {
        return body.to_string();
    }
    let cut: String = body.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// The conversation, if `user_id` is a member
pub async fn ensure_member(state: &AppState, conversation_id: &str, user_id: &str) -> ApiResult<Conversation> {
    let conversation = chat::get(&state.db, conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;
    if !chat::is_member(&state.db, conversation_id, user_id).await? {
        return Err(ApiError::Forbidden("Not a member of this conversation".to_string()));
    }
    Ok(conversation)
}

fn member_rooms(conversation_id: &str, members: &[String]) -> Vec<Room> {
    let mut rooms = vec![Room::Conversation(conversation_id.to_string())];
    rooms.extend(members.iter().map(|id| Room::User(id.clone())));
    rooms
}

pub async fn post_message(state: &AppState, sender: &User, conversation_id: &str, body: &str) -> ApiResult<Message> {
    ensure_member(state, conversation_id, &sender.id).await?;
    let body = validate_body(body, state.settings().chat_max_message_len)?;

    let message = chat::insert_message(&state.db, conversation_id, &sender.id, &body).await?;
    let members = chat::member_ids(&state.db, conversation_id).await?;

    state.hub.publish_many(
        &member_rooms(conversation_id, &members),
        &RealtimeEvent::MessageCreated {
            message: message.payload(),
        },
    );

    let notice = Notice::new(
        NotificationKind::Message,
        LocalizedText::new(
            format!("Новое сообщение от {}", sender.display_name),
            format!("Mesaj nou de la {}", sender.display_name),
        ),
        LocalizedText::new(preview(&body), preview(&body)),
    )
    .with_link(format!("/chat/{}", conversation_id));
    let recipients: Vec<String> = members.into_iter().filter(|id| id != &sender.id).collect();
    notifier::send_many(state, &recipients, &notice).await?;

    Ok(message)
}

pub async fn mark_read(state: &AppState, user_id: &str, conversation_id: &str) -> ApiResult<DateTime<Utc>> {
    ensure_member(state, conversation_id, user_id).await?;
    let read_at = chat::mark_read(&state.db, conversation_id, user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Not a member of this conversation".to_string()))?;

    let members = chat::member_ids(&state.db, conversation_id).await?;
    state.hub.publish_many(
        &member_rooms(conversation_id, &members),
        &RealtimeEvent::ConversationRead {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
            read_at,
        },
    );
    Ok(read_at)
}

/// Typing indicators go to the conversation room only
pub async fn typing(state: &AppState, user_id: &str, conversation_id: &str) -> ApiResult<()> {
    ensure_member(state, conversation_id, user_id).await?;
    state.hub.publish(
        &Room::Conversation(conversation_id.to_string()),
        RealtimeEvent::Typing {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
        },
    );
    Ok(())
}
