//! Persist notifications and push them to user rooms

use mta_common::events::{NotificationPayload, RealtimeEvent};
use mta_common::LocalizedText;
use tracing::debug;

use crate::db::notifications::{self, NewNotification, Notification, NotificationKind};
use crate::db::users;
use crate::realtime::Room;
use crate::AppState;

/// A notification before it is rendered in the recipient's locale
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NotificationKind,
    pub title: LocalizedText,
    pub body: LocalizedText,
    pub link: Option<String>,
}

impl Notice {
    pub fn new(kind: NotificationKind, title: LocalizedText, body: LocalizedText) -> Self {
        Self {
            kind,
            title,
            body,
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Store a notification for one user and push it to their room
pub async fn send(state: &AppState, user_id: &str, notice: &Notice) -> sqlx::Result<Notification> {
    let locale = users::locale_of(&state.db, user_id).await?;
    let notification = notifications::create(
        &state.db,
        NewNotification {
            user_id,
            kind: notice.kind,
            title: notice.title.get(locale),
            body: notice.body.get(locale),
            link: notice.link.as_deref(),
        },
    )
    .await?;

    let delivered = state.hub.publish(
        &Room::User(user_id.to_string()),
        RealtimeEvent::Notification {
            notification: notification.payload(),
        },
    );
    debug!("Notification {} delivered to {} connections", notification.id, delivered);
    Ok(notification)
}

/// [`send`] to each user; returns how many were stored
pub async fn send_many(state: &AppState, user_ids: &[String], notice: &Notice) -> sqlx::Result<usize> {
    for user_id in user_ids {
        send(state, user_id, notice).await?;
    }
    Ok(user_ids.len())
}

/// Ephemeral notification for every connected client; nothing is stored
pub fn broadcast(state: &AppState, kind: NotificationKind, title: &str, body: &str, link: Option<&str>) -> usize {
    state.hub.publish(
        &Room::Broadcast,
        RealtimeEvent::Notification {
            notification: NotificationPayload {
                id: None,
                kind: kind.as_str().to_string(),
                title: title.to_string(),
                body: body.to_string(),
                link: link.map(str::to_string),
                created_at: mta_common::time::now(),
            },
        },
    )
}

/// Store one notification per user without pushing each one live
///
/// Used for announcements, which reach connected clients once through the
/// broadcast room instead.
pub async fn store_for_all(state: &AppState, user_ids: &[String], notice: &Notice) -> sqlx::Result<usize> {
    for user_id in user_ids {
        let locale = users::locale_of(&state.db, user_id).await?;
        notifications::create(
            &state.db,
            NewNotification {
                user_id,
                kind: notice.kind,
                title: notice.title.get(locale),
                body: notice.body.get(locale),
                link: notice.link.as_deref(),
            },
        )
        .await?;
    }
    Ok(user_ids.len())
}
