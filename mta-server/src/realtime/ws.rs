//! WebSocket endpoint
//!
//! Each connection owns an outbound channel drained by a writer task, and
//! one forwarder task per room it follows. Every connection follows its
//! user room and the broadcast room; conversation rooms are joined on
//! request.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use mta_common::events::RealtimeEvent;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::protocol::{parse_frame, ClientFrame};
use super::Room;
use crate::db::users::User;
use crate::error::{ApiError, ApiResult};
use crate::services::{accounts, chat};
use crate::AppState;

/// Events queued for one socket before forwarders wait
const OUTBOUND_CAPACITY: usize = 128;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws?token=
///
/// The token is checked before the upgrade, so a bad token is a plain 401.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    upgrade: Option<WebSocketUpgrade>,
) -> ApiResult<Response> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;
    let user = accounts::resolve_token(&state.db, &token).await?;

    let upgrade = upgrade.ok_or_else(|| ApiError::BadRequest("Expected a WebSocket upgrade".to_string()))?;
    Ok(upgrade.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    info!("Socket connected for user {}", user.id);
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<RealtimeEvent>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize {} event: {}", event.event_type(), e);
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = SocketSession::new(state, user, out_tx);
    session.follow(Room::User(session.user.id.clone()));
    session.follow(Room::Broadcast);

    while let Some(message) = stream.next().await {
        match message {
            Ok(WsMessage::Text(text)) => session.handle_text(&text).await,
            Ok(WsMessage::Binary(_)) => session.reply(RealtimeEvent::error("Binary frames are not supported")).await,
            Ok(WsMessage::Close(_)) => break,
            // Ping/pong are answered by the protocol layer
            Ok(_) => {}
            Err(e) => {
                debug!("Socket error for user {}: {}", session.user.id, e);
                break;
            }
        }
    }

    info!("Socket closed for user {}", session.user.id);
    session.shutdown();
    writer.abort();
}

struct SocketSession {
    state: AppState,
    user: User,
    out: mpsc::Sender<RealtimeEvent>,
    forwarders: HashMap<Room, JoinHandle<()>>,
}

impl SocketSession {
    fn new(state: AppState, user: User, out: mpsc::Sender<RealtimeEvent>) -> Self {
        Self {
            state,
            user,
            out,
            forwarders: HashMap::new(),
        }
    }

    /// Start forwarding a room; false when already followed
    fn follow(&mut self, room: Room) -> bool {
        if self.forwarders.contains_key(&room) {
            return false;
        }

        let mut rx = self.state.hub.subscribe(room.clone());
        let out = self.out.clone();
        let label = room.to_string();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if out.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Socket lagging on {}: {} events skipped", label, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.forwarders.insert(room, handle);
        true
    }

    fn unfollow(&mut self, room: &Room) -> bool {
        match self.forwarders.remove(room) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn shutdown(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }

    async fn reply(&self, event: RealtimeEvent) {
        let _ = self.out.send(event).await;
    }

    async fn handle_text(&mut self, text: &str) {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(message) => {
                self.reply(RealtimeEvent::error(message)).await;
                return;
            }
        };

        if let Err(e) = self.dispatch(frame).await {
            self.reply(RealtimeEvent::error(e.public_message())).await;
        }
    }

    async fn dispatch(&mut self, frame: ClientFrame) -> ApiResult<()> {
        match frame {
            ClientFrame::Join { conversation_id } => {
                chat::ensure_member(&self.state, &conversation_id, &self.user.id).await?;
                if self.follow(Room::Conversation(conversation_id.clone())) {
                    debug!("User {} joined conversation {}", self.user.id, conversation_id);
                }
                self.reply(RealtimeEvent::Joined { conversation_id }).await;
            }
            ClientFrame::Leave { conversation_id } => {
                self.unfollow(&Room::Conversation(conversation_id.clone()));
                self.reply(RealtimeEvent::Left { conversation_id }).await;
            }
            ClientFrame::SendMessage { conversation_id, body } => {
                let user = self.user.clone();
                chat::post_message(&self.state, &user, &conversation_id, &body).await?;
            }
            ClientFrame::Typing { conversation_id } => {
                chat::typing(&self.state, &self.user.id, &conversation_id).await?;
            }
            ClientFrame::MarkRead { conversation_id } => {
                chat::mark_read(&self.state, &self.user.id, &conversation_id).await?;
            }
            ClientFrame::Ping => self.reply(RealtimeEvent::Pong).await,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::chat as chat_store;
    use mta_common::db::RuntimeSettings;
    use mta_common::Locale;
    use std::time::Duration;

    struct Fixture {
        state: AppState,
        ana: User,
        ion: User,
        eve: User,
        conversation_id: String,
    }

    async fn fixture() -> Fixture {
        let pool = mta_common::db::connect_in_memory().await.unwrap();
        let state = AppState::new(pool, RuntimeSettings::default());
        let register = |email: &'static str, name: &'static str| {
            let db = state.db.clone();
            async move { accounts::register(&db, email, "masaj2024", name, Locale::Ro).await.unwrap() }
        };
        let ana = register("ana@example.md", "Ana").await;
        let ion = register("ion@example.md", "Ion").await;
        let eve = register("eve@example.md", "Eve").await;
        let (conversation, _) = chat_store::get_or_create_direct(&state.db, &ana.id, &ion.id).await.unwrap();

        Fixture {
            state,
            ana,
            ion,
            eve,
            conversation_id: conversation.id,
        }
    }

    fn connect(state: &AppState, user: &User) -> (SocketSession, mpsc::Receiver<RealtimeEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (SocketSession::new(state.clone(), user.clone(), tx), rx)
    }

    async fn next(rx: &mut mpsc::Receiver<RealtimeEvent>) -> RealtimeEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event within 2s")
            .expect("channel closed")
    }

    fn join_frame(conversation_id: &str) -> String {
        format!(r#"{{"type":"join","conversation_id":"{}"}}"#, conversation_id)
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_session() {
        let f = fixture().await;
        let (mut session, mut rx) = connect(&f.state, &f.ana);

        session.handle_text("not json").await;
        assert!(matches!(next(&mut rx).await, RealtimeEvent::Error { message } if message.starts_with("Malformed frame")));

        session.handle_text(r#"{"type":"ping"}"#).await;
        assert_eq!(next(&mut rx).await, RealtimeEvent::Pong);
    }

    #[tokio::test]
    async fn test_join_by_non_member_is_refused() {
        let f = fixture().await;
        let (mut session, mut rx) = connect(&f.state, &f.eve);

        session.handle_text(&join_frame(&f.conversation_id)).await;
        assert_eq!(
            next(&mut rx).await,
            RealtimeEvent::error("Not a member of this conversation")
        );
        assert!(session.forwarders.is_empty());
        assert_eq!(
            f.state.hub.receiver_count(&Room::Conversation(f.conversation_id.clone())),
            0
        );

        session.handle_text(&join_frame("missing")).await;
        assert_eq!(next(&mut rx).await, RealtimeEvent::error("Conversation not found"));
    }

    #[tokio::test]
    async fn test_duplicate_join_follows_once() {
        let f = fixture().await;
        let (mut session, mut rx) = connect(&f.state, &f.ana);
        let room = Room::Conversation(f.conversation_id.clone());
        let joined = RealtimeEvent::Joined {
            conversation_id: f.conversation_id.clone(),
        };

        session.handle_text(&join_frame(&f.conversation_id)).await;
        session.handle_text(&join_frame(&f.conversation_id)).await;
        assert_eq!(next(&mut rx).await, joined);
        assert_eq!(next(&mut rx).await, joined);

        assert_eq!(session.forwarders.len(), 1);
        assert_eq!(f.state.hub.receiver_count(&room), 1);

        session.shutdown();
        assert!(session.forwarders.is_empty());
    }

    #[tokio::test]
    async fn test_send_message_reaches_room() {
        let f = fixture().await;
        let (mut ana, mut ana_rx) = connect(&f.state, &f.ana);
        let (mut ion, mut ion_rx) = connect(&f.state, &f.ion);

        ana.handle_text(&join_frame(&f.conversation_id)).await;
        ion.handle_text(&join_frame(&f.conversation_id)).await;
        next(&mut ana_rx).await;
        next(&mut ion_rx).await;

        let frame = format!(
            r#"{{"type":"send_message","conversation_id":"{}","body":"  Salut!  "}}"#,
            f.conversation_id
        );
        ana.handle_text(&frame).await;

        for rx in [&mut ana_rx, &mut ion_rx] {
            match next(rx).await {
                RealtimeEvent::MessageCreated { message } => {
                    assert_eq!(message.body, "Salut!");
                    assert_eq!(message.sender_id, f.ana.id);
                    assert_eq!(message.conversation_id, f.conversation_id);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }

        // Empty bodies are answered with an error, not broadcast
        let frame = format!(
            r#"{{"type":"send_message","conversation_id":"{}","body":"   "}}"#,
            f.conversation_id
        );
        ana.handle_text(&frame).await;
        assert!(matches!(next(&mut ana_rx).await, RealtimeEvent::Error { .. }));
        assert!(ion_rx.try_recv().is_err());

        ana.shutdown();
        ion.shutdown();
    }
}
