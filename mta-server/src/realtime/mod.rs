//! Realtime side-channel: rooms and the WebSocket endpoint

pub mod hub;
pub mod protocol;
pub mod ws;

pub use hub::{Room, RoomHub};
pub use ws::ws_handler;
