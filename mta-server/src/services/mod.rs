//! Business operations shared by REST handlers, the socket and background tasks

pub mod access;
pub mod accounts;
pub mod billing;
pub mod chat;
pub mod maintenance;
pub mod notifier;
pub mod quiz_engine;
