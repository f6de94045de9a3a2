//! # MTA Common Library
//!
//! Shared code for the Massage Therapy Academy services:
//! - Error type used by every layer below HTTP
//! - Bootstrap configuration (root folder, TOML file, secrets)
//! - Database schema, migrations and runtime settings
//! - Subscription tiers and roles
//! - Bilingual (RU/RO) text and slugs
//! - Password hashing, session tokens and webhook signatures
//! - Realtime event definitions pushed to socket rooms

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod locale;
pub mod security;
pub mod tier;
pub mod time;
pub mod webhook;

pub use error::{Error, Result};
pub use locale::{Locale, LocalizedText};
pub use tier::{Role, Tier};
