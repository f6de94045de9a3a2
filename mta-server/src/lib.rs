//! mta-server library interface
//!
//! Exposes the router and state so integration tests can drive the API
//! without binding a socket.

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod realtime;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::{middleware, routing::get, Router};
use chrono::{DateTime, Utc};
use mta_common::db::RuntimeSettings;
use mta_gen::import::Importer;
use mta_gen::ContentGenerator;
use sqlx::SqlitePool;
use std::sync::{Arc, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::realtime::RoomHub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Socket rooms for realtime events
    pub hub: RoomHub,
    /// Latest snapshot of the `settings` table, refreshed by maintenance
    settings: Arc<RwLock<Arc<RuntimeSettings>>>,
    /// `None` without an Anthropic API key
    pub generator: Option<ContentGenerator>,
    pub importer: Option<Arc<Importer>>,
    /// `None` disables the payment webhook
    pub webhook_secret: Option<String>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: RuntimeSettings) -> Self {
        Self {
            db,
            hub: RoomHub::new(),
            settings: Arc::new(RwLock::new(Arc::new(settings))),
            generator: None,
            importer: None,
            webhook_secret: None,
            startup_time: mta_common::time::now(),
        }
    }

    /// Current runtime settings
    pub fn settings(&self) -> Arc<RuntimeSettings> {
        let guard = self.settings.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Re-read the `settings` table; true when anything changed
    pub async fn reload_settings(&self) -> ApiResult<bool> {
        let fresh = RuntimeSettings::load(&self.db).await?;
        let mut guard = self.settings.write().unwrap_or_else(|e| e.into_inner());
        if **guard == fresh {
            return Ok(false);
        }
        *guard = Arc::new(fresh);
        Ok(true)
    }

    pub fn with_generator(mut self, generator: ContentGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_importer(mut self, importer: Importer) -> Self {
        self.importer = Some(Arc::new(importer));
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::user_routes())
        .merge(api::category_routes())
        .merge(api::topic_routes())
        .merge(api::resource_routes())
        .merge(api::quiz_routes())
        .merge(api::subscription_routes())
        .merge(api::chat_routes())
        .merge(api::notification_routes())
        .merge(api::schedule_routes())
        .merge(api::generate_routes())
        .merge(api::import_routes())
        .merge(api::health_routes())
        .route("/ws", get(realtime::ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), api::auth::session_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
