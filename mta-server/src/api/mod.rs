//! HTTP API handlers
//!
//! Each module exposes a `*_routes()` builder merged by [`crate::build_router`].

pub mod auth;
pub mod categories;
pub mod chat;
pub mod generate;
pub mod health;
pub mod import;
pub mod notifications;
pub mod quizzes;
pub mod resources;
pub mod schedule;
pub mod subscriptions;
pub mod topics;
pub mod users;

pub use categories::category_routes;
pub use chat::chat_routes;
pub use generate::generate_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use notifications::notification_routes;
pub use quizzes::quiz_routes;
pub use resources::resource_routes;
pub use schedule::schedule_routes;
pub use subscriptions::subscription_routes;
pub use topics::topic_routes;
pub use users::user_routes;

use mta_common::locale::slugify;
use mta_common::LocalizedText;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Trimmed text with at least one language filled in
pub fn require_text(field: &str, text: &LocalizedText) -> ApiResult<LocalizedText> {
    if text.is_blank() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(text.trimmed())
}

/// Free slug for a row of `table`
///
/// An explicit slug is normalized; otherwise it derives from the title
/// (Romanian first).
pub async fn resolve_slug(
    state: &AppState,
    table: &'static str,
    requested: Option<&str>,
    title: &LocalizedText,
    exclude_id: Option<&str>,
) -> ApiResult<String> {
    let source = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug,
        None if !title.ro.trim().is_empty() => title.ro.as_str(),
        None => title.ru.as_str(),
    };
    let base = slugify(source);
    Ok(crate::db::unique_slug(&state.db, table, &base, exclude_id).await?)
}

/// Absolute http(s) URL
pub fn validate_url(url: &str) -> ApiResult<String> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or_default();
    if rest.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest(format!("Invalid URL: {}", url)));
    }
    Ok(url.to_string())
}
