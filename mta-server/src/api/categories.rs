//! Category endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use mta_common::LocalizedText;
use serde::Deserialize;

use super::auth::AdminUser;
use super::{require_text, resolve_slug};
use crate::db::categories::{self, Category, CategoryInput, CategoryWithCount};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub slug: Option<String>,
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub position: i64,
}

async fn to_input(state: &AppState, req: CategoryRequest, id: Option<&str>) -> ApiResult<CategoryInput> {
    let name = require_text("name", &req.name)?;
    let slug = resolve_slug(state, "categories", req.slug.as_deref(), &name, id).await?;
    Ok(CategoryInput {
        slug,
        name,
        description: req.description.trimmed(),
        position: req.position,
    })
}

/// GET /api/categories
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryWithCount>>> {
    Ok(Json(categories::list_with_counts(&state.db).await?))
}

/// POST /api/categories
pub async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let input = to_input(&state, req, None).await?;
    let category = categories::create(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/:id
pub async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<Json<Category>> {
    let input = to_input(&state, req, Some(&id)).await?;
    categories::update(&state.db, &id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Category not found: {}", id)))
}

/// DELETE /api/categories/:id
pub async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let topics = categories::topic_count(&state.db, &id).await?;
    if topics > 0 {
        return Err(ApiError::Conflict(format!("Category still has {} topics", topics)));
    }
    if !categories::delete(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("Category not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route("/api/categories/:id", put(update).delete(delete))
}
