//! Resource endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use mta_common::{LocalizedText, Tier};
use serde::{Deserialize, Serialize};

use super::auth::{AdminUser, Viewer};
use super::{require_text, validate_url};
use crate::db::resources::{self, Resource, ResourceInput, ResourceKind};
use crate::db::topics;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Resource as shown to a viewer; locked items carry no `url`
#[derive(Debug, Serialize)]
pub struct ResourceView {
    pub id: String,
    pub topic_id: Option<String>,
    pub kind: ResourceKind,
    pub title: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub attribution: Option<String>,
    pub access_level: Tier,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

impl ResourceView {
    fn new(resource: Resource, viewer: &Viewer) -> Self {
        let locked = !viewer.can_access(resource.access_level);
        Self {
            url: (!locked).then_some(resource.url),
            id: resource.id,
            topic_id: resource.topic_id,
            kind: resource.kind,
            title: resource.title,
            attribution: resource.attribution,
            access_level: resource.access_level,
            locked,
            created_at: resource.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    pub topic_id: Option<String>,
    pub kind: Option<ResourceKind>,
}

/// GET /api/resources
pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ResourceQuery>,
) -> ApiResult<Json<Vec<ResourceView>>> {
    let items = resources::list(&state.db, query.topic_id.as_deref(), query.kind)
        .await?
        .into_iter()
        .map(|r| ResourceView::new(r, &viewer))
        .collect();
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct ResourceRequest {
    pub topic_id: Option<String>,
    pub kind: ResourceKind,
    pub title: LocalizedText,
    pub url: String,
    pub attribution: Option<String>,
    #[serde(default)]
    pub access_level: Tier,
}

async fn to_input(state: &AppState, req: ResourceRequest) -> ApiResult<ResourceInput> {
    let title = require_text("title", &req.title)?;
    let url = validate_url(&req.url)?;
    if let Some(topic_id) = &req.topic_id {
        if topics::get(&state.db, topic_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("Unknown topic: {}", topic_id)));
        }
    }

    Ok(ResourceInput {
        topic_id: req.topic_id,
        kind: req.kind,
        title,
        url,
        attribution: req.attribution.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
        access_level: req.access_level,
    })
}

/// POST /api/resources
pub async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<ResourceRequest>,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let input = to_input(&state, req).await?;
    Ok((StatusCode::CREATED, Json(resources::create(&state.db, &input).await?)))
}

/// PUT /api/resources/:id
pub async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<ResourceRequest>,
) -> ApiResult<Json<Resource>> {
    let input = to_input(&state, req).await?;
    resources::update(&state.db, &id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found: {}", id)))
}

/// DELETE /api/resources/:id
pub async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !resources::delete(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("Resource not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn resource_routes() -> Router<AppState> {
    Router::new()
        .route("/api/resources", get(list).post(create))
        .route("/api/resources/:id", put(update).delete(delete))
}
