//! Import from Wikipedia, Wikimedia Commons and PubMed

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mta_common::{Locale, LocalizedText, Tier};
use mta_gen::import::{ImportHit, ImportSource, Importer};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::AdminUser;
use super::resolve_slug;
use crate::db::categories;
use crate::db::resources::{self, Resource, ResourceInput, ResourceKind};
use crate::db::topics::{self, Origin, Topic, TopicInput, TopicKind};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

fn importer(state: &AppState) -> ApiResult<Arc<Importer>> {
    state
        .importer
        .clone()
        .ok_or_else(|| ApiError::NotConfigured("External import is disabled".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub source: ImportSource,
    pub q: String,
    pub lang: Option<Locale>,
}

/// GET /api/admin/import/search
pub async fn search(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<ImportHit>>> {
    let lang = query.lang.unwrap_or_default();
    let hits = importer(&state)?.search(query.source, &query.q, lang.as_str()).await?;
    Ok(Json(hits))
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub source: ImportSource,
    /// Page title, file title or PMID, as returned by search
    pub reference: String,
    pub lang: Option<Locale>,
    pub category_id: Option<String>,
    pub topic_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Imported {
    Topic(Topic),
    Resource(Resource),
}

/// POST /api/admin/import
pub async fn import(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ImportRequest>,
) -> ApiResult<(StatusCode, Json<Imported>)> {
    let reference = req.reference.trim();
    if reference.is_empty() {
        return Err(ApiError::BadRequest("reference is required".to_string()));
    }
    let importer = importer(&state)?;
    let lang = req.lang.unwrap_or_default();

    let imported = match req.source {
        ImportSource::Wikipedia => {
            let category_id = req
                .category_id
                .clone()
                .ok_or_else(|| ApiError::BadRequest("category_id is required for Wikipedia imports".to_string()))?;
            if !categories::exists(&state.db, &category_id).await? {
                return Err(ApiError::BadRequest(format!("Unknown category: {}", category_id)));
            }

            let summary = importer.wikipedia.summary(lang.as_str(), reference).await?;
            let title = LocalizedText::single(lang, summary.title.clone());
            let slug = resolve_slug(&state, "topics", None, &title, None).await?;
            let input = TopicInput {
                category_id,
                slug,
                kind: TopicKind::Article,
                title,
                summary: LocalizedText::single(lang, first_sentence(&summary.extract)),
                body: LocalizedText::single(lang, summary.extract.clone()),
                access_level: Tier::default(),
                position: 0,
                source_url: Some(summary.url.clone()),
            };
            Imported::Topic(topics::create(&state.db, &input, Origin::Imported, Some(&admin.user.id)).await?)
        }
        ImportSource::Commons => {
            let topic_id = checked_topic(&state, req.topic_id.clone()).await?;
            let image = importer.commons.image(reference).await?;
            let input = ResourceInput {
                topic_id,
                kind: ResourceKind::Image,
                title: LocalizedText::new(image.title.clone(), image.title.clone()),
                url: image.url.clone(),
                attribution: image.attribution(),
                access_level: Tier::default(),
            };
            Imported::Resource(resources::create(&state.db, &input).await?)
        }
        ImportSource::Pubmed => {
            let topic_id = checked_topic(&state, req.topic_id.clone()).await?;
            let article = importer.pubmed.article(reference).await?;
            let citation = article.citation();
            let input = ResourceInput {
                topic_id,
                kind: ResourceKind::Link,
                title: LocalizedText::new(citation.clone(), citation),
                url: article.url.clone(),
                attribution: Some(article.journal.clone()).filter(|j| !j.is_empty()),
                access_level: Tier::default(),
            };
            Imported::Resource(resources::create(&state.db, &input).await?)
        }
    };

    info!("Imported {} '{}' by {}", req.source.as_str(), reference, admin.user.id);
    Ok((StatusCode::CREATED, Json(imported)))
}

async fn checked_topic(state: &AppState, topic_id: Option<String>) -> ApiResult<Option<String>> {
    if let Some(id) = &topic_id {
        if topics::get(&state.db, id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("Unknown topic: {}", id)));
        }
    }
    Ok(topic_id)
}

/// Leading sentence of an extract, used as the topic summary
fn first_sentence(text: &str) -> String {
    let text = text.trim();
    match text.find(". ") {
        Some(end) => text[..=end].to_string(),
        None => text.to_string(),
    }
}

pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/import/search", get(search))
        .route("/api/admin/import", post(import))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sentence() {
        assert_eq!(
            first_sentence("Masajul este o terapie. Are multe forme."),
            "Masajul este o terapie."
        );
        assert_eq!(first_sentence("  Fără punct  "), "Fără punct");
    }
}
