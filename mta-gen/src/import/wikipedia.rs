//! Wikipedia search and page summaries

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::rate_limit::RateLimiter;
use super::{build_http_client, fetch_text, strip_html, ClientOptions, SEARCH_LIMIT};
use crate::error::{GenError, Result};

/// `{lang}` is replaced with the wiki language code
pub const DEFAULT_BASE_URL: &str = "https://{lang}.wikipedia.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiSearchHit {
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiSummary {
    pub title: String,
    pub extract: String,
    pub url: String,
    pub thumbnail: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct RawSummary {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
    #[serde(default)]
    thumbnail: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Deserialize)]
struct PageUrl {
    page: String,
}

#[derive(Deserialize)]
struct Thumbnail {
    source: String,
}

pub fn parse_search(body: &str) -> Result<Vec<WikiSearchHit>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| GenError::Parse(e.to_string()))?;

    Ok(response
        .query
        .map(|q| q.search)
        .unwrap_or_default()
        .into_iter()
        .map(|hit| WikiSearchHit {
            title: hit.title,
            snippet: strip_html(&hit.snippet),
        })
        .collect())
}

/// Parse a REST summary; `fallback_url` is used when the response has no page URL
pub fn parse_summary(body: &str, fallback_url: &str) -> Result<WikiSummary> {
    let raw: RawSummary = serde_json::from_str(body).map_err(|e| GenError::Parse(e.to_string()))?;

    Ok(WikiSummary {
        url: raw
            .content_urls
            .and_then(|u| u.desktop)
            .map(|d| d.page)
            .unwrap_or_else(|| fallback_url.to_string()),
        title: raw.title,
        extract: raw.extract.trim().to_string(),
        thumbnail: raw.thumbnail.map(|t| t.source),
    })
}

fn validate_lang(lang: &str) -> Result<&str> {
    let lang = lang.trim();
    if (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(lang)
    } else {
        Err(GenError::InvalidRequest(format!("Invalid language code: {}", lang)))
    }
}

pub struct WikipediaClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl WikipediaClient {
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::new(DEFAULT_BASE_URL))
    }

    pub fn with_options(options: ClientOptions) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(&options)?,
            rate_limiter: Arc::new(RateLimiter::new(options.min_interval)),
            base_url: options.base_url,
        })
    }

    fn base_for(&self, lang: &str) -> String {
        self.base_url.replace("{lang}", lang).trim_end_matches('/').to_string()
    }

    fn page_url_parsed(&self, lang: &str, path: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_for(lang))
            .map_err(|e| GenError::InvalidRequest(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| GenError::InvalidRequest("Base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    /// Human-facing article URL
    pub fn page_url(&self, lang: &str, title: &str) -> String {
        let title = title.replace(' ', "_");
        self.page_url_parsed(lang, &["wiki", title.as_str()])
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}/wiki/{}", self.base_for(lang), title))
    }

    pub async fn search(&self, lang: &str, query: &str) -> Result<Vec<WikiSearchHit>> {
        let lang = validate_lang(lang)?;
        self.rate_limiter.wait().await;

        let url = format!("{}/w/api.php", self.base_for(lang));
        debug!(lang = %lang, query = %query, "Searching Wikipedia");

        let limit = SEARCH_LIMIT.to_string();
        let request = self.http_client.get(&url).query(&[
            ("action", "query"),
            ("list", "search"),
            ("format", "json"),
            ("srsearch", query),
            ("srlimit", limit.as_str()),
        ]);

        let body = fetch_text(request, "Wikipedia search").await?;
        parse_search(&body)
    }

    pub async fn summary(&self, lang: &str, title: &str) -> Result<WikiSummary> {
        let lang = validate_lang(lang)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(GenError::InvalidRequest("Title must not be empty".to_string()));
        }
        self.rate_limiter.wait().await;

        let page_title = title.replace(' ', "_");
        let url = self.page_url_parsed(lang, &["api", "rest_v1", "page", "summary", page_title.as_str()])?;
        debug!(lang = %lang, title = %title, "Fetching Wikipedia summary");

        let body = fetch_text(self.http_client.get(url), &format!("Wikipedia page '{}'", title)).await?;
        parse_summary(&body, &self.page_url(lang, title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let body = r#"{
            "batchcomplete": "",
            "query": {
                "searchinfo": {"totalhits": 2},
                "search": [
                    {"ns": 0, "title": "Trapezius", "pageid": 1, "snippet": "The <span class=\"searchmatch\">trapezius</span> is a large muscle"},
                    {"ns": 0, "title": "Trapezius muscle", "pageid": 2}
                ]
            }
        }"#;
        let hits = parse_search(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "The trapezius is a large muscle");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn test_parse_search_without_query() {
        assert!(parse_search(r#"{"batchcomplete": ""}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_summary() {
        let body = r#"{
            "type": "standard",
            "title": "Mușchiul trapez",
            "extract": "Mușchiul trapez este un mușchi superficial.  ",
            "thumbnail": {"source": "https://upload.wikimedia.org/t.png", "width": 320},
            "content_urls": {"desktop": {"page": "https://ro.wikipedia.org/wiki/Mu%C8%99chiul_trapez"}}
        }"#;
        let summary = parse_summary(body, "fallback").unwrap();
        assert_eq!(summary.extract, "Mușchiul trapez este un mușchi superficial.");
        assert_eq!(summary.thumbnail.as_deref(), Some("https://upload.wikimedia.org/t.png"));
        assert!(summary.url.starts_with("https://ro.wikipedia.org/wiki/"));
    }

    #[test]
    fn test_summary_fallback_url() {
        let summary = parse_summary(r#"{"title": "X"}"#, "https://ru.wikipedia.org/wiki/X").unwrap();
        assert_eq!(summary.url, "https://ru.wikipedia.org/wiki/X");
    }

    #[test]
    fn test_page_url_encodes_title() {
        let client = WikipediaClient::new().unwrap();
        assert_eq!(
            client.page_url("ro", "Masaj terapeutic"),
            "https://ro.wikipedia.org/wiki/Masaj_terapeutic"
        );
    }

    #[test]
    fn test_lang_validation() {
        assert!(validate_lang("ru").is_ok());
        assert!(validate_lang("evil.com/").is_err());
        assert!(validate_lang("").is_err());
    }
}
