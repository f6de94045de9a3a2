//! Wikimedia Commons image search

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::rate_limit::RateLimiter;
use super::{build_http_client, fetch_text, strip_html, ClientOptions, SEARCH_LIMIT};
use crate::error::{GenError, Result};

pub const DEFAULT_BASE_URL: &str = "https://commons.wikimedia.org";

/// File namespace on Commons
const FILE_NAMESPACE: &str = "6";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonsImage {
    /// File page title, e.g. `File:Trapezius.png`
    pub title: String,
    /// Direct media URL
    pub url: String,
    /// File description page
    pub page_url: String,
    pub license: Option<String>,
    pub author: Option<String>,
}

impl CommonsImage {
    /// "author, license" with whichever parts are known
    pub fn attribution(&self) -> Option<String> {
        let parts: Vec<&str> = [self.author.as_deref(), self.license.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<Query>,
}

#[derive(Deserialize)]
struct Query {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    index: Option<i64>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Deserialize)]
struct ImageInfo {
    url: String,
    descriptionurl: String,
    #[serde(default)]
    extmetadata: HashMap<String, Value>,
}

fn metadata_text(meta: &HashMap<String, Value>, key: &str) -> Option<String> {
    meta.get(key)
        .and_then(|v| v.get("value"))
        .and_then(Value::as_str)
        .map(strip_html)
        .filter(|s| !s.is_empty())
}

/// Parse an `action=query&prop=imageinfo` response, ordered by search rank
pub fn parse_images(body: &str) -> Result<Vec<CommonsImage>> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| GenError::Parse(e.to_string()))?;

    let mut pages: Vec<Page> = response
        .query
        .map(|q| q.pages.into_values().collect())
        .unwrap_or_default();
    pages.sort_by_key(|p| p.index.unwrap_or(i64::MAX));

    Ok(pages
        .into_iter()
        .filter_map(|page| {
            let info = page.imageinfo.into_iter().next()?;
            Some(CommonsImage {
                license: metadata_text(&info.extmetadata, "LicenseShortName"),
                author: metadata_text(&info.extmetadata, "Artist"),
                title: page.title,
                url: info.url,
                page_url: info.descriptionurl,
            })
        })
        .collect())
}

pub struct CommonsClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl CommonsClient {
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::new(DEFAULT_BASE_URL))
    }

    pub fn with_options(options: ClientOptions) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(&options)?,
            rate_limiter: Arc::new(RateLimiter::new(options.min_interval)),
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self) -> String {
        format!("{}/w/api.php", self.base_url)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<CommonsImage>> {
        self.rate_limiter.wait().await;
        debug!(query = %query, "Searching Wikimedia Commons");

        let limit = SEARCH_LIMIT.to_string();
        let request = self.http_client.get(self.api_url()).query(&[
            ("action", "query"),
            ("format", "json"),
            ("generator", "search"),
            ("gsrsearch", query),
            ("gsrnamespace", FILE_NAMESPACE),
            ("gsrlimit", limit.as_str()),
            ("prop", "imageinfo"),
            ("iiprop", "url|extmetadata"),
        ]);

        let body = fetch_text(request, "Commons search").await?;
        parse_images(&body)
    }

    /// Look up one file by title (`File:` prefix optional)
    pub async fn image(&self, title: &str) -> Result<CommonsImage> {
        let title = title.trim();
        if title.is_empty() {
            return Err(GenError::InvalidRequest("File title must not be empty".to_string()));
        }
        let title = if title.starts_with("File:") {
            title.to_string()
        } else {
            format!("File:{}", title)
        };

        self.rate_limiter.wait().await;
        debug!(title = %title, "Fetching Commons file");

        let request = self.http_client.get(self.api_url()).query(&[
            ("action", "query"),
            ("format", "json"),
            ("titles", title.as_str()),
            ("prop", "imageinfo"),
            ("iiprop", "url|extmetadata"),
        ]);

        let body = fetch_text(request, "Commons file").await?;
        parse_images(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| GenError::NotFound(format!("Commons file '{}'", title)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
        "batchcomplete": "",
        "query": {
            "pages": {
                "202": {
                    "pageid": 202, "ns": 6, "title": "File:Deltoid.png", "index": 2,
                    "imageinfo": [{
                        "url": "https://upload.wikimedia.org/d.png",
                        "descriptionurl": "https://commons.wikimedia.org/wiki/File:Deltoid.png",
                        "extmetadata": {}
                    }]
                },
                "101": {
                    "pageid": 101, "ns": 6, "title": "File:Trapezius.png", "index": 1,
                    "imageinfo": [{
                        "url": "https://upload.wikimedia.org/t.png",
                        "descriptionurl": "https://commons.wikimedia.org/wiki/File:Trapezius.png",
                        "extmetadata": {
                            "LicenseShortName": {"value": "CC BY-SA 4.0", "source": "commons-desc-page"},
                            "Artist": {"value": "<a href=\"//commons.wikimedia.org/wiki/User:Anatomist\">Anatomist</a>"}
                        }
                    }]
                },
                "-1": {"ns": 6, "title": "File:Missing.png", "missing": ""}
            }
        }
    }"#;

    #[test]
    fn test_parse_images_ordered_by_index() {
        let images = parse_images(SEARCH_BODY).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].title, "File:Trapezius.png");
        assert_eq!(images[0].author.as_deref(), Some("Anatomist"));
        assert_eq!(images[0].license.as_deref(), Some("CC BY-SA 4.0"));
        assert_eq!(images[1].license, None);
    }

    #[test]
    fn test_attribution() {
        let images = parse_images(SEARCH_BODY).unwrap();
        assert_eq!(images[0].attribution().as_deref(), Some("Anatomist, CC BY-SA 4.0"));
        assert_eq!(images[1].attribution(), None);
    }

    #[test]
    fn test_empty_response() {
        assert!(parse_images(r#"{"batchcomplete": ""}"#).unwrap().is_empty());
    }
}
