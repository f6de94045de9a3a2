//! External content import
//!
//! Search clients for Wikipedia, Wikimedia Commons and PubMed. Each client
//! keeps its own rate limiter (one request per second by default), sends a
//! descriptive User-Agent and accepts an overridden base URL. Response
//! parsing is split into pure functions so it can be tested offline.

mod rate_limit;

pub mod commons;
pub mod pubmed;
pub mod wikipedia;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub use commons::{CommonsClient, CommonsImage};
pub use pubmed::{PubmedArticle, PubmedClient};
pub use wikipedia::{WikiSearchHit, WikiSummary, WikipediaClient};

use crate::error::{GenError, Result};

pub const USER_AGENT: &str = concat!(
    "MTA-Academy/",
    env!("CARGO_PKG_VERSION"),
    " (massage therapy course platform; content import)"
);

/// Results returned by one search call
pub const SEARCH_LIMIT: usize = 10;

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSource {
    Wikipedia,
    Commons,
    Pubmed,
}

impl ImportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportSource::Wikipedia => "wikipedia",
            ImportSource::Commons => "commons",
            ImportSource::Pubmed => "pubmed",
        }
    }
}

impl FromStr for ImportSource {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wikipedia" => Ok(ImportSource::Wikipedia),
            "commons" => Ok(ImportSource::Commons),
            "pubmed" => Ok(ImportSource::Pubmed),
            other => Err(GenError::InvalidRequest(format!("Unknown import source: {}", other))),
        }
    }
}

/// Source-independent search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHit {
    pub source: ImportSource,
    /// Identifier to pass back when importing (page title, file title, PMID)
    pub reference: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Per-client connection options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub(crate) fn build_http_client(options: &ClientOptions) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(options.timeout)
        .build()
        .map_err(|e| GenError::Network(e.to_string()))
}

/// Send a request and return the body of a successful response
pub(crate) async fn fetch_text(request: reqwest::RequestBuilder, what: &str) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GenError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GenError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.text().await?)
}

/// Remove HTML tags and decode the handful of entities upstream APIs emit
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    let decoded = out
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The three import clients behind one search entry point
pub struct Importer {
    pub wikipedia: WikipediaClient,
    pub commons: CommonsClient,
    pub pubmed: PubmedClient,
}

impl Importer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            wikipedia: WikipediaClient::new()?,
            commons: CommonsClient::new()?,
            pubmed: PubmedClient::new()?,
        })
    }

    /// Search one source; `lang` only applies to Wikipedia
    pub async fn search(&self, source: ImportSource, query: &str, lang: &str) -> Result<Vec<ImportHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GenError::InvalidRequest("Query must not be empty".to_string()));
        }

        match source {
            ImportSource::Wikipedia => {
                let hits = self.wikipedia.search(lang, query).await?;
                Ok(hits
                    .into_iter()
                    .map(|hit| ImportHit {
                        source,
                        url: self.wikipedia.page_url(lang, &hit.title),
                        reference: hit.title.clone(),
                        title: hit.title,
                        snippet: Some(hit.snippet).filter(|s| !s.is_empty()),
                        thumbnail: None,
                    })
                    .collect())
            }
            ImportSource::Commons => {
                let images = self.commons.search(query).await?;
                Ok(images
                    .into_iter()
                    .map(|image| ImportHit {
                        source,
                        reference: image.title.clone(),
                        snippet: image.attribution(),
                        thumbnail: Some(image.url.clone()),
                        title: image.title,
                        url: image.page_url,
                    })
                    .collect())
            }
            ImportSource::Pubmed => {
                let ids = self.pubmed.search(query).await?;
                let articles = self.pubmed.summaries(&ids).await?;
                Ok(articles
                    .into_iter()
                    .map(|article| ImportHit {
                        source,
                        reference: article.pmid.clone(),
                        snippet: Some(format!("{} ({})", article.journal, article.pub_date)),
                        title: article.title,
                        url: article.url,
                        thumbnail: None,
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        let snippet = r#"The <span class="searchmatch">trapezius</span> muscle &amp; its&nbsp;fibres"#;
        assert_eq!(strip_html(snippet), "The trapezius muscle & its fibres");
    }

    #[test]
    fn test_source_parse() {
        assert_eq!("PubMed".parse::<ImportSource>().unwrap(), ImportSource::Pubmed);
        assert!("scholar".parse::<ImportSource>().is_err());
    }

    #[test]
    fn test_user_agent_descriptive() {
        assert!(USER_AGENT.starts_with("MTA-Academy/"));
    }
}
