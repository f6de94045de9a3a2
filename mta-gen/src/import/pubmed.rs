//! PubMed search through NCBI E-utilities (esearch + esummary)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::rate_limit::RateLimiter;
use super::{build_http_client, fetch_text, ClientOptions, SEARCH_LIMIT};
use crate::error::{GenError, Result};

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// Authors listed by name before "et al."
const CITATION_AUTHORS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubmedArticle {
    pub pmid: String,
    pub title: String,
    pub journal: String,
    pub pub_date: String,
    pub authors: Vec<String>,
    pub url: String,
}

impl PubmedArticle {
    /// Short citation: `Authors. Title. Journal. Date.`
    pub fn citation(&self) -> String {
        let mut authors = self
            .authors
            .iter()
            .take(CITATION_AUTHORS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if self.authors.len() > CITATION_AUTHORS {
            authors.push_str(", et al");
        }

        let mut parts = Vec::new();
        for part in [authors.as_str(), self.title.as_str(), self.journal.as_str(), self.pub_date.as_str()] {
            let part = part.trim().trim_end_matches('.');
            if !part.is_empty() {
                parts.push(format!("{}.", part));
            }
        }
        parts.join(" ")
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

pub fn is_valid_pmid(pmid: &str) -> bool {
    !pmid.is_empty() && pmid.len() <= 10 && pmid.chars().all(|c| c.is_ascii_digit())
}

pub fn parse_search(body: &str) -> Result<Vec<String>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| GenError::Parse(e.to_string()))?;
    Ok(response.esearchresult.idlist)
}

/// Parse an esummary response, keeping the `uids` order
pub fn parse_summaries(body: &str) -> Result<Vec<PubmedArticle>> {
    let value: Value = serde_json::from_str(body).map_err(|e| GenError::Parse(e.to_string()))?;
    let result = value
        .get("result")
        .and_then(Value::as_object)
        .ok_or_else(|| GenError::Parse("esummary response has no result".to_string()))?;

    let uids: Vec<&str> = result
        .get("uids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let text = |doc: &Value, key: &str| -> String {
        doc.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    let mut articles = Vec::with_capacity(uids.len());
    for uid in uids {
        let Some(doc) = result.get(uid) else { continue };
        if doc.get("error").is_some() {
            continue;
        }

        let journal = Some(text(doc, "fulljournalname"))
            .filter(|j| !j.is_empty())
            .unwrap_or_else(|| text(doc, "source"));
        let authors = doc
            .get("authors")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        articles.push(PubmedArticle {
            pmid: uid.to_string(),
            title: text(doc, "title"),
            journal,
            pub_date: text(doc, "pubdate"),
            authors,
            url: format!("{}/{}/", ARTICLE_URL, uid),
        });
    }
    Ok(articles)
}

pub struct PubmedClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl PubmedClient {
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

    /// PMIDs matching `term`, best match first
    pub async fn search(&self, term: &str) -> Result<Vec<String>> {
        self.rate_limiter.wait().await;
        debug!(term = %term, "Searching PubMed");

        let limit = SEARCH_LIMIT.to_string();
        let request = self
            .http_client
            .get(format!("{}/esearch.fcgi", self.base_url))
            .query(&[
                ("db", "pubmed"),
                ("retmode", "json"),
                ("sort", "relevance"),
                ("term", term),
                ("retmax", limit.as_str()),
            ]);

        let body = fetch_text(request, "PubMed search").await?;
        parse_search(&body)
    }

    pub async fn summaries(&self, pmids: &[String]) -> Result<Vec<PubmedArticle>> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = pmids.iter().find(|id| !is_valid_pmid(id)) {
            return Err(GenError::InvalidRequest(format!("Invalid PMID: {}", bad)));
        }

        self.rate_limiter.wait().await;
        let ids = pmids.join(",");
        debug!(ids = %ids, "Fetching PubMed summaries");

        let request = self
            .http_client
            .get(format!("{}/esummary.fcgi", self.base_url))
            .query(&[("db", "pubmed"), ("retmode", "json"), ("id", ids.as_str())]);

        let body = fetch_text(request, "PubMed summaries").await?;
        parse_summaries(&body)
    }

    pub async fn article(&self, pmid: &str) -> Result<PubmedArticle> {
        let pmid = pmid.trim().to_string();
        self.summaries(std::slice::from_ref(&pmid))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GenError::NotFound(format!("PubMed article {}", pmid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let body = r#"{"header": {"type": "esearch"}, "esearchresult": {"count": "2", "idlist": ["31234567", "30111222"]}}"#;
        assert_eq!(parse_search(body).unwrap(), vec!["31234567", "30111222"]);
    }

    #[test]
    fn test_parse_summaries() {
        let body = r#"{
            "header": {"type": "esummary"},
            "result": {
                "uids": ["31234567", "99"],
                "31234567": {
                    "uid": "31234567",
                    "pubdate": "2019 Aug",
                    "source": "J Bodyw Mov Ther",
                    "fulljournalname": "Journal of bodywork and movement therapies",
                    "title": "Effects of massage on delayed-onset muscle soreness.",
                    "authors": [
                        {"name": "Popescu A", "authtype": "Author"},
                        {"name": "Ivanov B", "authtype": "Author"},
                        {"name": "Rusu C", "authtype": "Author"},
                        {"name": "Ceban D", "authtype": "Author"}
                    ]
                },
                "99": {"uid": "99", "error": "cannot get document summary"}
            }
        }"#;
        let articles = parse_summaries(body).unwrap();
        assert_eq!(articles.len(), 1);

        let article = &articles[0];
        assert_eq!(article.journal, "Journal of bodywork and movement therapies");
        assert_eq!(article.url, "https://pubmed.ncbi.nlm.nih.gov/31234567/");
        assert_eq!(
            article.citation(),
            "Popescu A, Ivanov B, Rusu C, et al. Effects of massage on delayed-onset muscle soreness. \
             Journal of bodywork and movement therapies. 2019 Aug."
        );
    }

    #[test]
    fn test_pmid_validation() {
        assert!(is_valid_pmid("31234567"));
        assert!(!is_valid_pmid("31234567;drop"));
        assert!(!is_valid_pmid(""));
    }
}
