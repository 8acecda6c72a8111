use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::models::ArticleResult;
use crate::registry::{host_from_url, normalize_domain};

const API_BASE_URL: &str = "https://api.exa.ai";

/// Shown in place of article text when the upstream returns none.
pub const EMPTY_TEXT_PLACEHOLDER: &str =
    "[No article text returned by Exa for this result. Open the source link to read it.]";

/// Search request against the gated domain set.
#[derive(Debug)]
pub struct SearchParams<'a> {
    pub query: &'a str,
    pub include_domains: &'a [String],
    pub num_results: u32,
    /// ISO 8601 bounds, passed through to the upstream API.
    pub start_published: Option<String>,
    pub end_published: Option<String>,
}

/// Client for the Exa search API. Enforces the registry allow-list on both
/// the outgoing domain filter and the returned result hostnames.
#[derive(Debug, Clone)]
pub struct ExaClient {
    http: reqwest::Client,
    base_url: String,
}

/// One upstream search hit, before gating. Parsed per-entry so a malformed
/// result drops that entry, not the batch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    title: Option<String>,
    url: String,
    published_date: Option<String>,
    author: Option<String>,
    text: Option<String>,
}

impl ExaClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, AdapterError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| AdapterError::MissingKey("EXA_API_KEY"))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("rasad/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(ExaClient {
            http,
            base_url: API_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Run a search restricted to `allowed ∩ params.include_domains`.
    ///
    /// An empty intersection short-circuits to an empty result set without
    /// an upstream call. Results are hostname-gated again on the way back,
    /// deduplicated by URL, and blank text is replaced with a placeholder.
    pub async fn search(
        &self,
        allowed: &HashSet<String>,
        params: &SearchParams<'_>,
    ) -> Result<Vec<ArticleResult>, AdapterError> {
        let mut seen_domains = HashSet::new();
        let gated: Vec<String> = params
            .include_domains
            .iter()
            .map(|d| normalize_domain(d))
            .filter(|d| allowed.contains(d))
            .filter(|d| seen_domains.insert(d.clone()))
            .collect();

        if gated.is_empty() {
            debug!(query = %params.query, "no requested domain passed the allow-list, skipping search");
            return Ok(Vec::new());
        }

        let mut body = json!({
            "query": params.query,
            "includeDomains": &gated,
            "numResults": params.num_results.clamp(1, 20),
            "contents": { "text": true },
        });
        if let Some(ref start) = params.start_published {
            body["startPublishedDate"] = json!(start);
        }
        if let Some(ref end) = params.end_published {
            body["endPublishedDate"] = json!(end);
        }

        debug!(query = %params.query, domains = gated.len(), "searching Exa");

        let response = self.http.post(format!("{}/search", self.base_url)).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }

        let data: serde_json::Value = response.json().await?;
        let raw_results = data
            .get("results")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        let gated_set: HashSet<&str> = gated.iter().map(String::as_str).collect();
        let mut seen_urls = HashSet::new();
        let mut articles = Vec::new();

        for raw in raw_results {
            let result: RawResult = match serde_json::from_value(raw) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "skipping malformed search result");
                    continue;
                }
            };

            // Hard gate: the result hostname must be registered AND requested.
            let domain = match host_from_url(&result.url) {
                Some(host) if allowed.contains(&host) && gated_set.contains(host.as_str()) => host,
                _ => continue,
            };

            let url = result.url.trim().to_string();
            if url.is_empty() || !seen_urls.insert(url.clone()) {
                continue;
            }

            let text = match result.text {
                Some(ref t) if !t.trim().is_empty() => t.clone(),
                _ => EMPTY_TEXT_PLACEHOLDER.to_string(),
            };

            articles.push(ArticleResult {
                title: result.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| "Untitled".to_string()),
                url,
                published_date: result.published_date,
                author: result.author,
                text,
                domain,
            });
        }

        Ok(articles)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
