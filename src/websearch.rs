//! Web search tool backed by the DuckDuckGo Instant Answer API.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::SearchConfig;

/// One web search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Trait for search backends so the agent loop stays testable.
#[async_trait]
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// DuckDuckGo Instant Answer client. No credential required.
pub struct DuckDuckGo {
    client: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGo {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl SearchTool for DuckDuckGo {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            bail!("DuckDuckGo search failed: {}", response.status());
        }

        let payload: Value = response.json().await?;
        let mut hits = parse_instant_answer(&payload);
        hits.truncate(self.max_results);
        Ok(hits)
    }
}

/// Walk the Instant Answer payload: the abstract first, then `Results` and
/// `RelatedTopics` (which nest further under `Topics`).
fn parse_instant_answer(payload: &Value) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
        if let Some(url) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
            if !abstract_text.is_empty() && !url.is_empty() {
                hits.push(SearchHit {
                    title: abstract_text
                        .split(" - ")
                        .next()
                        .unwrap_or(abstract_text)
                        .to_string(),
                    url: url.to_string(),
                    snippet: abstract_text.to_string(),
                });
            }
        }
    }

    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        collect_topics(items, &mut hits);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        collect_topics(items, &mut hits);
    }

    hits
}

fn collect_topics(items: &[Value], hits: &mut Vec<SearchHit>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            collect_topics(topics, hits);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        hits.push(SearchHit {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn abstract_becomes_first_hit() {
        let payload = json!({
            "AbstractText": "Rust - a systems programming language",
            "AbstractURL": "https://www.rust-lang.org",
            "RelatedTopics": []
        });
        let hits = parse_instant_answer(&payload);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Rust");
        assert_eq!(hits[0].url, "https://www.rust-lang.org");
    }

    #[test]
    fn nested_topics_are_flattened() {
        let payload = json!({
            "AbstractText": "",
            "RelatedTopics": [
                {"Text": "First - one", "FirstURL": "https://a.example"},
                {"Topics": [
                    {"Text": "Second - two", "FirstURL": "https://b.example"},
                    {"Text": "", "FirstURL": "https://dropped.example"}
                ]}
            ]
        });
        let hits = parse_instant_answer(&payload);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].url, "https://b.example");
    }

    #[test]
    fn empty_payload_yields_no_hits() {
        let hits = parse_instant_answer(&json!({}));
        assert!(hits.is_empty());
    }
}
