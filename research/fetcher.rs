// Web research: page fetching and Brave search

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::time::Duration;
use tracing::{info, warn};

use super::context::{ResearchContext, SearchResult, SourceSummary};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Characters kept from each fetched page before "..." is appended
pub const MAX_CONTENT_LENGTH: usize = 2000;
/// Cap on search snippets across all queries
pub const MAX_SEARCH_RESULTS: usize = 5;
pub const FETCH_TIMEOUT_SECS: u64 = 15;
pub const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

const SKIPPED_TAGS: [&str; 5] = ["script", "style", "nav", "footer", "header"];

// ============================================================================
// EVIDENCE SOURCE TRAIT
// ============================================================================

/// Anything that can turn URLs and queries into research context.
///
/// Per-item failures are recorded inside the context; gathering itself
/// never fails.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn gather(&self, sources: &[String], search_queries: &[String]) -> ResearchContext;
}

// ============================================================================
// TEXT EXTRACTION
// ============================================================================

/// Visible text of an HTML document, one text run per line
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();
    collect_text(document.root_element(), &mut lines);
    lines.join("\n")
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !SKIPPED_TAGS.contains(&child_element.value().name()) {
                collect_text(child_element, lines);
            }
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }
}

/// Keep the first `MAX_CONTENT_LENGTH` characters, marking the cut with "..."
pub fn truncate_content(text: String) -> String {
    match text.char_indices().nth(MAX_CONTENT_LENGTH) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

// ============================================================================
// WEB RESEARCHER
// ============================================================================

pub struct WebResearcher {
    brave_api_key: Option<String>,
    search_url: String,
    timeout: Duration,
}

impl WebResearcher {
    pub fn new(brave_api_key: Option<String>) -> Self {
        Self {
            brave_api_key,
            search_url: BRAVE_SEARCH_URL.to_string(),
            timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    fn client(&self) -> Result<reqwest::Client, String> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))
    }

    /// Fetch one URL; failures become an error marker with empty content
    pub async fn fetch_url(&self, client: &reqwest::Client, url: &str) -> SourceSummary {
        let result = async {
            let resp = client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| e.to_string())?;
            resp.text().await.map_err(|e| e.to_string())
        }
        .await;

        match result {
            Ok(html) => SourceSummary::fetched(url, truncate_content(extract_text(&html))),
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                SourceSummary::failed(url, e)
            }
        }
    }

    /// Run one Brave web search; no key or any failure yields no results
    pub async fn brave_search(&self, client: &reqwest::Client, query: &str) -> Vec<SearchResult> {
        let Some(api_key) = self.brave_api_key.as_deref() else {
            warn!("BRAVE_API_KEY not set, skipping web search");
            return Vec::new();
        };

        let count = MAX_SEARCH_RESULTS.to_string();
        let result = async {
            let resp = client
                .get(&self.search_url)
                .query(&[("q", query), ("count", count.as_str())])
                .header("X-Subscription-Token", api_key)
                .header("Accept", "application/json")
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| e.to_string())?;
            resp.json::<serde_json::Value>().await.map_err(|e| e.to_string())
        }
        .await;

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                warn!("Brave search failed for '{}': {}", query, e);
                return Vec::new();
            }
        };

        data["web"]["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .take(MAX_SEARCH_RESULTS)
                    .map(|item| SearchResult {
                        title: item["title"].as_str().unwrap_or_default().to_string(),
                        url: item["url"].as_str().unwrap_or_default().to_string(),
                        snippet: item["description"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl EvidenceSource for WebResearcher {
    async fn gather(&self, sources: &[String], search_queries: &[String]) -> ResearchContext {
        let mut context = ResearchContext::default();

        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                warn!("{}", e);
                context.source_summaries = sources.iter().map(|url| SourceSummary::failed(url, e.clone())).collect();
                return context;
            }
        };

        for url in sources {
            context.source_summaries.push(self.fetch_url(&client, url).await);
        }
        for query in search_queries {
            context.search_results.extend(self.brave_search(&client, query).await);
        }
        context.search_results.truncate(MAX_SEARCH_RESULTS);

        info!(
            "🔎 Research: {} sources, {} search results",
            context.source_summaries.len(),
            context.search_results.len()
        );
        context
    }
}

// ============================================================================
// TESTS
// ============================================================================
