use serde::{Deserialize, Serialize};

/// Text extracted from one source URL. `error` is set when the fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub url: String,
    pub content: String,
    pub error: Option<String>,
}

impl SourceSummary {
    pub fn fetched(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

/// A single web search snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Everything gathered for one market
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchContext {
    pub source_summaries: Vec<SourceSummary>,
    pub search_results: Vec<SearchResult>,
}

impl ResearchContext {
    pub fn is_empty(&self) -> bool {
        self.source_summaries.is_empty() && self.search_results.is_empty()
    }

    /// Render as the evidence section of a judge prompt
    pub fn to_prompt_section(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.source_summaries.is_empty() {
            parts.push("### Fetched Sources".to_string());
            for s in &self.source_summaries {
                match &s.error {
                    Some(err) => parts.push(format!("- {}: [Error: {}]", s.url, err)),
                    None => parts.push(format!("**{}**\n{}\n", s.url, s.content)),
                }
            }
        }

        if !self.search_results.is_empty() {
            parts.push("### Web Search Results".to_string());
            for r in &self.search_results {
                parts.push(format!("- **{}** ({})\n  {}", r.title, r.url, r.snippet));
            }
        }

        if parts.is_empty() {
            "No research context available.".to_string()
        } else {
            parts.join("\n")
        }
    }
}
