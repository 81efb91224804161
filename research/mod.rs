// ============================================================================
// Research Module - Evidence Gathering for Judge Prompts
// ============================================================================
//
// This module collects the supporting material every judge reads before
// deciding a market: fetched source pages and web-search snippets.
//
// Flow: source URLs + search queries → WebResearcher → ResearchContext
//       → to_prompt_section() → evidence string
// ============================================================================

pub mod context;
pub mod fetcher;

pub use context::*;
pub use fetcher::*;
