//! Research tool adapters: web search and page scraping.
//!
//! These wrap the external Serper and Firecrawl APIs behind the two
//! capability traits the research step calls as tools. Stubs implement the
//! same traits in tests.

mod scrape;
mod search;

pub use scrape::{FirecrawlClient, PageCache, ScrapeProvider, ScrapedPage};
pub(crate) use search::format_results;
pub use search::{SearchError, SearchProvider, SearchResult, SerperClient};

/// Normalize a URL as emitted by a model.
///
/// Structured-output generation sometimes produces quoted strings or a JSON
/// object of the shape `{"anyOf": [url, null]}`; unwrap to the first
/// non-null string member before use.
pub fn clean_llm_outputted_url(url: &str) -> String {
    let cleaned = url.trim().trim_matches('"').trim_matches('\'');

    if cleaned.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(cleaned) {
            if let Some(serde_json::Value::Array(members)) = map.get("anyOf") {
                for member in members {
                    if let serde_json::Value::String(s) = member {
                        if !s.is_empty() {
                            return s.trim_matches('"').trim_matches('\'').to_string();
                        }
                    }
                }
            }
        }
    }

    cleaned.to_string()
}
