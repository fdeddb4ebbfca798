//! Firecrawl page scraping adapter with a local disk cache.
//!
//! Scrape failures never surface as `Err`: the contract is a `ScrapedPage`
//! with `success: false` and an `error` message, which the research step
//! renders inline so the reasoning loop can route around dead URLs. Failed
//! scrapes are cached too, so a bad URL is not re-fetched across runs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::clean_llm_outputted_url;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

/// Result of scraping one web page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: String,
    pub title: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapedPage {
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            markdown: String::new(),
            title: None,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Render for model context; failures become inline error text.
    pub fn to_context_text(&self) -> String {
        if self.success {
            format!(
                "Scraped {}\nTitle: {}\n\n{}",
                self.url,
                self.title.as_deref().unwrap_or("(untitled)"),
                self.markdown
            )
        } else {
            format!(
                "Failed to scrape {}: {}",
                self.url,
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

/// Page scraping capability consumed by the research step.
///
/// Infallible by contract: errors are carried inside the returned page.
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    async fn scrape(&self, url: &str) -> ScrapedPage;
}

/// Disk cache of scraped pages, keyed by a hash of the normalized URL.
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        let normalized = url.trim().to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }

    /// Load a cached page; corrupted entries are removed and treated as a
    /// miss.
    pub fn load(&self, url: &str) -> Option<ScrapedPage> {
        let path = self.cache_path(url);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<ScrapedPage>(&raw) {
            Ok(page) if page.url.to_lowercase() == url.trim().to_lowercase() => Some(page),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Removing corrupted cache entry");
                let _ = std::fs::remove_file(&path);
                None
            }
        }
    }

    pub fn store(&self, page: &ScrapedPage) {
        let path = self.cache_path(&page.url);
        match serde_json::to_string_pretty(page) {
            Ok(body) => {
                if let Err(e) = std::fs::write(&path, body) {
                    warn!(path = %path.display(), error = %e, "Failed to write cache entry");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize page for cache"),
        }
    }

    /// Remove all cached pages, returning how many entries were deleted.
    pub fn clear(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[derive(Serialize)]
struct FirecrawlRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
}

#[derive(Deserialize)]
struct FirecrawlResponse {
    #[serde(default)]
    data: Option<FirecrawlData>,
}

#[derive(Deserialize)]
struct FirecrawlData {
    #[serde(default)]
    markdown: String,
    #[serde(default)]
    metadata: Option<FirecrawlMetadata>,
}

#[derive(Deserialize)]
struct FirecrawlMetadata {
    #[serde(default)]
    title: Option<String>,
}

/// Production `ScrapeProvider` backed by the Firecrawl API.
pub struct FirecrawlClient {
    api_key: String,
    base_url: String,
    client: Client,
    max_chars: usize,
    cache: Option<PageCache>,
}

impl FirecrawlClient {
    pub fn new(api_key: impl Into<String>, max_chars: usize) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.firecrawl.dev".to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            max_chars,
            cache: None,
        }
    }

    /// Create from the `FIRECRAWL_API_KEY` environment variable.
    pub fn from_env(max_chars: usize) -> Option<Self> {
        let api_key = std::env::var("FIRECRAWL_API_KEY").ok()?;
        Some(Self::new(api_key, max_chars))
    }

    /// Point at a different endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Cache scraped pages (hits and failures) under the given directory.
    pub fn with_cache(mut self, dir: impl AsRef<Path>) -> std::io::Result<Self> {
        self.cache = Some(PageCache::new(dir.as_ref().to_path_buf())?);
        Ok(self)
    }

    async fn fetch(&self, url: &str) -> ScrapedPage {
        let request = FirecrawlRequest {
            url,
            formats: ["markdown"],
        };

        let response = match self
            .client
            .post(format!("{}/v2/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ScrapedPage::failure(url, format!("request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return ScrapedPage::failure(url, format!("HTTP {status}: {body}"));
        }

        let parsed: FirecrawlResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return ScrapedPage::failure(url, format!("invalid response body: {e}")),
        };

        let Some(data) = parsed.data else {
            return ScrapedPage::failure(url, "response contained no page data");
        };

        let mut markdown = data.markdown;
        if markdown.chars().count() > self.max_chars {
            markdown = markdown.chars().take(self.max_chars).collect::<String>();
            markdown.push_str(TRUNCATION_MARKER);
        }

        ScrapedPage {
            url: url.to_string(),
            markdown,
            title: data.metadata.and_then(|m| m.title),
            success: true,
            error: None,
        }
    }
}

#[async_trait]
impl ScrapeProvider for FirecrawlClient {
    async fn scrape(&self, url: &str) -> ScrapedPage {
        let url = clean_llm_outputted_url(url);

        if let Some(cache) = &self.cache {
            if let Some(page) = cache.load(&url) {
                debug!(url, "Scrape cache hit");
                return page;
            }
        }

        if url.to_lowercase().ends_with(".pdf") {
            let page = ScrapedPage::failure(&url, "PDF scraping is unavailable");
            if let Some(cache) = &self.cache {
                cache.store(&page);
            }
            return page;
        }

        debug!(url, "Scraping page");
        let page = self.fetch(&url).await;

        if let Some(cache) = &self.cache {
            cache.store(&page);
        }
        page
    }
}
