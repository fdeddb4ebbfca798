//! Runtime configuration.
//!
//! `Settings` follows a defaults-plus-environment pattern: `Default` supplies
//! working values, `from_env()` overrides from the process environment.
//! `IcpContext` carries the ideal-customer-profile and offering text that is
//! injected into classifier, profiler, and judge prompts.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Pipeline-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Model used by research/classification/profile steps.
    pub model: String,

    /// Model used by the judges. Judges pin temperature to 0.0 regardless.
    pub judge_model: String,

    /// Base URL of the OpenAI-compatible chat completions API.
    pub api_base: String,

    /// Maximum classify -> research rounds before forcing a verdict.
    pub max_investigation_rounds: usize,

    /// Maximum profile -> research rounds.
    pub max_profile_rounds: usize,

    /// Tool-call budget for one research step invocation.
    pub max_tool_calls: usize,

    /// Maximum results returned per search call.
    pub max_search_results: usize,

    /// Scraped markdown is truncated to this many characters before it
    /// re-enters model context.
    pub scrape_max_chars: usize,

    /// Parallel lanes for batch evaluation across leads.
    pub parallel_lanes: usize,

    /// Root directory for the scrape cache and blackboard store.
    pub cache_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            judge_model: "gpt-4.1".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            max_investigation_rounds: 5,
            max_profile_rounds: 3,
            max_tool_calls: 5,
            max_search_results: 10,
            scrape_max_chars: 10_000,
            parallel_lanes: 4,
            cache_dir: PathBuf::from("cache"),
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Ok(model) = env::var("LEADSCOUT_MODEL") {
            settings.model = model;
        }
        if let Ok(model) = env::var("LEADSCOUT_JUDGE_MODEL") {
            settings.judge_model = model;
        }
        if let Ok(base) = env::var("LEADSCOUT_API_BASE") {
            settings.api_base = base;
        }
        if let Ok(rounds) = env::var("LEADSCOUT_MAX_ROUNDS") {
            settings.max_investigation_rounds = rounds
                .parse()
                .context("LEADSCOUT_MAX_ROUNDS must be an integer")?;
        }
        if let Ok(lanes) = env::var("LEADSCOUT_PARALLEL_LANES") {
            settings.parallel_lanes = lanes
                .parse()
                .context("LEADSCOUT_PARALLEL_LANES must be an integer")?;
        }
        if let Ok(dir) = env::var("LEADSCOUT_CACHE_DIR") {
            settings.cache_dir = PathBuf::from(dir);
        }

        Ok(settings)
    }
}

/// Ideal-customer-profile context shared by classification, profiling, and
/// judging.
#[derive(Debug, Clone)]
pub struct IcpContext {
    /// Bullet descriptions of who the ideal customer is.
    pub profile: Vec<String>,

    /// Free-text description of what is being sold.
    pub offering: String,
}

impl Default for IcpContext {
    fn default() -> Self {
        Self {
            profile: vec![
                "Software engineers or teams building AI/ML systems that need optimization"
                    .to_string(),
                "Companies using DSPy or similar prompt optimization frameworks".to_string(),
                "Teams with compound AI systems involving multiple LLM calls".to_string(),
                "Organizations seeking to improve accuracy or efficiency of AI workflows"
                    .to_string(),
                "Engineers working on RAG, agents, or multi-hop reasoning systems".to_string(),
            ],
            offering: "A prompt optimization service for continuously improving AI workflows \
                       and systems. We help optimize systems that have one or more outcome \
                       metrics, including ground truth and non-ground truth outcomes. Our \
                       service is particularly valuable for engineers already using DSPy or \
                       building compound AI systems."
                .to_string(),
        }
    }
}

impl IcpContext {
    /// Render the profile bullets as a prompt block.
    pub fn profile_block(&self) -> String {
        self.profile
            .iter()
            .map(|line| format!("- {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
