//! leadscout: iterative lead research and ICP classification.
//!
//! Researches a lead through a bounded web-search/scrape agent loop,
//! accumulates findings on a blackboard, and classifies the lead against an
//! ideal customer profile, looping research and classification until the
//! verdict is final or the round budget runs out. A separate judge subsystem
//! scores pipeline output without ground truth.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use leadscout::{
//!     ClassifierPipeline, Classifier, Researcher, LeadIdentity,
//!     OpenAiClient, SerperClient, FirecrawlClient, IcpContext, LlmConfig,
//! };
//!
//! let llm = Arc::new(OpenAiClient::from_env("gpt-4.1")?);
//! let researcher = Researcher::new(
//!     llm.clone(),
//!     Arc::new(SerperClient::from_env()?),
//!     Arc::new(FirecrawlClient::from_env(10_000).unwrap()),
//!     LlmConfig::new("gpt-4.1"),
//! );
//! let classifier = Classifier::new(llm, IcpContext::default(), LlmConfig::new("gpt-4.1"));
//! let pipeline = ClassifierPipeline::new(Arc::new(researcher), Arc::new(classifier));
//! let outcome = pipeline.run(&LeadIdentity::new("octocat", "The Octocat", "https://github.com/octocat")).await?;
//! ```

pub mod blackboard;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod error;
pub mod judge;
pub mod llm;
pub mod pipeline;
pub mod profile;
pub mod research;
pub mod scoring;
pub mod store;
pub mod tools;

// Re-exports for convenience
pub use blackboard::{Blackboard, PageFindings};
pub use classify::{Classification, Classifier, ClassifyStep, FitClass};
pub use config::{IcpContext, Settings};
pub use dataset::{judge_examples, normalize_label, split_records, DatasetSplit, LeadRecord};
pub use error::ScoutError;
pub use judge::{
    ClassificationJudge, JudgeComparison, JudgeExample, ProfileBreakdown, ProfileJudge,
    ProfileScore,
};
pub use llm::{ChatMessage, LlmClient, LlmConfig, LlmResponse, OpenAiClient, Role, ToolCall, ToolDefinition};
pub use pipeline::{
    classify_batch, ClassifierPipeline, LeadIdentity, PipelineOutcome, ProfileOutcome,
    ProfilerPipeline,
};
pub use profile::{ProfileResult, ProfileStep, Profiler};
pub use research::{ResearchOutcome, ResearchStep, Researcher};
pub use scoring::{compute_classification_score, test_score, training_score, Prediction};
pub use store::{BlackboardStore, FileBlackboardStore};
pub use tools::{
    FirecrawlClient, PageCache, ScrapeProvider, ScrapedPage, SearchError, SearchProvider,
    SearchResult, SerperClient,
};
