//! Crate-level error types.
//!
//! The search adapter carries its own error enum (`SearchError`) and scrape
//! failures travel inside `ScrapedPage`; everything that crosses a step
//! boundary is folded into `ScoutError`.

use thiserror::Error;

/// Top-level error for pipeline steps and judges.
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Research step failed: {0}")]
    Research(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No cached blackboard for lead '{0}': profiling requires prior research")]
    MissingBlackboard(String),

    #[error("Failed to parse model output: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_blackboard_names_lead() {
        let err = ScoutError::MissingBlackboard("octocat".to_string());
        assert!(err.to_string().contains("octocat"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let bad: Result<serde_json::Value, _> = serde_json::from_str("not json");
        let err: ScoutError = bad.unwrap_err().into();
        assert!(matches!(err, ScoutError::Serialization(_)));
    }
}
