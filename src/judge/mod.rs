//! Static evaluators for pipeline output.
//!
//! The judges are independent of the pipeline under evaluation: the
//! classification judge is a few-shot LLM classifier used as a proxy ground
//! truth, the profile judge scores prose profiles against a written rubric.
//! Both pin temperature to zero and parse model text defensively with
//! documented fallback defaults.

mod classifier;
mod profiler;

pub use classifier::{ClassificationJudge, JudgeComparison};
pub use profiler::{ProfileBreakdown, ProfileJudge, ProfileScore, PROFILE_RUBRIC};

use serde::{Deserialize, Serialize};

/// One calibration example for the classification judge's few-shot prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeExample {
    pub name: String,
    pub username: String,
    /// Research context the label was assigned from.
    pub context: String,
    /// Canonical label string, e.g. "strong_fit".
    pub icp_match: String,
    pub rationale: String,
}

/// Render examples as a few-shot prompt block.
pub fn format_examples(examples: &[JudgeExample]) -> String {
    if examples.is_empty() {
        return "(No examples available yet - using rubric only)".to_string();
    }

    examples
        .iter()
        .map(|ex| {
            format!(
                "Lead: {} ({})\nContext:\n{}\nLabel: {}\nRationale: {}",
                ex.name, ex.username, ex.context, ex.icp_match, ex.rationale
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_examples_empty() {
        assert!(format_examples(&[]).contains("No examples available"));
    }

    #[test]
    fn test_format_examples_renders_labels() {
        let examples = vec![
            JudgeExample {
                name: "A".to_string(),
                username: "a".to_string(),
                context: "ctx a".to_string(),
                icp_match: "strong_fit".to_string(),
                rationale: "uses DSPy".to_string(),
            },
            JudgeExample {
                name: "B".to_string(),
                username: "b".to_string(),
                context: "ctx b".to_string(),
                icp_match: "not_a_fit".to_string(),
                rationale: "no ML work".to_string(),
            },
        ];
        let text = format_examples(&examples);
        assert!(text.contains("Label: strong_fit"));
        assert!(text.contains("Label: not_a_fit"));
        assert!(text.contains("---"));
    }
}
