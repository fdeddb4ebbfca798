//! Few-shot classification judge.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::{format_examples, JudgeExample};
use crate::classify::FitClass;
use crate::config::IcpContext;
use crate::error::ScoutError;
use crate::llm::{ChatMessage, LlmClient, LlmConfig};

/// Independent second opinion on a proposed classification.
///
/// Never sees ground truth; calibrated only by its few-shot examples and the
/// ICP text, so it stays an honest held-out evaluator during training.
pub struct ClassificationJudge {
    llm: Arc<dyn LlmClient>,
    icp: IcpContext,
    examples: Vec<JudgeExample>,
    config: LlmConfig,
}

impl ClassificationJudge {
    pub fn new(llm: Arc<dyn LlmClient>, icp: IcpContext, examples: Vec<JudgeExample>) -> Self {
        Self {
            llm,
            icp,
            examples,
            config: LlmConfig::default()
                .with_temperature(0.0)
                .with_max_tokens(20),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an expert lead qualification judge. Given research about a \
             lead and a proposed classification, give your own independent \
             classification.\n\n\
             Ideal customer profile:\n{}\n\n\
             What we offer:\n{}\n\n\
             Calibration examples:\n{}\n\n\
             Respond with exactly one of: strong_fit, weak_fit, not_a_fit",
            self.icp.profile_block(),
            self.icp.offering,
            format_examples(&self.examples),
        )
    }

    /// Judge a proposed classification; parse failures default to `not_a_fit`.
    pub async fn judge(
        &self,
        lead_context: &str,
        proposed_label: FitClass,
        proposed_rationale: Option<&str>,
    ) -> Result<FitClass, ScoutError> {
        let mut user = format!(
            "Lead research:\n{lead_context}\n\nProposed classification: {proposed_label}"
        );
        if let Some(rationale) = proposed_rationale {
            user.push_str(&format!("\nProposed rationale: {rationale}"));
        }

        let messages = [ChatMessage::system(self.system_prompt()), ChatMessage::user(user)];
        let response = self.llm.complete(&messages, &[], Some(&self.config)).await?;

        let verdict = parse_label(&response.message.content);
        debug!(%proposed_label, %verdict, "Judge verdict");
        Ok(verdict)
    }

    /// Judge and compare against a supplied ground truth label.
    ///
    /// Offline analysis only; never feeds the training metric.
    pub async fn evaluate_against_ground_truth(
        &self,
        lead_context: &str,
        proposed_label: FitClass,
        proposed_rationale: Option<&str>,
        ground_truth: FitClass,
    ) -> Result<JudgeComparison, ScoutError> {
        let judge_classification = self
            .judge(lead_context, proposed_label, proposed_rationale)
            .await?;
        Ok(JudgeComparison {
            judge_classification,
            ground_truth,
            proposed: proposed_label,
            is_correct: judge_classification == ground_truth,
        })
    }
}

/// How the judge's opinion relates to a known ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JudgeComparison {
    pub judge_classification: FitClass,
    pub ground_truth: FitClass,
    pub proposed: FitClass,
    /// Whether the judge agreed with the ground truth.
    pub is_correct: bool,
}

/// Scan for the three labels in fixed priority order; default `not_a_fit`.
fn parse_label(text: &str) -> FitClass {
    let lower = text.to_lowercase();
    if lower.contains("strong_fit") {
        FitClass::StrongFit
    } else if lower.contains("weak_fit") {
        FitClass::WeakFit
    } else if lower.contains("not_a_fit") {
        FitClass::NotAFit
    } else {
        warn!(response = %text, "Judge response had no recognizable label, defaulting");
        FitClass::NotAFit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedLlm(String);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[crate::llm::ToolDefinition],
            config: Option<&LlmConfig>,
        ) -> Result<crate::llm::LlmResponse, ScoutError> {
            // The judge always pins temperature to zero.
            assert_eq!(config.and_then(|c| c.temperature), Some(0.0));
            Ok(crate::llm::LlmResponse::new(ChatMessage::assistant(
                self.0.clone(),
            )))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn judge(response: &str) -> ClassificationJudge {
        ClassificationJudge::new(
            Arc::new(FixedLlm(response.to_string())),
            IcpContext::default(),
            Vec::new(),
        )
    }

    #[test]
    fn test_parse_label_priority_order() {
        assert_eq!(parse_label("strong_fit"), FitClass::StrongFit);
        assert_eq!(parse_label("I'd say WEAK_FIT here"), FitClass::WeakFit);
        assert_eq!(parse_label("not_a_fit"), FitClass::NotAFit);
        // Priority: strong before weak before not.
        assert_eq!(
            parse_label("between strong_fit and weak_fit"),
            FitClass::StrongFit
        );
        assert_eq!(parse_label("no label at all"), FitClass::NotAFit);
    }

    #[tokio::test]
    async fn test_judge_returns_parsed_label() {
        let verdict = judge("weak_fit")
            .judge("some context", FitClass::StrongFit, Some("rationale"))
            .await
            .unwrap();
        assert_eq!(verdict, FitClass::WeakFit);
    }

    #[tokio::test]
    async fn test_judge_garbage_defaults_not_a_fit() {
        let verdict = judge("I am unsure about this one.")
            .judge("ctx", FitClass::StrongFit, None)
            .await
            .unwrap();
        assert_eq!(verdict, FitClass::NotAFit);
    }

    #[tokio::test]
    async fn test_evaluate_against_ground_truth() {
        let comparison = judge("strong_fit")
            .evaluate_against_ground_truth("ctx", FitClass::WeakFit, None, FitClass::StrongFit)
            .await
            .unwrap();
        assert_eq!(comparison.judge_classification, FitClass::StrongFit);
        assert_eq!(comparison.proposed, FitClass::WeakFit);
        assert!(comparison.is_correct);
    }
}
