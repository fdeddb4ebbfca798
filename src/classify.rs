//! ICP classification step.
//!
//! One LLM call per invocation: given the lead context and current
//! blackboard, produce a fit label, a rationale, and optionally a follow-up
//! research goal. A classification is final when it carries a label and no
//! usable research goal; the pipeline loops research until finality or its
//! round budget runs out.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::IcpContext;
use crate::error::ScoutError;
use crate::llm::{extract_json_object, ChatMessage, LlmClient, LlmConfig};

/// How well a lead matches the ideal customer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitClass {
    StrongFit,
    WeakFit,
    NotAFit,
}

impl FitClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitClass::StrongFit => "strong_fit",
            FitClass::WeakFit => "weak_fit",
            FitClass::NotAFit => "not_a_fit",
        }
    }

    /// Parse the canonical label form; anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "strong_fit" => Some(FitClass::StrongFit),
            "weak_fit" => Some(FitClass::WeakFit),
            "not_a_fit" => Some(FitClass::NotAFit),
            _ => None,
        }
    }
}

impl std::fmt::Display for FitClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// `None` when the model produced no recognizable label.
    pub label: Option<FitClass>,
    pub rationale: Option<String>,
    /// Research goal for the next round, when the model wants more evidence.
    pub further_investigation: Option<String>,
}

impl Classification {
    /// A classification is final when it has a label and no usable research
    /// goal. "none" (any casing) and whitespace-only goals do not count.
    pub fn is_final(&self) -> bool {
        if self.label.is_none() {
            return false;
        }
        match &self.further_investigation {
            None => true,
            Some(goal) => {
                let trimmed = goal.trim();
                trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none")
            }
        }
    }

    /// The goal to research next, if this classification requests one.
    pub fn research_goal(&self) -> Option<&str> {
        self.further_investigation
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty() && !g.eq_ignore_ascii_case("none"))
    }
}

/// Classification capability used by the pipelines.
#[async_trait]
pub trait ClassifyStep: Send + Sync {
    /// Classify a lead from its context and accumulated blackboard.
    ///
    /// With `force_final` the returned classification never carries a
    /// research goal.
    async fn classify(
        &self,
        lead_context: &str,
        blackboard: &str,
        force_final: bool,
    ) -> Result<Classification, ScoutError>;
}

#[derive(Deserialize)]
struct ClassifierOutput {
    #[serde(default)]
    lead_quality: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    further_investigation: Option<String>,
}

/// Production `ClassifyStep` backed by an LLM with structured JSON output.
pub struct Classifier {
    llm: Arc<dyn LlmClient>,
    icp: IcpContext,
    config: LlmConfig,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmClient>, icp: IcpContext, config: LlmConfig) -> Self {
        Self { llm, icp, config }
    }

    fn system_prompt(&self, force_final: bool) -> String {
        let mut prompt = format!(
            "You are a lead qualification analyst. Decide how well a lead matches \
             our ideal customer profile.\n\n\
             Ideal customer profile:\n{}\n\n\
             What we offer:\n{}\n\n\
             Respond with a single JSON object:\n\
             {{\n\
               \"lead_quality\": \"strong_fit\" | \"weak_fit\" | \"not_a_fit\",\n\
               \"rationale\": \"why you chose that label\",\n\
               \"further_investigation\": \"a concrete research goal, or null\"\n\
             }}\n\n\
             Set further_investigation only when specific missing evidence would \
             change your label, and phrase it as a researchable goal. When the \
             evidence already supports a confident label, set it to null.",
            self.icp.profile_block(),
            self.icp.offering,
        );
        if force_final {
            prompt.push_str(
                "\n\nNo further research is possible. You must commit to a final \
                 label now; set further_investigation to null.",
            );
        }
        prompt
    }
}

#[async_trait]
impl ClassifyStep for Classifier {
    async fn classify(
        &self,
        lead_context: &str,
        blackboard: &str,
        force_final: bool,
    ) -> Result<Classification, ScoutError> {
        let board_section = if blackboard.is_empty() {
            "(no research gathered yet)".to_string()
        } else {
            blackboard.to_string()
        };
        let user = format!("Lead:\n{lead_context}\n\nResearch so far:\n{board_section}");

        let messages = [
            ChatMessage::system(self.system_prompt(force_final)),
            ChatMessage::user(user),
        ];
        let response = self.llm.complete(&messages, &[], Some(&self.config)).await?;

        let text = &response.message.content;
        let json = extract_json_object(text).ok_or_else(|| {
            ScoutError::Parse(format!("classifier returned no JSON object: {text}"))
        })?;
        let output: ClassifierOutput = serde_json::from_str(json)?;

        let label = match output.lead_quality.as_deref() {
            Some(raw) => {
                let parsed = FitClass::parse(raw);
                if parsed.is_none() {
                    warn!(raw, "Unrecognized lead_quality label");
                }
                parsed
            }
            None => None,
        };

        let further_investigation = if force_final {
            None
        } else {
            output.further_investigation.filter(|g| !g.trim().is_empty())
        };

        let classification = Classification {
            label,
            rationale: output.rationale,
            further_investigation,
        };
        debug!(
            label = ?classification.label,
            is_final = classification.is_final(),
            "Classification produced"
        );
        Ok(classification)
    }
}
