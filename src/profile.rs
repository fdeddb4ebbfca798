//! Lead profile generation step.
//!
//! Produces a prose profile of a lead from the accumulated blackboard, and
//! may request another research round by returning a research goal. A goal
//! of a handful of characters or less is treated as noise rather than a real
//! request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IcpContext;
use crate::error::ScoutError;
use crate::llm::{extract_json_object, ChatMessage, LlmClient, LlmConfig};

/// Goals at or below this trimmed length are ignored.
const MIN_GOAL_LEN: usize = 5;

/// Output of one profiling call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResult {
    /// The generated profile text, when the model produced one.
    pub profile: Option<String>,
    /// Requested follow-up research goal, when evidence is missing.
    pub research_goal: Option<String>,
}

impl ProfileResult {
    /// True when this result carries a substantive research request.
    pub fn needs_research(&self) -> bool {
        self.research_goal
            .as_deref()
            .is_some_and(|g| g.trim().len() > MIN_GOAL_LEN)
    }

    /// The usable goal, if `needs_research` holds.
    pub fn goal(&self) -> Option<&str> {
        if self.needs_research() {
            self.research_goal.as_deref().map(str::trim)
        } else {
            None
        }
    }
}

/// Profiling capability used by the profiler pipeline.
#[async_trait]
pub trait ProfileStep: Send + Sync {
    async fn profile(
        &self,
        lead_context: &str,
        blackboard: &str,
    ) -> Result<ProfileResult, ScoutError>;
}

#[derive(Deserialize)]
struct ProfilerOutput {
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    research_goal: Option<String>,
}

/// Production `ProfileStep` backed by an LLM with structured JSON output.
pub struct Profiler {
    llm: Arc<dyn LlmClient>,
    icp: IcpContext,
    config: LlmConfig,
}

impl Profiler {
    pub fn new(llm: Arc<dyn LlmClient>, icp: IcpContext, config: LlmConfig) -> Self {
        Self { llm, icp, config }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a sales research analyst. Write a concise profile of a lead \
             for an account executive preparing outreach.\n\n\
             Ideal customer profile:\n{}\n\n\
             What we offer:\n{}\n\n\
             The profile should cover who they are, what they build, how they \
             relate to our offering, and any contact or persona details found in \
             the research. Base every claim on the research provided.\n\n\
             Respond with a single JSON object:\n\
             {{\n\
               \"profile\": \"the profile text\",\n\
               \"research_goal\": \"a concrete follow-up research goal, or null\"\n\
             }}\n\n\
             Set research_goal only when a specific gap in the research prevents \
             a useful profile.",
            self.icp.profile_block(),
            self.icp.offering,
        )
    }
}

#[async_trait]
impl ProfileStep for Profiler {
    async fn profile(
        &self,
        lead_context: &str,
        blackboard: &str,
    ) -> Result<ProfileResult, ScoutError> {
        let board_section = if blackboard.is_empty() {
            "(no research available)".to_string()
        } else {
            blackboard.to_string()
        };
        let user = format!("Lead:\n{lead_context}\n\nResearch:\n{board_section}");

        let messages = [ChatMessage::system(self.system_prompt()), ChatMessage::user(user)];
        let response = self.llm.complete(&messages, &[], Some(&self.config)).await?;

        let text = &response.message.content;
        let json = extract_json_object(text)
            .ok_or_else(|| ScoutError::Parse(format!("profiler returned no JSON object: {text}")))?;
        let output: ProfilerOutput = serde_json::from_str(json)?;

        let result = ProfileResult {
            profile: output.profile.filter(|p| !p.trim().is_empty()),
            research_goal: output.research_goal,
        };
        debug!(
            has_profile = result.profile.is_some(),
            needs_research = result.needs_research(),
            "Profile produced"
        );
        Ok(result)
    }
}
