//! Rubric-based profile judge.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ScoutError;
use crate::llm::{ChatMessage, LlmClient, LlmConfig};

/// Profiles with fewer non-whitespace characters than this score 0 outright.
const MIN_PROFILE_CHARS: usize = 10;

/// Unparseable totals fall back to this neutral midpoint. Deliberately not
/// the conservative low default the classification judge uses.
const DEFAULT_TOTAL: u32 = 50;

/// Scoring rubric injected into the judge prompt. Category maxima sum to 100
/// and must stay in step with `ProfileBreakdown`.
pub const PROFILE_RUBRIC: &str = "\
Score the profile against the research record on these categories:

ACCURACY (max 60): every claim in the profile is supported by the research \
record; unsupported or contradicted claims lose points proportionally.
SUCCINCT (max 10): concise and free of filler; an account executive can read \
it in under a minute.
RELEVANT (max 10): focuses on what matters for qualification and outreach.
COMPLETE (max 10): covers who they are, what they build, and how they relate \
to the offering.
CONTACT (max 10): surfaces contact channels or outreach angles found in the \
research.
PERSONA (max 10): captures role, seniority, and technical persona.";

const RESPONSE_FORMAT: &str = "\
Respond in exactly this format:
ACCURACY: [score]/60 - [one-line justification]
SUCCINCT: [score]/10 - [one-line justification]
RELEVANT: [score]/10 - [one-line justification]
COMPLETE: [score]/10 - [one-line justification]
CONTACT: [score]/10 - [one-line justification]
PERSONA: [score]/10 - [one-line justification]
TOTAL: [total]/100";

/// Per-category rubric scores. Maxima: 60/10/10/10/10/10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileBreakdown {
    pub accuracy: u32,
    pub succinct: u32,
    pub relevant: u32,
    pub complete: u32,
    pub contact: u32,
    pub persona: u32,
}

/// Full judge output including the raw response for audit.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileScore {
    pub total: u32,
    pub breakdown: ProfileBreakdown,
    pub raw_response: String,
}

/// Scores prose profiles 0..=100 against [`PROFILE_RUBRIC`].
pub struct ProfileJudge {
    llm: Arc<dyn LlmClient>,
    config: LlmConfig,
}

impl ProfileJudge {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            config: LlmConfig::default().with_temperature(0.0),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    fn is_trivial(profile: &str) -> bool {
        profile.chars().filter(|c| !c.is_whitespace()).count() < MIN_PROFILE_CHARS
    }

    async fn ask(&self, profile: &str, blackboard: &str) -> Result<String, ScoutError> {
        let system = format!(
            "You are a strict evaluator of sales lead profiles.\n\n{PROFILE_RUBRIC}\n\n{RESPONSE_FORMAT}"
        );
        let user = format!("Research record:\n{blackboard}\n\nProfile to score:\n{profile}");
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let response = self.llm.complete(&messages, &[], Some(&self.config)).await?;
        Ok(response.message.content)
    }

    /// Score a profile in [0, 100]. Trivial profiles score 0 without a model
    /// call.
    pub async fn judge(&self, profile: &str, blackboard: &str) -> Result<u32, ScoutError> {
        if Self::is_trivial(profile) {
            debug!("Profile below minimum length, scoring 0");
            return Ok(0);
        }
        let response = self.ask(profile, blackboard).await?;
        Ok(parse_total(&response))
    }

    /// Score with the per-category breakdown and raw response retained.
    pub async fn judge_with_breakdown(
        &self,
        profile: &str,
        blackboard: &str,
    ) -> Result<ProfileScore, ScoutError> {
        if Self::is_trivial(profile) {
            return Ok(ProfileScore {
                total: 0,
                breakdown: ProfileBreakdown::default(),
                raw_response: String::new(),
            });
        }
        let response = self.ask(profile, blackboard).await?;
        Ok(ProfileScore {
            total: parse_total(&response),
            breakdown: parse_breakdown(&response),
            raw_response: response,
        })
    }
}

static TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TOTAL:\s*(\d+)\s*/\s*100").expect("valid regex"));
static FRACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*100").expect("valid regex"));
static TRAILING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("valid regex"));
static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ACCURACY|SUCCINCT|RELEVANT|COMPLETE|CONTACT|PERSONA):\s*(\d+)\s*/\s*\d+")
        .expect("valid regex")
});

fn capture_u32(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Extract the total score, most explicit pattern first.
fn parse_total(text: &str) -> u32 {
    if let Some(n) = capture_u32(&TOTAL_RE, text) {
        return n.min(100);
    }
    if let Some(n) = capture_u32(&FRACTION_RE, text) {
        return n.min(100);
    }
    if let Some(n) = capture_u32(&TRAILING_RE, text.trim_end()) {
        if n <= 100 {
            return n;
        }
    }
    warn!("Could not parse a total score from judge response, defaulting");
    DEFAULT_TOTAL
}

fn parse_breakdown(text: &str) -> ProfileBreakdown {
    let mut breakdown = ProfileBreakdown::default();
    // First occurrence of each category wins.
    let mut seen = [false; 6];
    for caps in CATEGORY_RE.captures_iter(text) {
        let score: u32 = caps[2].parse().unwrap_or(0);
        let slot = match caps[1].to_ascii_uppercase().as_str() {
            "ACCURACY" => 0,
            "SUCCINCT" => 1,
            "RELEVANT" => 2,
            "COMPLETE" => 3,
            "CONTACT" => 4,
            _ => 5,
        };
        if seen[slot] {
            continue;
        }
        seen[slot] = true;
        let max = if slot == 0 { 60 } else { 10 };
        let clamped = score.min(max);
        match slot {
            0 => breakdown.accuracy = clamped,
            1 => breakdown.succinct = clamped,
            2 => breakdown.relevant = clamped,
            3 => breakdown.complete = clamped,
            4 => breakdown.contact = clamped,
            _ => breakdown.persona = clamped,
        }
    }
    breakdown
}
