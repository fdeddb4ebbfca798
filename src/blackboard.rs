//! Shared research record for one lead.
//!
//! `PageFindings` captures what one scraped page contributed; `Blackboard`
//! accumulates page findings and higher-level research syntheses across
//! investigation rounds. The blackboard is append-only: content is never
//! deleted, only concatenated (page findings, oldest first) or prepended
//! (research findings, newest first).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between page-findings blocks from different research rounds.
const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Structured findings from one scraped page.
///
/// Immutable once created; `to_string()` (via `Display`) renders the
/// canonical text block used both for model context and persistence, and
/// `from_text` parses it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFindings {
    pub url: String,
    pub title: String,
    pub summary: String,
    /// Bullet-style findings relative to the active research goal.
    pub findings: String,
    /// Bar-delimited "title|url" pairs worth following up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interesting_links: Option<String>,
    /// The research goal that was active when this page was visited.
    pub current_goal: String,
}

impl fmt::Display for PageFindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "URL: {}\nTitle: {}\nSummary: {}\nPage Findings: {}\n",
            self.url, self.title, self.summary, self.findings
        )?;
        if let Some(links) = &self.interesting_links {
            write!(f, "Interesting Links: {links}\n")?;
        }
        write!(f, "Current Goal: {}\n", self.current_goal)
    }
}

impl PageFindings {
    /// Parse the canonical text block back into a `PageFindings`.
    ///
    /// Inverse of `Display` for well-formed blocks; returns `None` if any
    /// required labeled line is missing. Fields may span multiple lines
    /// (findings are bullet-style free text), so unlabeled lines continue
    /// the most recent labeled field.
    pub fn from_text(text: &str) -> Option<Self> {
        const LABELS: [&str; 6] = [
            "URL: ",
            "Title: ",
            "Summary: ",
            "Page Findings: ",
            "Interesting Links: ",
            "Current Goal: ",
        ];
        let mut fields: [Option<String>; 6] = Default::default();
        let mut current: Option<usize> = None;

        for line in text.lines() {
            match LABELS
                .iter()
                .position(|label| line.starts_with(label))
            {
                Some(i) => {
                    fields[i] = Some(line[LABELS[i].len()..].to_string());
                    current = Some(i);
                }
                None => {
                    if let Some(field) = current.and_then(|i| fields[i].as_mut()) {
                        field.push('\n');
                        field.push_str(line);
                    }
                }
            }
        }

        let [url, title, summary, findings, interesting_links, current_goal] = fields;
        Some(Self {
            url: url?,
            title: title?,
            summary: summary?,
            findings: findings?,
            interesting_links,
            current_goal: current_goal?,
        })
    }
}

/// Append-only accumulator of everything learned about a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blackboard {
    /// Canonical page-findings blocks, chronological visit order.
    #[serde(default)]
    pub page_findings: String,

    /// Research syntheses, newest first under "Prior Research:" markers.
    #[serde(default)]
    pub research_findings: String,
}

impl fmt::Display for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.research_findings.is_empty() {
            parts.push(format!("Research Summary:\n{}", self.research_findings));
        }
        if !self.page_findings.is_empty() {
            parts.push(format!("\nPage Findings:\n{}", self.page_findings));
        }
        write!(f, "{}", parts.join("\n\n"))
    }
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.page_findings.is_empty() && self.research_findings.is_empty()
    }

    /// Append page findings in visit order, separated from prior rounds.
    ///
    /// No-op on an empty slice.
    pub fn add_page_findings(&mut self, findings: &[PageFindings]) {
        for finding in findings {
            if !self.page_findings.is_empty() {
                self.page_findings.push_str(PAGE_SEPARATOR);
            }
            self.page_findings.push_str(&finding.to_string());
        }
    }

    /// Prepend a new research synthesis, keeping prior rounds below it.
    ///
    /// The newest synthesis sits at the top so the most relevant signal is
    /// closest to the head of the prompt context. No-op on empty input.
    pub fn add_research_findings(&mut self, findings: &str) {
        if findings.is_empty() {
            return;
        }
        if self.research_findings.is_empty() {
            self.research_findings = findings.to_string();
        } else {
            self.research_findings =
                format!("{findings}\n\nPrior Research:\n{}", self.research_findings);
        }
    }

    /// Serialize to the flat two-key persistence shape.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "page_findings": self.page_findings,
            "research_findings": self.research_findings,
        })
    }

    /// Deserialize from the flat two-key shape; missing keys default empty.
    pub fn from_dict(value: &serde_json::Value) -> Self {
        Self {
            page_findings: value
                .get("page_findings")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            research_findings: value
                .get("research_findings")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    }
}
