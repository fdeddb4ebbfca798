//! Bounded agentic research step.
//!
//! Runs a tool-calling reasoning loop over two tools, web search and page
//! scraping, until the model produces a findings synthesis or the tool-call
//! budget runs out. Tool failures are reported back to the model as inline
//! text so it can route around them; only a failure of the model call itself
//! propagates to the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::blackboard::PageFindings;
use crate::error::ScoutError;
use crate::llm::{
    extract_json_object, ChatMessage, LlmClient, LlmConfig, ToolCall, ToolDefinition,
};
use crate::tools::{format_results, ScrapeProvider, SearchProvider};

const SEARCH_TOOL: &str = "web_search";
const SCRAPE_TOOL: &str = "scrape_page";

/// Findings produced by one research invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchOutcome {
    pub page_findings: Vec<PageFindings>,
    pub research_findings: String,
}

/// Research capability used by the pipelines.
#[async_trait]
pub trait ResearchStep: Send + Sync {
    /// Research a goal given the current blackboard text.
    async fn research(&self, goal: &str, blackboard: &str) -> Result<ResearchOutcome, ScoutError>;
}

#[derive(Deserialize)]
struct FinalOutput {
    #[serde(default)]
    page_findings: Vec<PageEntry>,
    #[serde(default)]
    research_findings: String,
}

#[derive(Deserialize)]
struct PageEntry {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    findings: String,
    #[serde(default)]
    interesting_links: Option<String>,
}

/// Production `ResearchStep`: an LLM loop over search and scrape tools.
pub struct Researcher {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchProvider>,
    scrape: Arc<dyn ScrapeProvider>,
    config: LlmConfig,
    max_tool_calls: usize,
    max_search_results: usize,
}

impl Researcher {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchProvider>,
        scrape: Arc<dyn ScrapeProvider>,
        config: LlmConfig,
    ) -> Self {
        Self {
            llm,
            search,
            scrape,
            config,
            max_tool_calls: 5,
            max_search_results: 10,
        }
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn with_max_search_results(mut self, max_search_results: usize) -> Self {
        self.max_search_results = max_search_results;
        self
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SEARCH_TOOL.to_string(),
                description: "Search the web for pages about the lead. Use site: filters \
                              (e.g. site:github.com, site:linkedin.com) to target specific \
                              platforms."
                    .to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "The search query"}
                    },
                    "required": ["query"]
                }),
            },
            ToolDefinition {
                name: SCRAPE_TOOL.to_string(),
                description: "Fetch a web page as markdown. Returns an error message if the \
                              page cannot be scraped; try a different URL instead of retrying."
                    .to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "The URL to fetch"}
                    },
                    "required": ["url"]
                }),
            },
        ]
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a web researcher investigating a sales lead.\n\n\
             Workflow: start from the URL named in the goal, scrape it, then follow \
             up with searches and scrapes as the goal requires. Pages already on the \
             research record do not need to be visited again; build on what is there \
             instead of duplicating it.\n\n\
             You have a budget of {} tool calls. When you are done, or when told the \
             budget is exhausted, respond without calling tools, with a single JSON \
             object:\n\
             {{\n\
               \"page_findings\": [\n\
                 {{\"url\": \"...\", \"title\": \"...\", \"summary\": \"...\", \
             \"findings\": \"- bullet findings relative to the goal\", \
             \"interesting_links\": \"title|url pairs worth a follow-up, or null\"}}\n\
               ],\n\
               \"research_findings\": \"synthesis of what was learned about the goal\"\n\
             }}\n\
             Include one page_findings entry per page you actually visited.",
            self.max_tool_calls
        )
    }

    async fn execute_tool(&self, call: &ToolCall) -> String {
        match call.name.as_str() {
            SEARCH_TOOL => {
                let Some(query) = call.arguments.get("query").and_then(|q| q.as_str()) else {
                    return "Error: web_search requires a 'query' argument".to_string();
                };
                match self.search.search(query, self.max_search_results).await {
                    Ok(results) => format_results(query, &results),
                    Err(e) => format!("Search failed: {e}"),
                }
            }
            SCRAPE_TOOL => {
                let Some(url) = call.arguments.get("url").and_then(|u| u.as_str()) else {
                    return "Error: scrape_page requires a 'url' argument".to_string();
                };
                self.scrape.scrape(url).await.to_context_text()
            }
            other => format!("Error: unknown tool '{other}'"),
        }
    }

    fn parse_outcome(&self, goal: &str, text: &str) -> ResearchOutcome {
        let Some(json) = extract_json_object(text) else {
            warn!("Research synthesis contained no JSON, keeping raw text");
            return ResearchOutcome {
                page_findings: Vec::new(),
                research_findings: text.trim().to_string(),
            };
        };

        match serde_json::from_str::<FinalOutput>(json) {
            Ok(output) => ResearchOutcome {
                page_findings: output
                    .page_findings
                    .into_iter()
                    .filter(|p| !p.url.is_empty())
                    .map(|p| PageFindings {
                        url: p.url,
                        title: p.title,
                        summary: p.summary,
                        findings: p.findings,
                        interesting_links: p.interesting_links.filter(|l| !l.trim().is_empty()),
                        current_goal: goal.to_string(),
                    })
                    .collect(),
                research_findings: output.research_findings,
            },
            Err(e) => {
                warn!(error = %e, "Research synthesis JSON did not match schema, keeping raw text");
                ResearchOutcome {
                    page_findings: Vec::new(),
                    research_findings: text.trim().to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl ResearchStep for Researcher {
    async fn research(&self, goal: &str, blackboard: &str) -> Result<ResearchOutcome, ScoutError> {
        let board_section = if blackboard.is_empty() {
            "(empty)".to_string()
        } else {
            blackboard.to_string()
        };

        let mut messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(format!(
                "Research goal:\n{goal}\n\nResearch record so far:\n{board_section}"
            )),
        ];
        let tools = self.tool_definitions();
        let mut calls_used = 0usize;

        while calls_used < self.max_tool_calls {
            let response = self.llm.complete(&messages, &tools, Some(&self.config)).await?;
            let message = response.message;

            if !message.has_tool_calls() {
                debug!(calls_used, "Research finished within budget");
                return Ok(self.parse_outcome(goal, &message.content));
            }

            let calls = message.tool_calls.clone().unwrap_or_default();
            messages.push(message);

            for call in calls {
                let result = if calls_used < self.max_tool_calls {
                    calls_used += 1;
                    debug!(tool = %call.name, calls_used, "Executing research tool");
                    self.execute_tool(&call).await
                } else {
                    "Tool budget exhausted; respond with your final JSON findings now."
                        .to_string()
                };
                messages.push(ChatMessage::tool(result, call.id));
            }
        }

        // Budget exhausted mid-reasoning: one last call with no tools offered.
        debug!(calls_used, "Tool budget exhausted, forcing synthesis");
        messages.push(ChatMessage::user(
            "The tool budget is exhausted. Respond now with the final JSON findings \
             object based on what you have gathered."
                .to_string(),
        ));
        let response = self.llm.complete(&messages, &[], Some(&self.config)).await?;
        Ok(self.parse_outcome(goal, &response.message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use crate::tools::{ScrapedPage, SearchError, SearchResult};
    use std::sync::Mutex;

    /// Scripted LLM: pops a canned assistant message per `complete` call and
    /// records how many tools each call was offered.
    struct ScriptedLlm {
        script: Mutex<Vec<ChatMessage>>,
        tool_counts_seen: Arc<Mutex<Vec<usize>>>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<ChatMessage>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                tool_counts_seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            tools: &[ToolDefinition],
            _config: Option<&LlmConfig>,
        ) -> Result<LlmResponse, ScoutError> {
            self.tool_counts_seen.lock().unwrap().push(tools.len());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ScoutError::Llm("script exhausted".to_string()))?;
            Ok(LlmResponse::new(next))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct StubSearch;

    #[async_trait]
    impl SearchProvider for StubSearch {
        async fn search(
            &self,
            query: &str,
            _num_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            if query.contains("fail") {
                return Err(SearchError::RateLimited);
            }
            Ok(vec![SearchResult {
                title: "octocat profile".to_string(),
                link: "https://github.com/octocat".to_string(),
                snippet: "GitHub profile".to_string(),
                position: 1,
            }])
        }
    }

    struct StubScrape;

    #[async_trait]
    impl ScrapeProvider for StubScrape {
        async fn scrape(&self, url: &str) -> ScrapedPage {
            if url.contains("dead") {
                ScrapedPage::failure(url, "connection refused")
            } else {
                ScrapedPage {
                    url: url.to_string(),
                    markdown: "# octocat\nBuilds ML tooling.".to_string(),
                    title: Some("octocat".to_string()),
                    success: true,
                    error: None,
                }
            }
        }
    }

    fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args,
        }
    }

    fn final_json() -> String {
        serde_json::json!({
            "page_findings": [{
                "url": "https://github.com/octocat",
                "title": "octocat",
                "summary": "GitHub profile",
                "findings": "- builds ML tooling",
                "interesting_links": null
            }],
            "research_findings": "Octocat builds ML tooling."
        })
        .to_string()
    }

    fn researcher(llm: ScriptedLlm) -> Researcher {
        Researcher::new(
            Arc::new(llm),
            Arc::new(StubSearch),
            Arc::new(StubScrape),
            LlmConfig::new("test-model"),
        )
    }

    #[tokio::test]
    async fn test_research_tool_loop_then_synthesis() {
        let llm = ScriptedLlm::new(vec![
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![tool_call(
                    "c1",
                    SCRAPE_TOOL,
                    serde_json::json!({"url": "https://github.com/octocat"}),
                )],
            ),
            ChatMessage::assistant(final_json()),
        ]);

        let outcome = researcher(llm)
            .research("scan the profile page", "")
            .await
            .unwrap();

        assert_eq!(outcome.page_findings.len(), 1);
        assert_eq!(outcome.page_findings[0].url, "https://github.com/octocat");
        assert_eq!(outcome.page_findings[0].current_goal, "scan the profile page");
        assert_eq!(outcome.research_findings, "Octocat builds ML tooling.");
    }

    #[tokio::test]
    async fn test_research_budget_forces_synthesis_without_tools() {
        let greedy = |i: usize| {
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![tool_call(
                    &format!("c{i}"),
                    SEARCH_TOOL,
                    serde_json::json!({"query": "octocat"}),
                )],
            )
        };
        let llm = ScriptedLlm::new(vec![
            greedy(1),
            greedy(2),
            ChatMessage::assistant(final_json()),
        ]);
        let counts = Arc::clone(&llm.tool_counts_seen);

        let step = researcher(llm).with_max_tool_calls(2);
        let outcome = step.research("goal", "prior").await.unwrap();

        assert_eq!(outcome.research_findings, "Octocat builds ML tooling.");
        // The forced synthesis call offers no tools.
        assert_eq!(*counts.lock().unwrap(), vec![2, 2, 0]);
    }

    #[tokio::test]
    async fn test_research_scrape_failure_is_inline_not_fatal() {
        let llm = ScriptedLlm::new(vec![
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![tool_call(
                    "c1",
                    SCRAPE_TOOL,
                    serde_json::json!({"url": "https://dead.example.com"}),
                )],
            ),
            ChatMessage::assistant(final_json()),
        ]);

        let outcome = researcher(llm).research("goal", "").await.unwrap();
        assert_eq!(outcome.page_findings.len(), 1);
    }

    #[tokio::test]
    async fn test_research_search_error_is_inline_not_fatal() {
        let llm = ScriptedLlm::new(vec![
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![tool_call(
                    "c1",
                    SEARCH_TOOL,
                    serde_json::json!({"query": "this will fail"}),
                )],
            ),
            ChatMessage::assistant(final_json()),
        ]);

        let outcome = researcher(llm).research("goal", "").await.unwrap();
        assert_eq!(outcome.research_findings, "Octocat builds ML tooling.");
    }

    #[tokio::test]
    async fn test_research_unparseable_synthesis_keeps_raw_text() {
        let llm = ScriptedLlm::new(vec![ChatMessage::assistant(
            "They seem to be a strong ML engineer but I could not format my notes.",
        )]);

        let outcome = researcher(llm).research("goal", "").await.unwrap();
        assert!(outcome.page_findings.is_empty());
        assert!(outcome.research_findings.contains("strong ML engineer"));
    }

    #[tokio::test]
    async fn test_research_llm_failure_propagates() {
        let llm = ScriptedLlm::new(vec![]);
        let result = researcher(llm).research("goal", "").await;
        assert!(matches!(result, Err(ScoutError::Llm(_))));
    }

    #[tokio::test]
    async fn test_research_entries_without_url_are_dropped() {
        let body = serde_json::json!({
            "page_findings": [
                {"url": "", "title": "ghost", "summary": "", "findings": ""},
                {"url": "https://a.com", "title": "a", "summary": "s", "findings": "- f"}
            ],
            "research_findings": "done"
        })
        .to_string();
        let llm = ScriptedLlm::new(vec![ChatMessage::assistant(body)]);

        let outcome = researcher(llm).research("goal", "").await.unwrap();
        assert_eq!(outcome.page_findings.len(), 1);
        assert_eq!(outcome.page_findings[0].url, "https://a.com");
    }
}
