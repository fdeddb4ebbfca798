//! Pipeline controllers.
//!
//! `ClassifierPipeline` drives the research -> classify loop for one lead:
//! research once, then alternate classification and goal-directed research
//! until the classification is final or the round budget runs out, at which
//! point a forced-final pass produces the verdict. `ProfilerPipeline` is the
//! sibling loop over research -> profile, started from a previously saved
//! blackboard.
//!
//! Failure handling is asymmetric: a failed first research pass logs and
//! continues (classification can still try from an empty board), a failed
//! follow-up research pass breaks the loop and goes straight to the forced
//! final. Step failures other than research propagate.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::blackboard::Blackboard;
use crate::classify::{ClassifyStep, FitClass};
use crate::error::ScoutError;
use crate::profile::ProfileStep;
use crate::research::ResearchStep;
use crate::store::BlackboardStore;

const EXHAUSTED_MARKER: &str = "[RESEARCH EXHAUSTED: Maximum investigation rounds reached. \
                                Make final classification with available information.]";

/// Identity of the lead under investigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadIdentity {
    pub username: String,
    pub name: String,
    pub url: String,
}

impl LeadIdentity {
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            url: url.into(),
        }
    }

    /// First-pass research goal: confined to the lead's primary URL.
    fn initial_goal(&self) -> String {
        format!(
            "Find information related to whether they might be an ideal customer, \
             by visiting only the initial url (profile page). \n\
             Lead: {}\nName: {}\nInitial Url: {}",
            self.username, self.name, self.url
        )
    }

    fn context_block(&self) -> String {
        format!(
            "Username: {}\nName: {}\nURL: {}",
            self.username, self.name, self.url
        )
    }
}

/// Final result of one classification run. Always carries a label.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub lead_quality: FitClass,
    pub rationale: Option<String>,
    pub blackboard: Blackboard,
    /// Completed research-step invocations.
    pub investigation_rounds: usize,
}

/// Research -> classify loop for one lead.
#[derive(Clone)]
pub struct ClassifierPipeline {
    researcher: Arc<dyn ResearchStep>,
    classifier: Arc<dyn ClassifyStep>,
    store: Option<Arc<dyn BlackboardStore>>,
    max_rounds: usize,
}

impl ClassifierPipeline {
    pub fn new(researcher: Arc<dyn ResearchStep>, classifier: Arc<dyn ClassifyStep>) -> Self {
        Self {
            researcher,
            classifier,
            store: None,
            max_rounds: 5,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Persist the final blackboard so a later profiling run can load it.
    pub fn with_store(mut self, store: Arc<dyn BlackboardStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(&self, lead: &LeadIdentity) -> Result<PipelineOutcome, ScoutError> {
        let mut board = Blackboard::new();
        let mut rounds = 0usize;
        let context = lead.context_block();

        // First research pass is unconditional; failure is not fatal.
        match self.researcher.research(&lead.initial_goal(), &board.to_string()).await {
            Ok(outcome) => {
                board.add_page_findings(&outcome.page_findings);
                board.add_research_findings(&outcome.research_findings);
                rounds += 1;
            }
            Err(e) => {
                warn!(username = %lead.username, error = %e, "Initial research failed, classifying from empty board");
            }
        }

        let mut no_goal_streak = 0usize;
        for round in 0..self.max_rounds {
            let classification = self
                .classifier
                .classify(&context, &board.to_string(), false)
                .await?;

            if classification.is_final() {
                // is_final guarantees a label.
                let label = classification.label.unwrap_or(FitClass::NotAFit);
                info!(username = %lead.username, %label, rounds, "Classification final");
                let outcome = PipelineOutcome {
                    lead_quality: label,
                    rationale: classification.rationale,
                    blackboard: board,
                    investigation_rounds: rounds.max(1),
                };
                self.persist(lead, &outcome.blackboard);
                return Ok(outcome);
            }

            match classification.research_goal() {
                Some(goal) => {
                    no_goal_streak = 0;
                    let goal = goal.to_string();
                    match self.researcher.research(&goal, &board.to_string()).await {
                        Ok(outcome) => {
                            board.add_page_findings(&outcome.page_findings);
                            board.add_research_findings(&outcome.research_findings);
                            rounds += 1;
                        }
                        Err(e) => {
                            warn!(username = %lead.username, round, error = %e, "Follow-up research failed, forcing final");
                            break;
                        }
                    }
                }
                None => {
                    // Degenerate: non-final but nothing to research. One
                    // repeat is allowed; a second consecutive occurrence
                    // would spin identically, so force the final pass.
                    no_goal_streak += 1;
                    warn!(username = %lead.username, round, no_goal_streak, "Non-final classification with no research goal");
                    if no_goal_streak >= 2 {
                        break;
                    }
                }
            }
        }

        let exhausted_board = format!("{EXHAUSTED_MARKER}\n{board}");
        let classification = self
            .classifier
            .classify(&context, &exhausted_board, true)
            .await?;

        let label = classification.label.unwrap_or_else(|| {
            warn!(username = %lead.username, "Forced-final classification had no label, defaulting");
            FitClass::NotAFit
        });
        info!(username = %lead.username, %label, rounds, "Classification forced final");
        let outcome = PipelineOutcome {
            lead_quality: label,
            rationale: classification.rationale,
            blackboard: board,
            investigation_rounds: rounds.max(1),
        };
        self.persist(lead, &outcome.blackboard);
        Ok(outcome)
    }

    fn persist(&self, lead: &LeadIdentity, board: &Blackboard) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&lead.username, board) {
                warn!(username = %lead.username, error = %e, "Failed to persist blackboard");
            }
        }
    }
}

/// Run independent classification pipelines across leads, `lanes` at a time.
///
/// Each lead gets its own blackboard and round budget; order of results is
/// completion order.
pub async fn classify_batch(
    pipeline: &ClassifierPipeline,
    leads: Vec<LeadIdentity>,
    lanes: usize,
) -> Vec<(LeadIdentity, Result<PipelineOutcome, ScoutError>)> {
    stream::iter(leads)
        .map(|lead| async move {
            let result = pipeline.run(&lead).await;
            (lead, result)
        })
        .buffer_unordered(lanes.max(1))
        .collect()
        .await
}

/// Final result of one profiling run.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileOutcome {
    pub profile: Option<String>,
    /// Refreshed verdict, present when `update_classification` is on.
    pub lead_quality: Option<FitClass>,
    pub rationale: Option<String>,
    pub blackboard: Blackboard,
    pub investigation_rounds: usize,
}

/// Research -> profile loop, seeded from a previously saved blackboard.
#[derive(Clone)]
pub struct ProfilerPipeline {
    researcher: Arc<dyn ResearchStep>,
    profiler: Arc<dyn ProfileStep>,
    classifier: Arc<dyn ClassifyStep>,
    store: Arc<dyn BlackboardStore>,
    max_rounds: usize,
    update_classification: bool,
}

impl ProfilerPipeline {
    pub fn new(
        researcher: Arc<dyn ResearchStep>,
        profiler: Arc<dyn ProfileStep>,
        classifier: Arc<dyn ClassifyStep>,
        store: Arc<dyn BlackboardStore>,
    ) -> Self {
        Self {
            researcher,
            profiler,
            classifier,
            store,
            max_rounds: 3,
            update_classification: true,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Skip the post-profile classification refresh.
    pub fn without_classification_refresh(mut self) -> Self {
        self.update_classification = false;
        self
    }

    pub async fn run(&self, lead: &LeadIdentity) -> Result<ProfileOutcome, ScoutError> {
        let mut board = self.store.load(&lead.username)?;
        if board.is_empty() {
            return Err(ScoutError::MissingBlackboard(lead.username.clone()));
        }

        let context = lead.context_block();
        let mut rounds = 0usize;
        let mut final_profile = None;

        for round in 0..self.max_rounds {
            let result = self.profiler.profile(&context, &board.to_string()).await?;

            match result.goal() {
                None => {
                    final_profile = result.profile;
                    break;
                }
                Some(goal) => {
                    let goal = goal.to_string();
                    // Keep the best profile so far in case research fails.
                    if result.profile.is_some() {
                        final_profile = result.profile;
                    }
                    match self.researcher.research(&goal, &board.to_string()).await {
                        Ok(outcome) => {
                            board.add_page_findings(&outcome.page_findings);
                            board.add_research_findings(&outcome.research_findings);
                            rounds += 1;
                        }
                        Err(e) => {
                            warn!(username = %lead.username, round, error = %e, "Profile research failed, finishing with current board");
                            break;
                        }
                    }
                }
            }
        }

        if final_profile.is_none() {
            // Budget spent while the profiler still wanted research; one
            // last pass over whatever was gathered.
            let result = self.profiler.profile(&context, &board.to_string()).await?;
            final_profile = result.profile;
        }

        let (lead_quality, rationale) = if self.update_classification {
            let classification = self
                .classifier
                .classify(&context, &board.to_string(), true)
                .await?;
            (
                Some(classification.label.unwrap_or(FitClass::NotAFit)),
                classification.rationale,
            )
        } else {
            (None, None)
        };

        if let Err(e) = self.store.save(&lead.username, &board) {
            warn!(username = %lead.username, error = %e, "Failed to persist blackboard");
        }

        info!(
            username = %lead.username,
            rounds,
            has_profile = final_profile.is_some(),
            "Profiling complete"
        );
        Ok(ProfileOutcome {
            profile: final_profile,
            lead_quality,
            rationale,
            blackboard: board,
            investigation_rounds: rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::profile::ProfileResult;
    use crate::research::ResearchOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubResearch {
        calls: AtomicUsize,
        fail_from_call: Option<usize>,
    }

    impl StubResearch {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_from_call: None,
            }
        }

        fn failing_from(call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_from_call: Some(call),
            }
        }
    }

    #[async_trait]
    impl ResearchStep for StubResearch {
        async fn research(
            &self,
            _goal: &str,
            _blackboard: &str,
        ) -> Result<ResearchOutcome, ScoutError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_from_call.is_some_and(|n| call >= n) {
                return Err(ScoutError::Research("provider down".to_string()));
            }
            Ok(ResearchOutcome {
                page_findings: Vec::new(),
                research_findings: "Active DSPy contributor, startup CTO".to_string(),
            })
        }
    }

    struct StubClassify {
        script: Mutex<Vec<Classification>>,
        fallback: Classification,
        calls: AtomicUsize,
        forced_calls: AtomicUsize,
    }

    impl StubClassify {
        fn new(script: Vec<Classification>, fallback: Classification) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                fallback,
                calls: AtomicUsize::new(0),
                forced_calls: AtomicUsize::new(0),
            }
        }

        fn final_verdict(label: FitClass) -> Classification {
            Classification {
                label: Some(label),
                rationale: Some("verdict".to_string()),
                further_investigation: None,
            }
        }

        fn wants_research(goal: &str) -> Classification {
            Classification {
                label: Some(FitClass::WeakFit),
                rationale: None,
                further_investigation: Some(goal.to_string()),
            }
        }
    }

    #[async_trait]
    impl ClassifyStep for StubClassify {
        async fn classify(
            &self,
            _lead_context: &str,
            _blackboard: &str,
            force_final: bool,
        ) -> Result<Classification, ScoutError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if force_final {
                self.forced_calls.fetch_add(1, Ordering::SeqCst);
            }
            let mut next = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| self.fallback.clone());
            if force_final {
                next.further_investigation = None;
            }
            Ok(next)
        }
    }

    fn lead() -> LeadIdentity {
        LeadIdentity::new("octocat", "The Octocat", "https://github.com/octocat")
    }

    #[tokio::test]
    async fn test_immediate_strong_fit() {
        let classify = Arc::new(StubClassify::new(
            vec![StubClassify::final_verdict(FitClass::StrongFit)],
            StubClassify::final_verdict(FitClass::NotAFit),
        ));
        let pipeline = ClassifierPipeline::new(Arc::new(StubResearch::ok()), classify);

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(outcome.lead_quality, FitClass::StrongFit);
        assert_eq!(outcome.investigation_rounds, 1);
        assert!(outcome.blackboard.to_string().contains("DSPy contributor"));
    }

    #[tokio::test]
    async fn test_round_budget_terminates() {
        // Always wants more research; forced final must fire within
        // max_rounds + 1 classification calls.
        let classify = Arc::new(StubClassify::new(
            Vec::new(),
            StubClassify::wants_research("keep digging"),
        ));
        let pipeline = ClassifierPipeline::new(
            Arc::new(StubResearch::ok()),
            Arc::clone(&classify) as Arc<dyn ClassifyStep>,
        )
        .with_max_rounds(5);

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(classify.calls.load(Ordering::SeqCst), 6);
        assert_eq!(classify.forced_calls.load(Ordering::SeqCst), 1);
        // Forced final strips the goal, leaving a labeled verdict.
        assert_eq!(outcome.lead_quality, FitClass::WeakFit);
    }

    #[tokio::test]
    async fn test_research_failure_on_round_two_breaks_early() {
        let classify = Arc::new(StubClassify::new(
            vec![StubClassify::wants_research("check their blog")],
            StubClassify::final_verdict(FitClass::WeakFit),
        ));
        let research = Arc::new(StubResearch::failing_from(2));
        let pipeline =
            ClassifierPipeline::new(research, Arc::clone(&classify) as Arc<dyn ClassifyStep>);

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(outcome.investigation_rounds, 1);
        assert_eq!(outcome.lead_quality, FitClass::WeakFit);
        assert_eq!(classify.forced_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initial_research_failure_is_not_fatal() {
        let classify = Arc::new(StubClassify::new(
            vec![StubClassify::final_verdict(FitClass::NotAFit)],
            StubClassify::final_verdict(FitClass::NotAFit),
        ));
        let pipeline = ClassifierPipeline::new(Arc::new(StubResearch::failing_from(1)), classify);

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(outcome.lead_quality, FitClass::NotAFit);
        assert!(outcome.blackboard.is_empty());
        assert_eq!(outcome.investigation_rounds, 1);
    }

    #[tokio::test]
    async fn test_degenerate_no_goal_forces_final_on_second_occurrence() {
        let degenerate = Classification {
            label: None,
            rationale: None,
            further_investigation: None,
        };
        let classify = Arc::new(StubClassify::new(Vec::new(), degenerate));
        let pipeline = ClassifierPipeline::new(
            Arc::new(StubResearch::ok()),
            Arc::clone(&classify) as Arc<dyn ClassifyStep>,
        )
        .with_max_rounds(5);

        let outcome = pipeline.run(&lead()).await.unwrap();
        // Two degenerate rounds, then the forced final: three calls, not six.
        assert_eq!(classify.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.lead_quality, FitClass::NotAFit);
    }

    #[tokio::test]
    async fn test_null_label_defaults_conservatively() {
        let unlabeled = Classification {
            label: None,
            rationale: None,
            further_investigation: None,
        };
        let classify = Arc::new(StubClassify::new(Vec::new(), unlabeled));
        let pipeline = ClassifierPipeline::new(Arc::new(StubResearch::ok()), classify)
            .with_max_rounds(1);

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(outcome.lead_quality, FitClass::NotAFit);
    }

    #[tokio::test]
    async fn test_classify_batch_runs_all_leads() {
        let classify = Arc::new(StubClassify::new(
            Vec::new(),
            StubClassify::final_verdict(FitClass::StrongFit),
        ));
        let pipeline = ClassifierPipeline::new(Arc::new(StubResearch::ok()), classify);

        let leads = vec![
            LeadIdentity::new("a", "A", "https://a.com"),
            LeadIdentity::new("b", "B", "https://b.com"),
            LeadIdentity::new("c", "C", "https://c.com"),
        ];
        let results = classify_batch(&pipeline, leads, 2).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    struct StubProfile {
        script: Mutex<Vec<ProfileResult>>,
    }

    impl StubProfile {
        fn new(script: Vec<ProfileResult>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
            }
        }
    }

    #[async_trait]
    impl ProfileStep for StubProfile {
        async fn profile(
            &self,
            _lead_context: &str,
            _blackboard: &str,
        ) -> Result<ProfileResult, ScoutError> {
            self.script
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ScoutError::Llm("script exhausted".to_string()))
        }
    }

    struct MemoryStore {
        boards: Mutex<std::collections::HashMap<String, Blackboard>>,
    }

    impl MemoryStore {
        fn with_board(username: &str, board: Blackboard) -> Self {
            let mut boards = std::collections::HashMap::new();
            boards.insert(username.to_string(), board);
            Self {
                boards: Mutex::new(boards),
            }
        }

        fn empty() -> Self {
            Self {
                boards: Mutex::new(std::collections::HashMap::new()),
            }
        }
    }

    impl BlackboardStore for MemoryStore {
        fn load(&self, username: &str) -> Result<Blackboard, ScoutError> {
            Ok(self
                .boards
                .lock()
                .unwrap()
                .get(username)
                .cloned()
                .unwrap_or_default())
        }

        fn save(&self, username: &str, board: &Blackboard) -> Result<(), ScoutError> {
            self.boards
                .lock()
                .unwrap()
                .insert(username.to_string(), board.clone());
            Ok(())
        }
    }

    fn seeded_board() -> Blackboard {
        let mut board = Blackboard::new();
        board.add_research_findings("Known DSPy user.");
        board
    }

    #[tokio::test]
    async fn test_profiler_requires_existing_blackboard() {
        let pipeline = ProfilerPipeline::new(
            Arc::new(StubResearch::ok()),
            Arc::new(StubProfile::new(Vec::new())),
            Arc::new(StubClassify::new(
                Vec::new(),
                StubClassify::final_verdict(FitClass::NotAFit),
            )),
            Arc::new(MemoryStore::empty()),
        );

        let result = pipeline.run(&lead()).await;
        assert!(matches!(result, Err(ScoutError::MissingBlackboard(_))));
    }

    #[tokio::test]
    async fn test_profiler_loop_then_refreshed_classification() {
        let profile = StubProfile::new(vec![
            ProfileResult {
                profile: None,
                research_goal: Some("find their current employer".to_string()),
            },
            ProfileResult {
                profile: Some("Octocat, CTO, heavy DSPy user.".to_string()),
                research_goal: None,
            },
        ]);
        let pipeline = ProfilerPipeline::new(
            Arc::new(StubResearch::ok()),
            Arc::new(profile),
            Arc::new(StubClassify::new(
                Vec::new(),
                StubClassify::final_verdict(FitClass::StrongFit),
            )),
            Arc::new(MemoryStore::with_board("octocat", seeded_board())),
        );

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(
            outcome.profile.as_deref(),
            Some("Octocat, CTO, heavy DSPy user.")
        );
        assert_eq!(outcome.lead_quality, Some(FitClass::StrongFit));
        assert_eq!(outcome.investigation_rounds, 1);
    }

    #[tokio::test]
    async fn test_profiler_without_refresh_skips_classifier() {
        let profile = StubProfile::new(vec![ProfileResult {
            profile: Some("Short profile.".to_string()),
            research_goal: None,
        }]);
        let classify = Arc::new(StubClassify::new(
            Vec::new(),
            StubClassify::final_verdict(FitClass::NotAFit),
        ));
        let pipeline = ProfilerPipeline::new(
            Arc::new(StubResearch::ok()),
            Arc::new(profile),
            Arc::clone(&classify) as Arc<dyn ClassifyStep>,
            Arc::new(MemoryStore::with_board("octocat", seeded_board())),
        )
        .without_classification_refresh();

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(outcome.lead_quality, None);
        assert_eq!(classify.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_profiler_exhaustion_profiles_once_more() {
        // Always wants research; after the budget one last profile call runs.
        let wanting = ProfileResult {
            profile: None,
            research_goal: Some("keep going further".to_string()),
        };
        let profile = StubProfile::new(vec![
            wanting.clone(),
            wanting.clone(),
            wanting,
            ProfileResult {
                profile: Some("Best effort profile.".to_string()),
                research_goal: None,
            },
        ]);
        let pipeline = ProfilerPipeline::new(
            Arc::new(StubResearch::ok()),
            Arc::new(profile),
            Arc::new(StubClassify::new(
                Vec::new(),
                StubClassify::final_verdict(FitClass::WeakFit),
            )),
            Arc::new(MemoryStore::with_board("octocat", seeded_board())),
        )
        .with_max_rounds(3);

        let outcome = pipeline.run(&lead()).await.unwrap();
        assert_eq!(outcome.profile.as_deref(), Some("Best effort profile."));
        assert_eq!(outcome.investigation_rounds, 3);
    }
}
