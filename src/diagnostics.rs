//! Orchestration of the diagnostic analysis pipeline and the
//! process-lifetime report cache.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::info;

use crate::assess;
use crate::error::DiagnosticsError;
use crate::llm::{ReasoningEngine, ANALYSIS_MAX_TOKENS, QUERY_MAX_TOKENS};
use crate::models::{AnalysisOutcome, AnalysisPayload, AssignmentReport, StudentAssessment};
use crate::prompts;
use crate::report;
use crate::store::ConversationStore;

/// Owns the report cache and the per-assignment run locks. One service
/// instance is constructed at startup and handed to whoever needs it; no
/// global state.
pub struct DiagnosticsService {
    store: ConversationStore,
    engine: Arc<dyn ReasoningEngine>,
    cache: Mutex<HashMap<String, AssignmentReport>>,
    run_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DiagnosticsService {
    pub fn new(store: ConversationStore, engine: Arc<dyn ReasoningEngine>) -> Self {
        Self {
            store,
            engine,
            cache: Mutex::new(HashMap::new()),
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run the full pipeline for one assignment: first-pass extraction,
    /// canonicalization, aligned passes, aggregation, overview synthesis,
    /// then a wholesale cache overwrite. Concurrent runs for the same
    /// assignment id are serialized; a failed extraction caches nothing.
    pub async fn analyze(
        &self,
        assignment_id: &str,
    ) -> Result<AnalysisOutcome, DiagnosticsError> {
        let run_lock = self.run_lock(assignment_id).await;
        let _running = run_lock.lock().await;

        let (conversations, exam_content) = self.store.load_conversations(assignment_id)?;
        if conversations.is_empty() {
            info!(assignment_id, "no chat histories found; nothing to analyze");
            return Ok(AnalysisOutcome::empty_corpus(assignment_id));
        }

        info!(
            assignment_id,
            students = conversations.len(),
            "starting analysis run"
        );

        let phase1 =
            assess::run_phase1(self.engine.as_ref(), &conversations[0], &exam_content).await?;
        let aligned = assess::run_phase2(
            self.engine.as_ref(),
            &conversations[1..],
            &exam_content,
            &phase1,
        )
        .await?;

        let mut student_analyses = Vec::with_capacity(conversations.len());
        student_analyses.push(phase1.assessment.clone());
        student_analyses.extend(aligned);

        let statistics = report::render_statistics(&student_analyses);
        let overview = self
            .synthesize_overview(&student_analyses, &statistics)
            .await?;

        let cached = AssignmentReport {
            assignment_id: assignment_id.to_string(),
            student_analyses: student_analyses.clone(),
            canonical_categories: phase1.canonical,
            statistics: statistics.clone(),
            exam_content,
        };
        self.cache
            .lock()
            .await
            .insert(assignment_id.to_string(), cached);

        info!(assignment_id, "analysis run complete");

        Ok(AnalysisOutcome::Report(AnalysisPayload {
            assignment_id: assignment_id.to_string(),
            total_students: student_analyses.len(),
            overview,
            statistics,
            student_analyses,
        }))
    }

    /// Cache lookup for one assignment's report.
    pub async fn cached_report(
        &self,
        assignment_id: &str,
    ) -> Result<AssignmentReport, DiagnosticsError> {
        self.cache
            .lock()
            .await
            .get(assignment_id)
            .cloned()
            .ok_or_else(|| DiagnosticsError::not_analyzed(assignment_id))
    }

    /// Answer a free-text question against the cached report. The whole
    /// report plus the question go to the engine; the answer comes back
    /// unmodified.
    pub async fn query(
        &self,
        assignment_id: &str,
        question: &str,
    ) -> Result<String, DiagnosticsError> {
        let cached = self.cached_report(assignment_id).await?;
        let report_json =
            serde_json::to_string_pretty(&cached).context("serializing cached report")?;

        let prompt = prompts::query_prompt(&report_json, question);
        Ok(self
            .engine
            .generate(&prompt, prompts::QUERY_SYSTEM, QUERY_MAX_TOKENS)
            .await?)
    }

    async fn synthesize_overview(
        &self,
        analyses: &[StudentAssessment],
        statistics: &str,
    ) -> Result<String, DiagnosticsError> {
        let analyses_json =
            serde_json::to_string_pretty(analyses).context("serializing assessments")?;
        let prompt = prompts::overview_prompt(&analyses_json, statistics);
        Ok(self
            .engine
            .generate(&prompt, prompts::OVERVIEW_SYSTEM, ANALYSIS_MAX_TOKENS)
            .await?)
    }

    async fn run_lock(&self, assignment_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.run_locks.lock().await;
        locks
            .entry(assignment_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
