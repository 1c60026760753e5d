//! Stage-by-stage driver for one research session
//!
//! Each stage runs to completion (its worker pool fully drained) before its
//! artifacts are checked against the session state and written. Only the
//! orchestrator writes to the store. A run always starts by replaying the
//! artifact log, so the same code path serves fresh and resumed sessions.

use crate::state::SessionState;
use crate::store::SharedStore;
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider, SessionStore};
use scrivener_domain::{
    unix_now, Artifact, Citation, Draft, FinalReport, PipelineError, RevisionAction,
    RevisionRecord, Session, SessionId, SessionStatus, UnresolvedClaim, VerificationReport,
};
use scrivener_research::{
    apply_revision, CertitudeUpdater, CitationVerifier, Critic, Drafter, EvidenceGatherer,
    ExperimentDesigner, HypothesisFormer, ResearchConfig, RevisionController, StyleFinalizer,
};
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn store_error(e: String) -> PipelineError {
    PipelineError::Fatal(format!("store: {}", e))
}

/// Runs research sessions against the given collaborators and store
pub struct Orchestrator<L, S, F, St> {
    llm: Arc<L>,
    search: Arc<S>,
    fetcher: Arc<F>,
    store: SharedStore<St>,
    cancel: CancellationToken,
}

impl<L, S, F, St> Orchestrator<L, S, F, St>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
    St: SessionStore,
    St::Error: Display,
{
    /// Create an orchestrator
    pub fn new(llm: Arc<L>, search: Arc<S>, fetcher: Arc<F>, store: SharedStore<St>) -> Self {
        Self {
            llm,
            search,
            fetcher,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Check `token` at every stage boundary
    ///
    /// Cancelling never interrupts a stage: work already in flight drains and
    /// the run stops before the next stage starts.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run (or continue) a session until it finishes, fails or is cancelled
    ///
    /// The session's own configuration wins over `defaults`. The session row
    /// always ends with the run's outcome: done, done with warning, failed
    /// (with the error) or cancelled.
    pub async fn run(
        &self,
        id: SessionId,
        defaults: &ResearchConfig,
    ) -> Result<FinalReport, PipelineError> {
        let mut session = self
            .store
            .with(|s| s.get_session(id))
            .map_err(store_error)?
            .ok_or_else(|| PipelineError::Input(format!("unknown session {}", id)))?;

        session.status = SessionStatus::Running;
        session.error = None;

        let result = match session_config(&session, defaults) {
            Ok(config) => self.drive(&mut session, &config).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(report) => {
                session.status = report.status;
                info!(
                    "Session {} finished: {} ({:.0}% verified, {} revisions)",
                    id,
                    report.status.as_str(),
                    report.verification_rate * 100.0,
                    report.revision_count
                );
            }
            Err(PipelineError::Cancelled) => {
                session.status = SessionStatus::Cancelled;
                info!("Session {} cancelled at {}", id, session.current_stage);
            }
            Err(e) => {
                session.status = SessionStatus::Failed;
                session.error = Some(e.to_string());
                error!("Session {} failed at {}: {}", id, session.current_stage, e);
            }
        }
        session.updated_at = unix_now();

        let stage = session.current_stage.to_string();
        let message = match &result {
            Ok(_) => format!("Session {}", session.status.as_str()),
            Err(e) => format!("Session {}: {}", session.status.as_str(), e),
        };
        if let Err(e) = self.store.with(|s| {
            s.update_session(&session)?;
            s.append_transcript(id, &stage, &message)
        }) {
            warn!("Could not record the outcome of session {}: {}", id, e);
        }

        result
    }

    async fn drive(
        &self,
        session: &mut Session,
        config: &ResearchConfig,
    ) -> Result<FinalReport, PipelineError> {
        let id = session.id;
        let artifacts = self
            .store
            .with(|s| s.load_artifacts(id))
            .map_err(store_error)?;
        let mut state = SessionState::replay(&artifacts)?;

        let completed = state.completed_stage();
        if session.current_stage != completed {
            debug!(
                "Session {} row said {}, artifacts say {}",
                id, session.current_stage, completed
            );
            session.current_stage = completed;
        }
        session.updated_at = unix_now();
        self.store
            .with(|s| s.update_session(session))
            .map_err(store_error)?;
        if !artifacts.is_empty() {
            self.note(id, &completed.to_string(), &format!("Resuming after {}", completed));
            info!("Resuming session {} after {}", id, completed);
        }

        if !state.has_hypotheses() {
            self.checkpoint()?;
            let hypotheses = HypothesisFormer::new(Arc::clone(&self.llm), config.clone())
                .form(&session.topic)
                .await?;
            let message = format!("Formed {} hypotheses", hypotheses.len());
            self.commit(session, &mut state, Artifact::Hypotheses(hypotheses), &message)?;
        }

        if state.plan.is_none() {
            self.checkpoint()?;
            let plan = ExperimentDesigner::new(config.effective_queries_per_hypothesis())
                .design(&state.hypotheses);
            let message = format!("Planned {} queries", plan.len());
            self.commit(session, &mut state, Artifact::SearchPlan(plan), &message)?;
        }

        let missing = state.missing_evidence();
        if !missing.is_empty() {
            self.checkpoint()?;
            let plan = state.plan.clone().unwrap_or_default();
            let outcomes = EvidenceGatherer::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.search),
                config.clone(),
            )
            .gather(&missing, &plan)
            .await;

            for outcome in outcomes {
                if outcome.panicked {
                    warn!("Recording empty evidence for {} after its worker died", outcome.hypothesis_id);
                }
                let message = format!(
                    "{}: {} evidence items, {} failed queries",
                    outcome.hypothesis_id,
                    outcome.items.len(),
                    outcome.failed_queries
                );
                self.commit(session, &mut state, Artifact::Evidence(outcome.into_batch()), &message)?;
            }
        }

        if state.certitude.is_none() {
            self.checkpoint()?;
            let mut hypotheses = state.hypotheses.clone();
            let updates = CertitudeUpdater::new(config.certitude)
                .update(&mut hypotheses, &state.evidence_items())?;
            let message = updates
                .iter()
                .map(|u| format!("{} {:.2} ({})", u.hypothesis_id, u.certitude, u.band.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            self.commit(session, &mut state, Artifact::Certitude(updates), &message)?;
        }

        if state.drafts.is_empty() {
            self.checkpoint()?;
            let outcome = Drafter::new(Arc::clone(&self.llm), config.clone())
                .draft(
                    &session.topic,
                    &state.hypotheses,
                    &state.evidence_items(),
                    &state.bands(),
                )
                .await;
            let message = format!(
                "Draft v1 with {} citations{}",
                outcome.draft.citations.len(),
                if outcome.used_fallback { " (composed directly)" } else { "" }
            );
            self.commit(session, &mut state, Artifact::Draft(outcome.draft), &message)?;
        }

        let verifier = CitationVerifier::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.fetcher),
            config.clone(),
        );
        let critic = Critic::new(Arc::clone(&self.llm), config.clone());
        let reviser = RevisionController::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.search),
            Arc::clone(&self.fetcher),
            config.clone(),
        );

        let (draft, report) = loop {
            let latest = state
                .latest_draft()
                .cloned()
                .ok_or_else(|| PipelineError::Fatal("no draft to verify".to_string()))?;

            let report = match state.report_for(latest.version) {
                Some(report) => report.clone(),
                None => {
                    self.checkpoint()?;
                    let report = verifier.verify(&latest).await;
                    let message = format!(
                        "Draft v{}: {}/{} verified ({:.0}%)",
                        latest.version,
                        report.verified_count,
                        report.total_claims,
                        report.verification_rate * 100.0
                    );
                    self.commit(session, &mut state, Artifact::Verification(report.clone()), &message)?;
                    report
                }
            };

            let rounds_used = latest.version - 1;
            if report.meets_threshold() {
                break (latest, report);
            }
            if rounds_used >= config.max_iterations {
                warn!(
                    "Session {}: {:.0}% verified after {} revision rounds, below {:.0}%",
                    id,
                    report.verification_rate * 100.0,
                    rounds_used,
                    report.threshold * 100.0
                );
                break (latest, report);
            }

            let pending = state
                .revisions
                .iter()
                .find(|r| r.from_version == latest.version)
                .cloned();
            let next = match pending {
                Some(record) => {
                    info!("Rebuilding draft v{} from revision round {}", record.to_version, record.round);
                    apply_revision(&latest, &report, &record)
                }
                None => {
                    let critique = match state.critique_for(latest.version) {
                        Some(critique) => critique.clone(),
                        None => {
                            self.checkpoint()?;
                            let critique = critic.critique(&latest, &report).await;
                            let message = format!(
                                "Critique of draft v{}: {} notes{}",
                                latest.version,
                                critique.notes.len(),
                                if critique.derived { " (from verdicts)" } else { "" }
                            );
                            self.commit(session, &mut state, Artifact::Critique(critique.clone()), &message)?;
                            critique
                        }
                    };

                    self.checkpoint()?;
                    let outcome = reviser
                        .revise(&latest, &report, Some(&critique), rounds_used + 1)
                        .await;
                    let message = format!(
                        "Revision round {}: {} actions, {} new sources",
                        outcome.record.round,
                        outcome.record.actions.len(),
                        outcome.record.new_evidence.len()
                    );
                    self.commit(session, &mut state, Artifact::Revision(outcome.record), &message)?;
                    outcome.draft
                }
            };
            let message = format!("Draft v{} with {} citations", next.version, next.citations.len());
            self.commit(session, &mut state, Artifact::Draft(next), &message)?;
        };

        if let Some(report) = state.final_report.clone() {
            return Ok(report);
        }

        self.checkpoint()?;
        let styled = StyleFinalizer::new(Arc::clone(&self.llm), config.clone())
            .finalize(&draft, config.style)
            .await;
        let final_report = build_final_report(
            &draft,
            &report,
            &state.revisions,
            styled.content,
            styled.styled,
        );
        let message = format!(
            "Final report from draft v{} ({}, {})",
            draft.version,
            final_report.status.as_str(),
            if final_report.styled { "styled" } else { "unstyled" }
        );
        self.commit(session, &mut state, Artifact::FinalReport(final_report.clone()), &message)?;
        Ok(final_report)
    }

    fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Check, persist and absorb one artifact, then advance the session
    fn commit(
        &self,
        session: &mut Session,
        state: &mut SessionState,
        artifact: Artifact,
        message: &str,
    ) -> Result<(), PipelineError> {
        state.apply(&artifact)?;
        let id = session.id;
        self.store
            .with(|s| s.append_artifact(id, &artifact))
            .map_err(store_error)?;

        let stage = state.completed_stage();
        if stage != session.current_stage {
            session.advance(stage, unix_now())?;
            self.store
                .with(|s| s.update_session(session))
                .map_err(store_error)?;
        }
        debug!("Session {}: wrote {}", id, artifact.key());
        self.note(id, &artifact.stage().to_string(), message);
        Ok(())
    }

    fn note(&self, id: SessionId, stage: &str, message: &str) {
        if let Err(e) = self.store.with(|s| s.append_transcript(id, stage, message)) {
            warn!("Could not append to transcript of {}: {}", id, e);
        }
    }
}

fn session_config(session: &Session, defaults: &ResearchConfig) -> Result<ResearchConfig, PipelineError> {
    let config = match &session.config {
        Some(text) => ResearchConfig::from_toml(text).map_err(PipelineError::Fatal)?,
        None => defaults.clone(),
    };
    config.validate().map_err(PipelineError::Input)?;
    Ok(config)
}

/// Assemble the final report from the last verified draft
///
/// Claims any revision round removed are listed, and their removal alone is
/// enough to finish with a warning.
pub fn build_final_report(
    draft: &Draft,
    report: &VerificationReport,
    revisions: &[RevisionRecord],
    content: String,
    styled: bool,
) -> FinalReport {
    let citations: Vec<Citation> = draft
        .citations
        .iter()
        .map(|c| match report.verdict(c.id) {
            Some(v) => Citation {
                verification_status: v.status,
                confidence: v.confidence,
                ..c.clone()
            },
            None => c.clone(),
        })
        .collect();

    let met = report.meets_threshold();
    let unresolved_claims = if met {
        Vec::new()
    } else {
        report
            .unresolved()
            .filter_map(|v| {
                draft.citation(v.citation_id).map(|c| UnresolvedClaim {
                    citation_id: c.id,
                    claim_text: c.claim_text.clone(),
                    source_url: c.source_url.clone(),
                    status: v.status,
                })
            })
            .collect()
    };

    let removed_claims: Vec<UnresolvedClaim> = revisions
        .iter()
        .flat_map(|r| r.actions.iter())
        .filter_map(|action| match action {
            RevisionAction::Removed {
                citation_id,
                claim_text,
                source_url,
                status,
            } => Some(UnresolvedClaim {
                citation_id: *citation_id,
                claim_text: claim_text.clone(),
                source_url: source_url.clone(),
                status: *status,
            }),
            _ => None,
        })
        .collect();

    FinalReport {
        content,
        citations,
        verification_rate: report.verification_rate,
        threshold: report.threshold,
        status: if met && removed_claims.is_empty() {
            SessionStatus::Done
        } else {
            SessionStatus::DoneWithWarning
        },
        unresolved_claims,
        removed_claims,
        revision_count: draft.version.saturating_sub(1),
        draft_version: draft.version,
        styled,
    }
}
