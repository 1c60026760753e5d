//! Session state rebuilt from the artifact log
//!
//! The artifact log is the source of truth for a session. Replaying it checks
//! every artifact against what came before (evidence references, version
//! order, citation provenance) and yields the state a resumed run continues
//! from. The orchestrator runs the same checks on each new artifact before
//! writing it.

use scrivener_domain::{
    Artifact, CertitudeBand, CertitudeUpdate, Critique, Draft, EvidenceBatch, EvidenceId, EvidenceItem,
    FinalReport, Hypothesis, HypothesisId, PipelineError, RevisionRecord, SearchQuery, Stage,
    StoredArtifact, VerificationReport,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Counts of what a session has produced so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    /// Hypotheses formed
    pub hypotheses: usize,
    /// Queries planned
    pub queries: usize,
    /// Hypotheses whose evidence is gathered
    pub evidence_batches: usize,
    /// Evidence items gathered, replacements included
    pub evidence_items: usize,
    /// Draft versions written
    pub drafts: usize,
    /// Verification reports written
    pub verifications: usize,
    /// Critiques written
    #[serde(default)]
    pub critiques: usize,
    /// Revision rounds written
    pub revisions: usize,
    /// Rate of the latest verification
    pub latest_verification_rate: Option<f64>,
    /// Whether the final report exists
    pub final_report: bool,
}

/// Everything a session has completed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Hypotheses with certitudes and freeze flags applied
    pub hypotheses: Vec<Hypothesis>,
    /// Search plan
    pub plan: Option<Vec<SearchQuery>>,
    /// Evidence batches by hypothesis
    pub evidence: BTreeMap<HypothesisId, EvidenceBatch>,
    /// Certitude updates
    pub certitude: Option<Vec<CertitudeUpdate>>,
    /// Drafts in version order
    pub drafts: Vec<Draft>,
    /// Verification reports in draft order
    pub reports: Vec<VerificationReport>,
    /// Critiques in draft order
    pub critiques: Vec<Critique>,
    /// Revision rounds in order
    pub revisions: Vec<RevisionRecord>,
    /// Final report
    pub final_report: Option<FinalReport>,
    formed: bool,
    known_evidence: HashSet<EvidenceId>,
}

fn fatal(message: impl Into<String>) -> PipelineError {
    PipelineError::Fatal(message.into())
}

impl SessionState {
    /// Rebuild state from stored artifacts in append order
    pub fn replay(artifacts: &[StoredArtifact]) -> Result<Self, PipelineError> {
        let mut state = Self::default();
        for stored in artifacts {
            state.apply(&stored.artifact).map_err(|e| match e {
                PipelineError::Fatal(msg) => fatal(format!("artifact #{}: {}", stored.seq, msg)),
                other => other,
            })?;
        }
        Ok(state)
    }

    /// Check `artifact` against the state and absorb it
    ///
    /// Fails with a fatal error when the artifact is out of order or
    /// references something the session never produced.
    pub fn apply(&mut self, artifact: &Artifact) -> Result<(), PipelineError> {
        match artifact {
            Artifact::Hypotheses(hypotheses) => {
                if self.formed {
                    return Err(fatal("hypotheses written twice"));
                }
                if hypotheses.is_empty() {
                    return Err(fatal("empty hypothesis set"));
                }
                self.hypotheses = hypotheses.clone();
                self.formed = true;
            }
            Artifact::SearchPlan(plan) => {
                self.require_hypotheses("search plan")?;
                if self.plan.is_some() {
                    return Err(fatal("search plan written twice"));
                }
                for query in plan {
                    self.require_hypothesis(query.hypothesis_id, "search query")?;
                }
                self.plan = Some(plan.clone());
            }
            Artifact::Evidence(batch) => {
                if self.plan.is_none() {
                    return Err(fatal("evidence before search plan"));
                }
                self.require_hypothesis(batch.hypothesis_id, "evidence batch")?;
                if self.evidence.contains_key(&batch.hypothesis_id) {
                    return Err(fatal(format!("evidence for {} written twice", batch.hypothesis_id)));
                }
                if let Some(stray) = batch.items.iter().find(|i| i.hypothesis_id != batch.hypothesis_id) {
                    return Err(fatal(format!(
                        "evidence {} for {} filed under {}",
                        stray.id, stray.hypothesis_id, batch.hypothesis_id
                    )));
                }
                self.known_evidence.extend(batch.items.iter().map(|i| i.id));
                self.evidence.insert(batch.hypothesis_id, batch.clone());
            }
            Artifact::Certitude(updates) => {
                if !self.evidence_complete() {
                    return Err(fatal("certitude before all evidence was gathered"));
                }
                if self.certitude.is_some() {
                    return Err(fatal("certitude written twice"));
                }
                for update in updates {
                    let hypothesis = self
                        .hypotheses
                        .iter_mut()
                        .find(|h| h.id == update.hypothesis_id)
                        .ok_or_else(|| fatal(format!("certitude for unknown {}", update.hypothesis_id)))?;
                    hypothesis.mark_tested()?;
                    hypothesis.apply_certitude(update.certitude, update.band)?;
                }
                self.certitude = Some(updates.clone());
            }
            Artifact::Draft(draft) => self.apply_draft(draft)?,
            Artifact::Verification(report) => {
                let latest = self
                    .latest_draft()
                    .ok_or_else(|| fatal("verification before any draft"))?;
                if report.draft_version != latest.version {
                    return Err(fatal(format!(
                        "verification of v{} while latest draft is v{}",
                        report.draft_version, latest.version
                    )));
                }
                if self.report_for(latest.version).is_some() {
                    return Err(fatal(format!("draft v{} verified twice", latest.version)));
                }
                self.reports.push(report.clone());
            }
            Artifact::Critique(critique) => self.apply_critique(critique)?,
            Artifact::Revision(record) => {
                let latest = self
                    .latest_draft()
                    .ok_or_else(|| fatal("revision before any draft"))?;
                if record.round as usize != self.revisions.len() + 1 {
                    return Err(fatal(format!("revision round {} out of order", record.round)));
                }
                if record.from_version != latest.version || self.report_for(latest.version).is_none() {
                    return Err(fatal(format!(
                        "revision of v{} before it was verified",
                        record.from_version
                    )));
                }
                if self.critique_for(latest.version).is_none() {
                    return Err(fatal(format!(
                        "revision of v{} before it was critiqued",
                        record.from_version
                    )));
                }
                if record.to_version != record.from_version + 1 {
                    return Err(fatal(format!("revision round {} skips versions", record.round)));
                }
                for item in &record.new_evidence {
                    self.require_hypothesis(item.hypothesis_id, "replacement evidence")?;
                }
                self.known_evidence.extend(record.new_evidence.iter().map(|i| i.id));
                self.revisions.push(record.clone());
            }
            Artifact::FinalReport(report) => {
                let latest = self
                    .latest_draft()
                    .ok_or_else(|| fatal("final report before any draft"))?;
                if self.report_for(latest.version).is_none() {
                    return Err(fatal("final report from an unverified draft"));
                }
                if self.final_report.is_some() {
                    return Err(fatal("final report written twice"));
                }
                let cited = latest.citation_ids();
                if let Some(extra) = report.citations.iter().find(|c| !cited.contains(&c.id)) {
                    return Err(fatal(format!(
                        "final report cites {} which draft v{} does not",
                        extra.id, latest.version
                    )));
                }
                self.final_report = Some(report.clone());
            }
        }
        Ok(())
    }

    fn apply_critique(&mut self, critique: &Critique) -> Result<(), PipelineError> {
        let latest = self
            .latest_draft()
            .ok_or_else(|| fatal("critique before any draft"))?;
        if critique.draft_version != latest.version || self.report_for(latest.version).is_none() {
            return Err(fatal(format!(
                "critique of v{} before it was verified",
                critique.draft_version
            )));
        }
        if self.critique_for(latest.version).is_some() {
            return Err(fatal(format!("draft v{} critiqued twice", latest.version)));
        }
        if let Some(stray) = critique.notes.iter().find(|n| latest.citation(n.citation_id).is_none()) {
            return Err(fatal(format!(
                "critique notes citation {} which draft v{} lacks",
                stray.citation_id, latest.version
            )));
        }
        self.critiques.push(critique.clone());
        Ok(())
    }

    fn apply_draft(&mut self, draft: &Draft) -> Result<(), PipelineError> {
        let expected = self.drafts.len() as u32 + 1;
        if draft.version != expected {
            return Err(fatal(format!(
                "draft v{} where v{} was expected",
                draft.version, expected
            )));
        }
        if self.certitude.is_none() {
            return Err(fatal("draft before certitude update"));
        }
        if draft.version > 1 && !self.revisions.iter().any(|r| r.to_version == draft.version) {
            return Err(fatal(format!("draft v{} without a revision record", draft.version)));
        }
        for citation in &draft.citations {
            if !self.known_evidence.contains(&citation.evidence_id) {
                return Err(fatal(format!(
                    "citation {} in draft v{} rests on unpersisted evidence {}",
                    citation.id, draft.version, citation.evidence_id
                )));
            }
            self.require_hypothesis(citation.hypothesis_id, "citation")?;
        }
        if draft.version == 1 {
            for citation in &draft.citations {
                if let Some(h) = self.hypotheses.iter_mut().find(|h| h.id == citation.hypothesis_id) {
                    h.freeze();
                }
            }
        }
        self.drafts.push(draft.clone());
        Ok(())
    }

    fn require_hypotheses(&self, what: &str) -> Result<(), PipelineError> {
        if self.formed {
            Ok(())
        } else {
            Err(fatal(format!("{} before hypotheses", what)))
        }
    }

    fn require_hypothesis(&self, id: HypothesisId, what: &str) -> Result<(), PipelineError> {
        self.require_hypotheses(what)?;
        if self.hypotheses.iter().any(|h| h.id == id) {
            Ok(())
        } else {
            Err(fatal(format!("{} references unknown hypothesis {}", what, id)))
        }
    }

    /// Whether hypotheses have been formed
    pub fn has_hypotheses(&self) -> bool {
        self.formed
    }

    /// Whether every hypothesis has an evidence batch
    pub fn evidence_complete(&self) -> bool {
        self.formed && self.hypotheses.iter().all(|h| self.evidence.contains_key(&h.id))
    }

    /// Hypotheses still waiting for evidence
    pub fn missing_evidence(&self) -> Vec<Hypothesis> {
        self.hypotheses
            .iter()
            .filter(|h| !self.evidence.contains_key(&h.id))
            .cloned()
            .collect()
    }

    /// Evidence items by hypothesis, as gathered
    pub fn evidence_items(&self) -> BTreeMap<HypothesisId, Vec<EvidenceItem>> {
        self.evidence
            .iter()
            .map(|(id, batch)| (*id, batch.items.clone()))
            .collect()
    }

    /// Certitude bands by hypothesis
    pub fn bands(&self) -> BTreeMap<HypothesisId, CertitudeBand> {
        self.certitude
            .iter()
            .flatten()
            .map(|u| (u.hypothesis_id, u.band))
            .collect()
    }

    /// Whether an evidence item has been persisted
    pub fn knows_evidence(&self, id: EvidenceId) -> bool {
        self.known_evidence.contains(&id)
    }

    /// The newest draft
    pub fn latest_draft(&self) -> Option<&Draft> {
        self.drafts.last()
    }

    /// The verification report of a draft version
    pub fn report_for(&self, version: u32) -> Option<&VerificationReport> {
        self.reports.iter().find(|r| r.draft_version == version)
    }

    /// The critique of a draft version
    pub fn critique_for(&self, version: u32) -> Option<&Critique> {
        self.critiques.iter().find(|c| c.draft_version == version)
    }

    /// The last stage whose artifacts are complete
    pub fn completed_stage(&self) -> Stage {
        if self.final_report.is_some() {
            return Stage::Style;
        }
        if let Some(latest) = self.latest_draft() {
            let round = latest.version - 1;
            return if self.report_for(latest.version).is_some() {
                Stage::Verification { round }
            } else if round > 0 {
                Stage::Revision { round }
            } else {
                Stage::Draft
            };
        }
        if self.certitude.is_some() {
            Stage::Certitude
        } else if self.plan.is_some() && self.evidence_complete() {
            Stage::Evidence
        } else if self.plan.is_some() {
            Stage::SearchPlan
        } else if self.formed {
            Stage::Hypotheses
        } else {
            Stage::Created
        }
    }

    /// Counts for status reporting
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            hypotheses: self.hypotheses.len(),
            queries: self.plan.as_ref().map(Vec::len).unwrap_or(0),
            evidence_batches: self.evidence.len(),
            evidence_items: self.known_evidence.len(),
            drafts: self.drafts.len(),
            verifications: self.reports.len(),
            critiques: self.critiques.len(),
            revisions: self.revisions.len(),
            latest_verification_rate: self.reports.last().map(|r| r.verification_rate),
            final_report: self.final_report.is_some(),
        }
    }
}
