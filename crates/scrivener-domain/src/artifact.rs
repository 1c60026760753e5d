//! Stage artifacts - the append-only record of a session
//!
//! Every stage persists its output as one or more artifacts keyed by
//! `(kind, name)`. A key is written at most once; the store rejects
//! duplicates. A unit of work is complete exactly when its artifact exists,
//! which is what makes sessions resumable.

use crate::{
    CertitudeUpdate, Critique, Draft, EvidenceItem, FinalReport, Hypothesis, HypothesisId, RevisionRecord,
    SearchQuery, Stage, VerificationReport,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Formed hypotheses
    Hypotheses,
    /// Designed search plan
    SearchPlan,
    /// Evidence for one hypothesis
    Evidence,
    /// Certitude updates
    Certitude,
    /// A draft version
    Draft,
    /// A verification report
    Verification,
    /// A critique of a verified draft
    Critique,
    /// A revision round
    Revision,
    /// The styled final report
    FinalReport,
}

impl ArtifactKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Hypotheses => "hypotheses",
            ArtifactKind::SearchPlan => "search_plan",
            ArtifactKind::Evidence => "evidence",
            ArtifactKind::Certitude => "certitude",
            ArtifactKind::Draft => "draft",
            ArtifactKind::Verification => "verification",
            ArtifactKind::Critique => "critique",
            ArtifactKind::Revision => "revision",
            ArtifactKind::FinalReport => "final_report",
        }
    }

    /// Parse a kind from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hypotheses" => Some(ArtifactKind::Hypotheses),
            "search_plan" => Some(ArtifactKind::SearchPlan),
            "evidence" => Some(ArtifactKind::Evidence),
            "certitude" => Some(ArtifactKind::Certitude),
            "draft" => Some(ArtifactKind::Draft),
            "verification" => Some(ArtifactKind::Verification),
            "critique" => Some(ArtifactKind::Critique),
            "revision" => Some(ArtifactKind::Revision),
            "final_report" => Some(ArtifactKind::FinalReport),
            _ => None,
        }
    }
}

/// Unique key of an artifact within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Artifact kind
    pub kind: ArtifactKind,
    /// Name within the kind, e.g. `H2` or `v3`
    pub name: String,
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

/// Evidence gathered for one hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBatch {
    /// Hypothesis the worker owned
    pub hypothesis_id: HypothesisId,
    /// Collected evidence
    pub items: Vec<EvidenceItem>,
    /// Queries that failed after retries and contributed nothing
    #[serde(default)]
    pub failed_queries: usize,
}

/// Stage output persisted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Artifact {
    /// Formed hypotheses
    Hypotheses(Vec<Hypothesis>),
    /// Search plan
    SearchPlan(Vec<SearchQuery>),
    /// Evidence for one hypothesis
    Evidence(EvidenceBatch),
    /// Certitude updates
    Certitude(Vec<CertitudeUpdate>),
    /// Draft version
    Draft(Draft),
    /// Verification report
    Verification(VerificationReport),
    /// Critique feeding the next revision
    Critique(Critique),
    /// Revision round
    Revision(RevisionRecord),
    /// Final report
    FinalReport(FinalReport),
}

impl Artifact {
    /// Kind of the artifact
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Hypotheses(_) => ArtifactKind::Hypotheses,
            Artifact::SearchPlan(_) => ArtifactKind::SearchPlan,
            Artifact::Evidence(_) => ArtifactKind::Evidence,
            Artifact::Certitude(_) => ArtifactKind::Certitude,
            Artifact::Draft(_) => ArtifactKind::Draft,
            Artifact::Verification(_) => ArtifactKind::Verification,
            Artifact::Critique(_) => ArtifactKind::Critique,
            Artifact::Revision(_) => ArtifactKind::Revision,
            Artifact::FinalReport(_) => ArtifactKind::FinalReport,
        }
    }

    /// Unique key of the artifact
    pub fn key(&self) -> ArtifactKey {
        let name = match self {
            Artifact::Evidence(batch) => batch.hypothesis_id.to_string(),
            Artifact::Draft(draft) => format!("v{}", draft.version),
            Artifact::Verification(report) => format!("v{}", report.draft_version),
            Artifact::Critique(critique) => format!("v{}", critique.draft_version),
            Artifact::Revision(record) => format!("r{}", record.round),
            _ => "all".to_string(),
        };
        ArtifactKey {
            kind: self.kind(),
            name,
        }
    }

    /// Stage that produces the artifact
    pub fn stage(&self) -> Stage {
        match self {
            Artifact::Hypotheses(_) => Stage::Hypotheses,
            Artifact::SearchPlan(_) => Stage::SearchPlan,
            Artifact::Evidence(_) => Stage::Evidence,
            Artifact::Certitude(_) => Stage::Certitude,
            Artifact::Draft(draft) if draft.version <= 1 => Stage::Draft,
            Artifact::Draft(draft) => Stage::Revision {
                round: draft.version - 1,
            },
            Artifact::Verification(report) => Stage::Verification {
                round: report.draft_version.saturating_sub(1),
            },
            // Part of the verification round it reviews; the stage holds
            Artifact::Critique(critique) => Stage::Verification {
                round: critique.draft_version.saturating_sub(1),
            },
            Artifact::Revision(record) => Stage::Revision {
                round: record.round,
            },
            Artifact::FinalReport(_) => Stage::Style,
        }
    }
}

/// An artifact as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    /// Append order within the session, starting at 1
    pub seq: u64,
    /// The artifact
    pub artifact: Artifact,
    /// When it was written (Unix seconds)
    pub created_at: u64,
}
