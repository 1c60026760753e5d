//! Verification reports, critiques, revision records and the final report

use crate::{CitationId, EvidenceId, EvidenceItem, SessionStatus, VerificationStatus};
use serde::{Deserialize, Serialize};

/// Verdict of the three verification layers for one citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationVerdict {
    /// Citation verified
    pub citation_id: CitationId,
    /// Final status
    pub status: VerificationStatus,
    /// Layer 1: the URL answered with a 2xx/3xx status
    pub reachable: bool,
    /// HTTP status observed by layer 1, if any
    #[serde(default)]
    pub http_status: Option<u16>,
    /// Layer 2: characters of text retrieved
    #[serde(default)]
    pub content_chars: usize,
    /// Layer 3: the reasoner judged the claim supported
    pub supported: bool,
    /// Layer 3 confidence
    pub confidence: f64,
    /// Quote the reasoner returned
    #[serde(default)]
    pub quote: String,
    /// Whether that quote occurs in the retrieved content
    #[serde(default)]
    pub quote_matched: bool,
    /// Short explanation
    #[serde(default)]
    pub reasoning: String,
}

/// Verification result for one draft version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Draft version verified
    pub draft_version: u32,
    /// One verdict per citation
    pub verdicts: Vec<CitationVerdict>,
    /// Citations with status verified
    pub verified_count: usize,
    /// Citations checked
    pub total_claims: usize,
    /// `verified_count / total_claims`; 1.0 for a draft with no citations
    pub verification_rate: f64,
    /// Rate required to finish without warning
    pub threshold: f64,
}

impl VerificationReport {
    /// Build a report from verdicts
    pub fn new(draft_version: u32, verdicts: Vec<CitationVerdict>, threshold: f64) -> Self {
        let total_claims = verdicts.len();
        let verified_count = verdicts
            .iter()
            .filter(|v| v.status == VerificationStatus::Verified)
            .count();
        let verification_rate = if total_claims == 0 {
            1.0
        } else {
            verified_count as f64 / total_claims as f64
        };
        Self {
            draft_version,
            verdicts,
            verified_count,
            total_claims,
            verification_rate,
            threshold,
        }
    }

    /// Whether the rate meets the threshold
    pub fn meets_threshold(&self) -> bool {
        self.verification_rate >= self.threshold
    }

    /// Verdicts that are not verified
    pub fn unresolved(&self) -> impl Iterator<Item = &CitationVerdict> {
        self.verdicts
            .iter()
            .filter(|v| v.status != VerificationStatus::Verified)
    }

    /// Look up the verdict for a citation
    pub fn verdict(&self, id: CitationId) -> Option<&CitationVerdict> {
        self.verdicts.iter().find(|v| v.citation_id == id)
    }
}

/// A fix the revision controller can apply to an unverified citation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStrategy {
    /// Find a different source for the same claim
    Replace,
    /// Rewrite the claim to what the source actually says
    Hedge,
    /// Drop the claim
    Remove,
}

impl RevisionStrategy {
    /// Get the strategy name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionStrategy::Replace => "replace",
            RevisionStrategy::Hedge => "hedge",
            RevisionStrategy::Remove => "remove",
        }
    }

    /// Parse a strategy name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Some(RevisionStrategy::Replace),
            "hedge" => Some(RevisionStrategy::Hedge),
            "remove" => Some(RevisionStrategy::Remove),
            _ => None,
        }
    }
}

/// The critic's reading of one unverified citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueNote {
    /// Citation discussed
    pub citation_id: CitationId,
    /// What is wrong with the claim as written
    pub issue: String,
    /// Fix the critic recommends
    #[serde(default)]
    pub advice: Option<RevisionStrategy>,
}

/// Review of a draft against its verification report
///
/// Written once per revision round, before the revision it informs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    /// Draft version reviewed
    pub draft_version: u32,
    /// Overall assessment
    pub summary: String,
    /// One note per unverified citation
    pub notes: Vec<CritiqueNote>,
    /// Whether the notes were derived from the verdicts because the
    /// reasoner's answer was unusable
    #[serde(default)]
    pub derived: bool,
}

impl Critique {
    /// The note on a citation, if any
    pub fn note(&self, id: CitationId) -> Option<&CritiqueNote> {
        self.notes.iter().find(|n| n.citation_id == id)
    }
}

/// What the revision controller did to one citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RevisionAction {
    /// Swapped in a new source backing the same claim
    Replaced {
        /// Citation revised
        citation_id: CitationId,
        /// Previous source
        old_url: String,
        /// New source
        new_url: String,
        /// Evidence created for the new source
        evidence_id: EvidenceId,
    },
    /// Rewrote the claim to match what the source says
    Hedged {
        /// Citation revised
        citation_id: CitationId,
        /// Claim after rewriting
        claim_text: String,
    },
    /// Dropped the claim and its citation
    Removed {
        /// Citation removed
        citation_id: CitationId,
        /// Claim that was dropped
        claim_text: String,
        /// Source it cited
        source_url: String,
        /// Verification status that led to the removal
        status: VerificationStatus,
    },
}

impl RevisionAction {
    /// Citation the action applies to
    pub fn citation_id(&self) -> CitationId {
        match self {
            RevisionAction::Replaced { citation_id, .. }
            | RevisionAction::Hedged { citation_id, .. }
            | RevisionAction::Removed { citation_id, .. } => *citation_id,
        }
    }
}

/// One revision round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// Round number, starting at 1
    pub round: u32,
    /// Draft version revised
    pub from_version: u32,
    /// Draft version produced
    pub to_version: u32,
    /// Per-citation actions
    pub actions: Vec<RevisionAction>,
    /// Evidence found for replacement sources, persisted before the new draft
    #[serde(default)]
    pub new_evidence: Vec<EvidenceItem>,
}

/// A claim that never reached verified status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedClaim {
    /// Citation of the claim
    pub citation_id: CitationId,
    /// Claim text
    pub claim_text: String,
    /// Source URL
    pub source_url: String,
    /// Last verification status
    pub status: VerificationStatus,
}

/// The styled, verified report handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    /// Styled markdown content
    pub content: String,
    /// Citations in the report (all from the last verified draft)
    pub citations: Vec<crate::Citation>,
    /// Rate of the last verification
    pub verification_rate: f64,
    /// Threshold the rate was held to
    pub threshold: f64,
    /// Done, or done with warning when the threshold was missed or claims
    /// were removed
    pub status: SessionStatus,
    /// Claims below verified, listed when the threshold was missed
    #[serde(default)]
    pub unresolved_claims: Vec<UnresolvedClaim>,
    /// Claims revision dropped from the report, with the status that doomed them
    #[serde(default)]
    pub removed_claims: Vec<UnresolvedClaim>,
    /// Revision rounds used
    pub revision_count: u32,
    /// Draft version the report was styled from
    pub draft_version: u32,
    /// Whether the stylist's output was kept
    #[serde(default)]
    pub styled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(id: u32, status: VerificationStatus) -> CitationVerdict {
        CitationVerdict {
            citation_id: CitationId(id),
            status,
            reachable: true,
            http_status: Some(200),
            content_chars: 100,
            supported: status != VerificationStatus::Failed,
            confidence: 0.9,
            quote: String::new(),
            quote_matched: status == VerificationStatus::Verified,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_rate_counts_only_verified() {
        let report = VerificationReport::new(
            1,
            vec![
                verdict(1, VerificationStatus::Verified),
                verdict(2, VerificationStatus::Partial),
                verdict(3, VerificationStatus::Failed),
                verdict(4, VerificationStatus::Verified),
            ],
            0.9,
        );
        assert_eq!(report.verified_count, 2);
        assert_eq!(report.total_claims, 4);
        assert_eq!(report.verification_rate, 0.5);
        assert!(!report.meets_threshold());
        assert_eq!(report.unresolved().count(), 2);
    }

    #[test]
    fn test_empty_report_meets_threshold() {
        let report = VerificationReport::new(1, vec![], 0.9);
        assert_eq!(report.verification_rate, 1.0);
        assert!(report.meets_threshold());
    }

    #[test]
    fn test_revision_action_serializes_tagged() {
        let action = RevisionAction::Removed {
            citation_id: CitationId(4),
            claim_text: "Ferries never sink.".to_string(),
            source_url: "https://dead.org".to_string(),
            status: VerificationStatus::Failed,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "removed");
        assert_eq!(json["status"], "failed");
        assert_eq!(action.citation_id(), CitationId(4));
    }

    #[test]
    fn test_strategy_names() {
        for strategy in [RevisionStrategy::Replace, RevisionStrategy::Hedge, RevisionStrategy::Remove] {
            assert_eq!(RevisionStrategy::parse(strategy.as_str()), Some(strategy));
        }
        assert_eq!(RevisionStrategy::parse(" Hedge "), Some(RevisionStrategy::Hedge));
        assert_eq!(RevisionStrategy::parse("rewrite"), None);
    }

    #[test]
    fn test_critique_note_lookup() {
        let critique = Critique {
            draft_version: 1,
            summary: "One dead link".to_string(),
            notes: vec![CritiqueNote {
                citation_id: CitationId(2),
                issue: "source is gone".to_string(),
                advice: Some(RevisionStrategy::Replace),
            }],
            derived: false,
        };
        assert_eq!(critique.note(CitationId(2)).and_then(|n| n.advice), Some(RevisionStrategy::Replace));
        assert!(critique.note(CitationId(1)).is_none());

        let json = serde_json::json!({"draft_version": 1, "summary": "", "notes": [
            {"citation_id": 3, "issue": "vague"}
        ]});
        let back: Critique = serde_json::from_value(json).unwrap();
        assert_eq!(back.notes[0].advice, None);
        assert!(!back.derived);
    }
}
