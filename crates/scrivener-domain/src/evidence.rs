//! Search plan and evidence types

use crate::{EvidenceId, HypothesisId};
use serde::{Deserialize, Serialize};

/// Whether a query looks for confirmation or for counter-evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Looks for evidence in favour of the hypothesis
    Confirm,
    /// Looks for evidence against the hypothesis
    Falsify,
}

impl QueryIntent {
    /// Get the intent name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Confirm => "confirm",
            QueryIntent::Falsify => "falsify",
        }
    }
}

/// One planned search for one hypothesis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Hypothesis the query tests
    pub hypothesis_id: HypothesisId,
    /// Query text sent to the search provider
    pub text: String,
    /// Confirm or falsify
    pub intent: QueryIntent,
}

/// How a piece of evidence bears on its hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Supports the hypothesis
    Buttress,
    /// Contradicts the hypothesis
    Falsify,
    /// Related but not decisive either way
    Neutral,
}

impl Verdict {
    /// Get the verdict name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Buttress => "buttress",
            Verdict::Falsify => "falsify",
            Verdict::Neutral => "neutral",
        }
    }

    /// Parse a verdict from a reasoner label
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "buttress" | "buttresses" | "support" | "supports" | "confirm" => Some(Verdict::Buttress),
            "falsify" | "falsifies" | "contradict" | "contradicts" | "refute" => Some(Verdict::Falsify),
            "neutral" | "irrelevant" | "unclear" => Some(Verdict::Neutral),
            _ => None,
        }
    }
}

/// A quote fetched from a source and classified against a hypothesis
///
/// Evidence items are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Unique identifier
    pub id: EvidenceId,
    /// Hypothesis the evidence was gathered for
    pub hypothesis_id: HypothesisId,
    /// Source URL
    pub source_url: String,
    /// Source title as reported by search
    #[serde(default)]
    pub title: String,
    /// Verbatim quote from the source
    pub fetched_quote: String,
    /// One-sentence assertion the quote supports
    #[serde(default)]
    pub claim: String,
    /// Stance of the evidence towards the hypothesis
    pub verdict: Verdict,
    /// Weight in [0, 1] derived from the source's quality
    pub source_quality_weight: f64,
    /// Query that surfaced the source
    #[serde(default)]
    pub query: String,
    /// Intent of that query
    pub intent: QueryIntent,
    /// When the evidence was collected (Unix seconds)
    pub collected_at: u64,
}

impl EvidenceItem {
    /// The assertion to cite: the extracted claim, or the quote when none was given
    pub fn citable_claim(&self) -> &str {
        if self.claim.trim().is_empty() {
            &self.fetched_quote
        } else {
            &self.claim
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parse() {
        assert_eq!(Verdict::parse("BUTTRESS"), Some(Verdict::Buttress));
        assert_eq!(Verdict::parse("contradicts"), Some(Verdict::Falsify));
        assert_eq!(Verdict::parse("neutral"), Some(Verdict::Neutral));
        assert_eq!(Verdict::parse("maybe"), None);
    }

    #[test]
    fn test_citable_claim_falls_back_to_quote() {
        let item = EvidenceItem {
            id: EvidenceId::from_value(1),
            hypothesis_id: HypothesisId(1),
            source_url: "https://example.org".to_string(),
            title: String::new(),
            fetched_quote: "The sky is blue.".to_string(),
            claim: " ".to_string(),
            verdict: Verdict::Buttress,
            source_quality_weight: 0.5,
            query: "sky colour".to_string(),
            intent: QueryIntent::Confirm,
            collected_at: 0,
        };
        assert_eq!(item.citable_claim(), "The sky is blue.");
    }
}
