//! Citations and drafts

use crate::{CitationId, EvidenceId, HypothesisId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of verifying one citation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Not yet verified
    Pending,
    /// Reachable, retrieved, supported with an exact quote
    Verified,
    /// Supported, but weakly or without an exact quote match
    Partial,
    /// Unreachable, empty, or unsupported
    Failed,
}

impl VerificationStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Partial => "partial",
            VerificationStatus::Failed => "failed",
        }
    }
}

/// A claim in a draft, traced to exactly one evidence item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Inline marker number
    pub id: CitationId,
    /// The claim the citation backs
    pub claim_text: String,
    /// Source URL
    pub source_url: String,
    /// Quote from the source backing the claim
    pub quote: String,
    /// Evidence the citation was created from
    pub evidence_id: EvidenceId,
    /// Hypothesis the claim belongs to
    pub hypothesis_id: HypothesisId,
    /// Verification outcome
    pub verification_status: VerificationStatus,
    /// Verifier confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
}

/// A sentence of a draft and the citations it relies on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// Sentence text without markers
    pub text: String,
    /// Citations backing the sentence, in marker order
    pub citations: Vec<CitationId>,
}

impl Sentence {
    /// Create a sentence
    pub fn new(text: impl Into<String>, citations: Vec<CitationId>) -> Self {
        Self {
            text: text.into(),
            citations,
        }
    }

    /// Render with inline markers, e.g. `Text [1][3]`
    pub fn render(&self) -> String {
        let text = self.text.trim();
        if self.citations.is_empty() {
            return text.to_string();
        }
        let markers: String = self.citations.iter().map(|c| c.marker()).collect();
        format!("{} {}", text, markers)
    }
}

/// A section of a draft, usually one per included hypothesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSection {
    /// Section heading
    pub heading: String,
    /// Sentences in order
    pub sentences: Vec<Sentence>,
}

/// A versioned draft report
///
/// Prior versions are never mutated: each revision produces a new draft with
/// the next version number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Version, starting at 1
    pub version: u32,
    /// Report title
    pub title: String,
    /// Structured body
    pub sections: Vec<DraftSection>,
    /// Topics listed as needing more research (no claims made)
    #[serde(default)]
    pub needs_research: Vec<String>,
    /// Citations referenced by the body
    pub citations: Vec<Citation>,
    /// Markdown rendering with inline `[n]` markers
    pub content: String,
    /// When the draft was produced (Unix seconds)
    pub created_at: u64,
}

impl Draft {
    /// Assemble a draft, dropping citations no sentence references
    pub fn new(
        version: u32,
        title: impl Into<String>,
        sections: Vec<DraftSection>,
        needs_research: Vec<String>,
        citations: Vec<Citation>,
        created_at: u64,
    ) -> Self {
        let sections: Vec<DraftSection> = sections
            .into_iter()
            .filter(|s| !s.sentences.is_empty())
            .collect();
        let referenced: BTreeSet<CitationId> = sections
            .iter()
            .flat_map(|s| s.sentences.iter())
            .flat_map(|s| s.citations.iter().copied())
            .collect();
        let citations: Vec<Citation> = citations
            .into_iter()
            .filter(|c| referenced.contains(&c.id))
            .collect();

        let mut draft = Self {
            version,
            title: title.into(),
            sections,
            needs_research,
            citations,
            content: String::new(),
            created_at,
        };
        draft.content = draft.render();
        draft
    }

    /// Render the draft as markdown
    pub fn render(&self) -> String {
        let mut out = self.render_body();
        out.push_str(&self.render_sources());
        out
    }

    /// Render title, sections and open questions, without the source list
    pub fn render_body(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n", section.heading));
            let paragraph: Vec<String> = section.sentences.iter().map(Sentence::render).collect();
            out.push_str(&paragraph.join(" "));
            out.push('\n');
        }
        if !self.needs_research.is_empty() {
            out.push_str("\n## Needs further research\n\n");
            for item in &self.needs_research {
                out.push_str(&format!("- {}\n", item));
            }
        }
        out
    }

    /// Render the numbered source list
    pub fn render_sources(&self) -> String {
        let mut out = String::new();
        if !self.citations.is_empty() {
            out.push_str("\n## Sources\n\n");
            for c in &self.citations {
                out.push_str(&format!("{} {}\n", c.id.marker(), c.source_url));
            }
        }
        out
    }

    /// Look up a citation by id
    pub fn citation(&self, id: CitationId) -> Option<&Citation> {
        self.citations.iter().find(|c| c.id == id)
    }

    /// Ids of every citation in the draft
    pub fn citation_ids(&self) -> BTreeSet<CitationId> {
        self.citations.iter().map(|c| c.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(id: u32) -> Citation {
        Citation {
            id: CitationId(id),
            claim_text: format!("claim {}", id),
            source_url: format!("https://example.org/{}", id),
            quote: "quote".to_string(),
            evidence_id: EvidenceId::from_value(id as u128),
            hypothesis_id: HypothesisId(1),
            verification_status: VerificationStatus::Pending,
            confidence: 0.0,
        }
    }

    #[test]
    fn test_sentence_render() {
        let s = Sentence::new("Rust is memory safe.", vec![CitationId(1), CitationId(3)]);
        assert_eq!(s.render(), "Rust is memory safe. [1][3]");
    }

    #[test]
    fn test_unreferenced_citations_dropped() {
        let sections = vec![DraftSection {
            heading: "Safety".to_string(),
            sentences: vec![Sentence::new("A.", vec![CitationId(1)])],
        }];
        let draft = Draft::new(1, "T", sections, vec![], vec![citation(1), citation(2)], 0);

        assert_eq!(draft.citations.len(), 1);
        assert!(draft.citation(CitationId(2)).is_none());
        assert!(draft.content.contains("A. [1]"));
        assert!(draft.content.contains("[1] https://example.org/1"));
    }

    #[test]
    fn test_empty_sections_dropped() {
        let sections = vec![DraftSection {
            heading: "Empty".to_string(),
            sentences: vec![],
        }];
        let draft = Draft::new(1, "T", sections, vec!["open question".to_string()], vec![], 0);
        assert!(draft.sections.is_empty());
        assert!(draft.content.contains("Needs further research"));
        assert!(!draft.content.contains("## Empty"));
    }
}
