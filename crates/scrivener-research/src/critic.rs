//! Critique of a verified draft
//!
//! Before each revision round the critic reads the draft together with the
//! verdicts that fell short and writes one note per unverified citation,
//! optionally advising a fix. The revision policy reads the notes. When the
//! reasoner's answer is unusable the notes are derived from the verdicts
//! alone, without advice.

use crate::config::ResearchConfig;
use crate::parser::parse_critique;
use crate::pool::reason;
use crate::prompt::{critique_prompt, CRITIQUE_SCHEMA};
use scrivener_domain::traits::LlmProvider;
use scrivener_domain::{Citation, CitationVerdict, Critique, CritiqueNote, Draft, VerificationReport};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reviews drafts whose verification fell short
pub struct Critic<L> {
    llm: Arc<L>,
    config: ResearchConfig,
}

impl<L> Critic<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
{
    /// Create a critic
    pub fn new(llm: Arc<L>, config: ResearchConfig) -> Self {
        Self { llm, config }
    }

    /// Critique `draft` against its verification `report`
    pub async fn critique(&self, draft: &Draft, report: &VerificationReport) -> Critique {
        let unresolved: Vec<(&Citation, &CitationVerdict)> = report
            .unresolved()
            .filter_map(|v| draft.citation(v.citation_id).map(|c| (c, v)))
            .collect();
        let fallback_summary = format!(
            "{} of {} citations in draft v{} are unverified",
            unresolved.len(),
            report.total_claims,
            draft.version
        );

        if unresolved.is_empty() {
            return Critique {
                draft_version: draft.version,
                summary: fallback_summary,
                notes: Vec::new(),
                derived: true,
            };
        }

        let findings: Vec<String> = unresolved.iter().map(|(c, v)| finding(c, v)).collect();
        let prompt = critique_prompt(&draft.render_body(), &findings);

        let parsed = reason(&self.llm, &self.config.retry, "critique", prompt, CRITIQUE_SCHEMA)
            .await
            .and_then(|response| parse_critique(&response));

        let critique = match parsed {
            Ok(response) => {
                let notes = unresolved
                    .iter()
                    .map(|(citation, verdict)| {
                        match response.notes.iter().find(|n| n.citation == citation.id.0) {
                            Some(entry) => CritiqueNote {
                                citation_id: citation.id,
                                issue: entry.issue.clone(),
                                advice: entry.advice,
                            },
                            None => {
                                debug!("Critique skipped {}, deriving its note", citation.id);
                                derived_note(verdict)
                            }
                        }
                    })
                    .collect();
                let summary = if response.summary.is_empty() {
                    fallback_summary
                } else {
                    response.summary
                };
                Critique {
                    draft_version: draft.version,
                    summary,
                    notes,
                    derived: false,
                }
            }
            Err(e) => {
                warn!("Critique call unusable, deriving notes from verdicts: {}", e);
                Critique {
                    draft_version: draft.version,
                    summary: fallback_summary,
                    notes: unresolved.iter().map(|(_, v)| derived_note(v)).collect(),
                    derived: true,
                }
            }
        };

        info!(
            "Critiqued draft v{}: {} notes, {} with advice",
            draft.version,
            critique.notes.len(),
            critique.notes.iter().filter(|n| n.advice.is_some()).count()
        );
        critique
    }
}

fn finding(citation: &Citation, verdict: &CitationVerdict) -> String {
    format!(
        "{} {}: \"{}\" | source: {} | {}",
        citation.id.marker(),
        verdict.status.as_str(),
        citation.claim_text,
        citation.source_url,
        shortfall(verdict)
    )
}

fn derived_note(verdict: &CitationVerdict) -> CritiqueNote {
    CritiqueNote {
        citation_id: verdict.citation_id,
        issue: shortfall(verdict),
        advice: None,
    }
}

/// The first verification layer the citation failed
fn shortfall(verdict: &CitationVerdict) -> String {
    if !verdict.reachable {
        match verdict.http_status {
            Some(code) => format!("source unreachable (HTTP {})", code),
            None => "source unreachable".to_string(),
        }
    } else if verdict.content_chars == 0 {
        "source returned no readable content".to_string()
    } else if !verdict.supported {
        "source does not support the claim".to_string()
    } else if !verdict.quote_matched {
        "supporting quote not found in the source".to_string()
    } else {
        format!("support too weak (confidence {:.2})", verdict.confidence)
    }
}
