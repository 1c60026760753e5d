//! Drafting: citation plan first, then sentences
//!
//! The drafter assigns citation numbers to evidence before any prose exists,
//! so every sentence can only rest on evidence already collected. Sentences
//! naming no known citation are dropped.

use crate::config::ResearchConfig;
use crate::parser::{parse_draft, DraftedReport};
use crate::pool::reason;
use crate::prompt::{DraftPromptBuilder, DRAFT_SCHEMA};
use scrivener_domain::traits::LlmProvider;
use scrivener_domain::{
    unix_now, CertitudeBand, Citation, CitationId, Draft, DraftSection, EvidenceItem, Hypothesis,
    HypothesisId, Sentence, Verdict, VerificationStatus,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One included hypothesis and the citations planned for it
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSection {
    /// Hypothesis the section covers
    pub hypothesis_id: HypothesisId,
    /// Hypothesis statement
    pub statement: String,
    /// Certitude band, which decides hedging
    pub band: CertitudeBand,
    /// Citations available to the section
    pub citations: Vec<Citation>,
}

/// The citation plan for a draft
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CitationPlan {
    /// Included hypotheses, most certain first
    pub sections: Vec<PlannedSection>,
    /// Statements of hypotheses that need more research
    pub needs_research: Vec<String>,
}

impl CitationPlan {
    /// Every planned citation
    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.sections.iter().flat_map(|s| s.citations.iter())
    }

    fn find(&self, id: CitationId) -> Option<&Citation> {
        self.citations().find(|c| c.id == id)
    }
}

/// Build the citation plan from banded hypotheses and their evidence
///
/// Falsified hypotheses are left out entirely; uncertain ones only appear as
/// open questions.
pub fn plan_citations(
    hypotheses: &[Hypothesis],
    evidence: &BTreeMap<HypothesisId, Vec<EvidenceItem>>,
    bands: &BTreeMap<HypothesisId, CertitudeBand>,
    max_per_hypothesis: usize,
) -> CitationPlan {
    let mut plan = CitationPlan::default();
    let mut ranked: Vec<&Hypothesis> = hypotheses.iter().collect();
    ranked.sort_by(|a, b| {
        b.current_certitude
            .total_cmp(&a.current_certitude)
            .then(a.id.cmp(&b.id))
    });

    let mut next_id = 1u32;
    for hypothesis in ranked {
        let band = bands
            .get(&hypothesis.id)
            .copied()
            .unwrap_or(CertitudeBand::Uncertain);
        match band {
            CertitudeBand::Falsified => continue,
            CertitudeBand::Uncertain => {
                plan.needs_research.push(hypothesis.statement.clone());
                continue;
            }
            CertitudeBand::Likely | CertitudeBand::WellSupported => {}
        }

        let mut supporting: Vec<&EvidenceItem> = evidence
            .get(&hypothesis.id)
            .map(|items| {
                items
                    .iter()
                    .filter(|e| e.verdict == Verdict::Buttress && !e.fetched_quote.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        supporting.sort_by(|a, b| b.source_quality_weight.total_cmp(&a.source_quality_weight));

        let citations: Vec<Citation> = supporting
            .into_iter()
            .take(max_per_hypothesis)
            .map(|e| {
                let citation = Citation {
                    id: CitationId(next_id),
                    claim_text: e.citable_claim().to_string(),
                    source_url: e.source_url.clone(),
                    quote: e.fetched_quote.clone(),
                    evidence_id: e.id,
                    hypothesis_id: hypothesis.id,
                    verification_status: VerificationStatus::Pending,
                    confidence: 0.0,
                };
                next_id += 1;
                citation
            })
            .collect();

        if citations.is_empty() {
            warn!("{} is included but has no citable evidence", hypothesis.id);
            plan.needs_research.push(hypothesis.statement.clone());
            continue;
        }

        plan.sections.push(PlannedSection {
            hypothesis_id: hypothesis.id,
            statement: hypothesis.statement.clone(),
            band,
            citations,
        });
    }
    plan
}

/// A draft and the hypotheses it references
#[derive(Debug, Clone, PartialEq)]
pub struct DraftOutcome {
    /// The first draft
    pub draft: Draft,
    /// Hypotheses whose evidence the draft cites; these must be frozen
    pub referenced: BTreeSet<HypothesisId>,
    /// Whether the reasoner's prose was unusable and the draft was composed directly
    pub used_fallback: bool,
}

/// Writes the first draft
pub struct Drafter<L> {
    llm: Arc<L>,
    config: ResearchConfig,
}

impl<L> Drafter<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
{
    /// Create a new drafter
    pub fn new(llm: Arc<L>, config: ResearchConfig) -> Self {
        Self { llm, config }
    }

    /// Draft a report for `topic` from banded hypotheses and their evidence
    pub async fn draft(
        &self,
        topic: &str,
        hypotheses: &[Hypothesis],
        evidence: &BTreeMap<HypothesisId, Vec<EvidenceItem>>,
        bands: &BTreeMap<HypothesisId, CertitudeBand>,
    ) -> DraftOutcome {
        let plan = plan_citations(
            hypotheses,
            evidence,
            bands,
            self.config.max_citations_per_hypothesis,
        );
        let default_title = format!("Research Report: {}", topic);

        info!(
            "Drafting {} sections with {} planned citations",
            plan.sections.len(),
            plan.citations().count()
        );

        if plan.sections.is_empty() {
            return finish(Draft::new(
                1,
                default_title,
                Vec::new(),
                plan.needs_research,
                Vec::new(),
                unix_now(),
            ), false);
        }

        let prompt = DraftPromptBuilder::new(topic, &plan.sections)
            .with_needs_research(plan.needs_research.clone())
            .build();
        debug!("Draft prompt length: {} chars", prompt.len());

        let drafted = match reason(&self.llm, &self.config.retry, "drafting", prompt, DRAFT_SCHEMA)
            .await
            .and_then(|response| parse_draft(&response))
        {
            Ok(drafted) => assemble(&plan, drafted, &default_title),
            Err(e) => {
                warn!("Drafting call unusable: {}", e);
                None
            }
        };

        match drafted {
            Some(draft) => finish(draft, false),
            None => {
                warn!("Composing the draft directly from the citation plan");
                finish(compose(&plan, default_title), true)
            }
        }
    }
}

fn finish(draft: Draft, used_fallback: bool) -> DraftOutcome {
    let referenced = draft.citations.iter().map(|c| c.hypothesis_id).collect();
    DraftOutcome {
        draft,
        referenced,
        used_fallback,
    }
}

/// Turn reasoner sections into a draft, keeping only sentences with known citations
fn assemble(plan: &CitationPlan, drafted: DraftedReport, default_title: &str) -> Option<Draft> {
    let mut by_hypothesis: BTreeMap<HypothesisId, DraftSection> = BTreeMap::new();
    let mut order: Vec<HypothesisId> = Vec::new();
    let mut claim_for: BTreeMap<CitationId, String> = BTreeMap::new();

    for section in drafted.sections {
        let labelled = section.hypothesis.as_deref().and_then(|label| {
            plan.sections
                .iter()
                .find(|s| s.hypothesis_id.to_string().eq_ignore_ascii_case(label.trim()))
                .map(|s| s.hypothesis_id)
        });

        for sentence in section.sentences {
            let mut known = Vec::new();
            for n in sentence.citations {
                let id = CitationId(n);
                if plan.find(id).is_some() {
                    if !known.contains(&id) {
                        known.push(id);
                    }
                } else {
                    warn!("Sentence cites unknown source [{}]", n);
                }
            }
            if known.is_empty() {
                warn!("Dropping sentence without a known citation: '{}'", sentence.text);
                continue;
            }

            let owner = labelled
                .or_else(|| plan.find(known[0]).map(|c| c.hypothesis_id))
                .unwrap_or(HypothesisId(0));
            for id in &known {
                claim_for.entry(*id).or_insert_with(|| sentence.text.clone());
            }
            by_hypothesis
                .entry(owner)
                .or_insert_with(|| {
                    order.push(owner);
                    DraftSection {
                        heading: section.heading.clone(),
                        sentences: Vec::new(),
                    }
                })
                .sentences
                .push(Sentence::new(sentence.text, known));
        }
    }

    if claim_for.is_empty() {
        return None;
    }

    let sections = order
        .into_iter()
        .filter_map(|id| by_hypothesis.remove(&id))
        .collect();
    let citations = plan
        .citations()
        .filter_map(|c| {
            claim_for.get(&c.id).map(|claim| Citation {
                claim_text: claim.clone(),
                ..c.clone()
            })
        })
        .collect();

    Some(Draft::new(
        1,
        drafted.title.unwrap_or_else(|| default_title.to_string()),
        sections,
        plan.needs_research.clone(),
        citations,
        unix_now(),
    ))
}

/// One sentence per citation, hedged for likely hypotheses
fn compose(plan: &CitationPlan, title: String) -> Draft {
    let mut sections = Vec::new();
    let mut citations = Vec::new();

    for planned in &plan.sections {
        let mut sentences = Vec::new();
        for citation in &planned.citations {
            let text = match planned.band {
                CertitudeBand::WellSupported => citation.claim_text.clone(),
                _ => hedge(&citation.claim_text),
            };
            sentences.push(Sentence::new(text.clone(), vec![citation.id]));
            citations.push(Citation {
                claim_text: text,
                ..citation.clone()
            });
        }
        sections.push(DraftSection {
            heading: planned
                .statement
                .trim()
                .trim_end_matches('.')
                .to_string(),
            sentences,
        });
    }

    Draft::new(1, title, sections, plan.needs_research.clone(), citations, unix_now())
}

fn hedge(claim: &str) -> String {
    let claim = claim.trim();
    let mut chars = claim.chars();
    let lowered = match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_lowercase() => {
            first.to_lowercase().chain(claim.chars().skip(1)).collect()
        }
        _ => claim.to_string(),
    };
    format!("Available evidence suggests that {}", lowered)
}
