//! Revision of unverified citations
//!
//! One call to [`RevisionController::revise`] is one round: every citation
//! the last report left unverified gets the first applicable strategy from the
//! policy, and a new draft version comes out. The policy sees the critic's
//! note on each citation. Looping and the round limit are the orchestrator's
//! business.

use crate::config::{ResearchConfig, RevisionStrategy};
use crate::pool::{call_blocking, run_bounded, UnitOutcome};
use crate::quality::{display_host, source_quality_weight};
use crate::verifier::{verify_citation, VerifySettings};
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider};
use scrivener_domain::{
    unix_now, Citation, CitationId, CitationVerdict, Critique, CritiqueNote, Draft, DraftSection,
    EvidenceId, EvidenceItem, QueryIntent, RevisionAction, RevisionRecord, Sentence, Verdict,
    VerificationReport, VerificationStatus,
};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Chooses which strategies to try for an unverified citation
pub trait RevisionPolicy: Send + Sync {
    /// Strategies to try, in order; the first that succeeds is applied
    fn strategies(
        &self,
        citation: &Citation,
        verdict: &CitationVerdict,
        note: Option<&CritiqueNote>,
    ) -> Vec<RevisionStrategy>;
}

/// Tries strategies in a fixed preference order, skipping inapplicable ones
///
/// Hedging needs something to hedge to, so it only applies to partial
/// verdicts whose quote was found in the source. A strategy the critique
/// advises moves to the front when it is applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceOrderPolicy {
    order: Vec<RevisionStrategy>,
}

impl PreferenceOrderPolicy {
    /// Create a policy with the given order
    pub fn new(order: Vec<RevisionStrategy>) -> Self {
        Self { order }
    }
}

impl Default for PreferenceOrderPolicy {
    fn default() -> Self {
        Self::new(vec![
            RevisionStrategy::Replace,
            RevisionStrategy::Hedge,
            RevisionStrategy::Remove,
        ])
    }
}

impl RevisionPolicy for PreferenceOrderPolicy {
    fn strategies(
        &self,
        _citation: &Citation,
        verdict: &CitationVerdict,
        note: Option<&CritiqueNote>,
    ) -> Vec<RevisionStrategy> {
        let mut strategies: Vec<RevisionStrategy> = self
            .order
            .iter()
            .copied()
            .filter(|strategy| match strategy {
                RevisionStrategy::Hedge => {
                    verdict.status == VerificationStatus::Partial
                        && verdict.quote_matched
                        && !verdict.quote.trim().is_empty()
                }
                RevisionStrategy::Replace | RevisionStrategy::Remove => true,
            })
            .collect();
        if let Some(advised) = note.and_then(|n| n.advice) {
            if let Some(pos) = strategies.iter().position(|s| *s == advised) {
                let strategy = strategies.remove(pos);
                strategies.insert(0, strategy);
            }
        }
        strategies
    }
}

/// The fix chosen for one citation
#[derive(Debug, Clone, PartialEq)]
enum Fix {
    Replace(EvidenceItem),
    Hedge { claim_text: String },
    Remove,
    Keep,
}

/// A revised draft and the record of the round
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionOutcome {
    /// The new draft version
    pub draft: Draft,
    /// What was done, including evidence found for replacements
    pub record: RevisionRecord,
}

/// Revises drafts whose verification fell short
pub struct RevisionController<L, S, F, P = PreferenceOrderPolicy> {
    llm: Arc<L>,
    search: Arc<S>,
    fetcher: Arc<F>,
    policy: Arc<P>,
    config: ResearchConfig,
}

impl<L, S, F> RevisionController<L, S, F, PreferenceOrderPolicy>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
{
    /// Create a controller using the configured preference order
    pub fn new(llm: Arc<L>, search: Arc<S>, fetcher: Arc<F>, config: ResearchConfig) -> Self {
        let policy = Arc::new(PreferenceOrderPolicy::new(config.revision_order.clone()));
        Self {
            llm,
            search,
            fetcher,
            policy,
            config,
        }
    }
}

impl<L, S, F, P> RevisionController<L, S, F, P>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
    P: RevisionPolicy + 'static,
{
    /// Swap in a different policy
    pub fn with_policy<Q: RevisionPolicy + 'static>(self, policy: Q) -> RevisionController<L, S, F, Q> {
        RevisionController {
            llm: self.llm,
            search: self.search,
            fetcher: self.fetcher,
            policy: Arc::new(policy),
            config: self.config,
        }
    }

    /// Run one revision round over `draft` using its verification `report`
    /// and the critique written for it
    pub async fn revise(
        &self,
        draft: &Draft,
        report: &VerificationReport,
        critique: Option<&Critique>,
        round: u32,
    ) -> RevisionOutcome {
        let cited_urls: HashSet<String> = draft.citations.iter().map(|c| c.source_url.clone()).collect();
        let cited_urls = Arc::new(cited_urls);

        let units: Vec<(Citation, CitationVerdict, Vec<RevisionStrategy>)> = report
            .unresolved()
            .filter_map(|verdict| {
                draft.citation(verdict.citation_id).map(|citation| {
                    let note = critique.and_then(|c| c.note(citation.id));
                    let strategies = self.policy.strategies(citation, verdict, note);
                    (citation.clone(), verdict.clone(), strategies)
                })
            })
            .collect();
        let ids: Vec<CitationId> = units.iter().map(|(c, _, _)| c.id).collect();

        info!(
            "Revision round {}: {} unresolved citations in draft v{}",
            round,
            units.len(),
            draft.version
        );

        let outcomes = run_bounded(
            units,
            self.config.verification_concurrency,
            |(citation, verdict, strategies)| {
                let llm = Arc::clone(&self.llm);
                let search = Arc::clone(&self.search);
                let fetcher = Arc::clone(&self.fetcher);
                let cited_urls = Arc::clone(&cited_urls);
                let config = self.config.clone();
                async move {
                    choose_fix(llm, search, fetcher, config, cited_urls, citation, verdict, strategies)
                        .await
                }
            },
        )
        .await;

        let fixes: BTreeMap<CitationId, Fix> = outcomes
            .into_iter()
            .zip(ids)
            .map(|(outcome, id)| match outcome {
                UnitOutcome::Completed(fix) => (id, fix),
                UnitOutcome::Panicked(reason) => {
                    warn!("Revision of {} aborted: {}", id, reason);
                    (id, Fix::Keep)
                }
            })
            .collect();

        apply_fixes(draft, report, fixes, round)
    }
}

#[allow(clippy::too_many_arguments)]
async fn choose_fix<L, S, F>(
    llm: Arc<L>,
    search: Arc<S>,
    fetcher: Arc<F>,
    config: ResearchConfig,
    cited_urls: Arc<HashSet<String>>,
    citation: Citation,
    verdict: CitationVerdict,
    strategies: Vec<RevisionStrategy>,
) -> Fix
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
{
    for strategy in strategies {
        match strategy {
            RevisionStrategy::Replace => {
                let found = find_replacement(
                    Arc::clone(&llm),
                    Arc::clone(&search),
                    Arc::clone(&fetcher),
                    &config,
                    &cited_urls,
                    &citation,
                )
                .await;
                if let Some(evidence) = found {
                    return Fix::Replace(evidence);
                }
                debug!("No replacement source for {}", citation.id);
            }
            RevisionStrategy::Hedge => {
                if verdict.quote_matched && !verdict.quote.trim().is_empty() {
                    return Fix::Hedge {
                        claim_text: format!(
                            "According to {}, \"{}\"",
                            display_host(&citation.source_url),
                            verdict.quote.trim()
                        ),
                    };
                }
            }
            RevisionStrategy::Remove => return Fix::Remove,
        }
    }
    warn!("No revision strategy applied to {}", citation.id);
    Fix::Keep
}

/// Search for the claim and keep the first hit that passes all three layers
async fn find_replacement<L, S, F>(
    llm: Arc<L>,
    search: Arc<S>,
    fetcher: Arc<F>,
    config: &ResearchConfig,
    cited_urls: &HashSet<String>,
    citation: &Citation,
) -> Option<EvidenceItem>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
{
    let query = citation.claim_text.clone();
    let hits = {
        let search = Arc::clone(&search);
        let query = query.clone();
        call_blocking(&config.retry, "replacement search", move || {
            search.search(&query, search.max_results())
        })
        .await
    };
    let hits = match hits {
        Ok(hits) => hits,
        Err(e) => {
            warn!("Replacement search for {} failed: {}", citation.id, e);
            return None;
        }
    };

    let settings = VerifySettings::from(config);
    let candidates = hits
        .into_iter()
        .filter(|hit| !cited_urls.contains(&hit.url))
        .take(config.max_replacement_candidates);

    for hit in candidates {
        let candidate = Citation {
            source_url: hit.url.clone(),
            ..citation.clone()
        };
        let verdict = verify_citation(
            Arc::clone(&llm),
            Arc::clone(&fetcher),
            settings.clone(),
            candidate,
        )
        .await;
        if verdict.status != VerificationStatus::Verified {
            debug!("Candidate {} for {} rejected: {}", hit.url, citation.id, verdict.status.as_str());
            continue;
        }

        return Some(EvidenceItem {
            id: EvidenceId::new(),
            hypothesis_id: citation.hypothesis_id,
            source_url: hit.url.clone(),
            title: hit.title,
            fetched_quote: verdict.quote,
            claim: citation.claim_text.clone(),
            verdict: Verdict::Buttress,
            source_quality_weight: source_quality_weight(&hit.url),
            query,
            intent: QueryIntent::Confirm,
            collected_at: unix_now(),
        });
    }
    None
}

/// Turn the chosen fixes into a revision record and the next draft
fn apply_fixes(
    draft: &Draft,
    report: &VerificationReport,
    fixes: BTreeMap<CitationId, Fix>,
    round: u32,
) -> RevisionOutcome {
    let mut actions = Vec::new();
    let mut new_evidence = Vec::new();

    for (id, fix) in fixes {
        let Some(citation) = draft.citation(id) else {
            continue;
        };
        match fix {
            Fix::Replace(evidence) => {
                actions.push(RevisionAction::Replaced {
                    citation_id: id,
                    old_url: citation.source_url.clone(),
                    new_url: evidence.source_url.clone(),
                    evidence_id: evidence.id,
                });
                new_evidence.push(evidence);
            }
            Fix::Hedge { claim_text } => actions.push(RevisionAction::Hedged {
                citation_id: id,
                claim_text,
            }),
            Fix::Remove => actions.push(RevisionAction::Removed {
                citation_id: id,
                claim_text: citation.claim_text.clone(),
                source_url: citation.source_url.clone(),
                status: report
                    .verdict(id)
                    .map(|v| v.status)
                    .unwrap_or(citation.verification_status),
            }),
            Fix::Keep => {}
        }
    }

    let record = RevisionRecord {
        round,
        from_version: draft.version,
        to_version: draft.version + 1,
        actions,
        new_evidence,
    };
    let revised = apply_revision(draft, report, &record);

    info!(
        "Revision round {}: {} actions, {} new sources, draft v{} -> v{}",
        round,
        record.actions.len(),
        record.new_evidence.len(),
        draft.version,
        record.to_version
    );

    RevisionOutcome {
        draft: revised,
        record,
    }
}

/// Rebuild the draft a revision record describes
///
/// Deterministic in its inputs, so a session interrupted between persisting
/// the record and the draft can recreate the same draft on resume. Citations
/// the round left alone carry their status from `report`; revised ones go
/// back to pending.
pub fn apply_revision(draft: &Draft, report: &VerificationReport, record: &RevisionRecord) -> Draft {
    let mut sections: Vec<DraftSection> = draft.sections.clone();
    let mut citations: Vec<Citation> = draft
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

    for action in &record.actions {
        let id = action.citation_id();
        let Some(citation) = citations.iter_mut().find(|c| c.id == id) else {
            warn!("Revision names {} which draft v{} lacks", id, draft.version);
            continue;
        };
        match action {
            RevisionAction::Replaced { evidence_id, .. } => {
                let Some(evidence) = record.new_evidence.iter().find(|e| e.id == *evidence_id) else {
                    warn!("Replacement evidence {} missing from round {}", evidence_id, record.round);
                    continue;
                };
                citation.source_url = evidence.source_url.clone();
                citation.quote = evidence.fetched_quote.clone();
                citation.evidence_id = evidence.id;
                citation.verification_status = VerificationStatus::Pending;
                citation.confidence = 0.0;
            }
            RevisionAction::Hedged { claim_text, .. } => {
                hedge_sentences(&mut sections, id, claim_text);
                citation.claim_text = claim_text.clone();
                if let Some(verdict) = report.verdict(id) {
                    citation.quote = verdict.quote.trim().to_string();
                }
                citation.verification_status = VerificationStatus::Pending;
                citation.confidence = 0.0;
            }
            RevisionAction::Removed { .. } => remove_citation(&mut sections, id),
        }
    }

    Draft::new(
        record.to_version,
        draft.title.clone(),
        sections,
        draft.needs_research.clone(),
        citations,
        unix_now(),
    )
}

/// Rewrite sentences resting on `id` to the hedged claim
///
/// A sentence citing only `id` is rewritten in place. In a sentence that also
/// cites other sources the marker is removed and the hedged claim follows as
/// its own sentence.
fn hedge_sentences(sections: &mut [DraftSection], id: CitationId, claim_text: &str) {
    let mut placed = false;
    for section in sections.iter_mut() {
        let mut rewritten = Vec::with_capacity(section.sentences.len() + 1);
        for mut sentence in section.sentences.drain(..) {
            if !sentence.citations.contains(&id) {
                rewritten.push(sentence);
                continue;
            }
            if sentence.citations.len() == 1 {
                if !placed {
                    sentence.text = claim_text.to_string();
                    rewritten.push(sentence);
                    placed = true;
                }
                continue;
            }
            sentence.citations.retain(|c| *c != id);
            rewritten.push(sentence);
            if !placed {
                rewritten.push(Sentence::new(claim_text, vec![id]));
                placed = true;
            }
        }
        section.sentences = rewritten;
    }
}

/// Drop `id` from every sentence, and sentences left without citations
fn remove_citation(sections: &mut [DraftSection], id: CitationId) {
    for section in sections.iter_mut() {
        section.sentences.retain_mut(|sentence| {
            if !sentence.citations.contains(&id) {
                return true;
            }
            sentence.citations.retain(|c| *c != id);
            !sentence.citations.is_empty()
        });
    }
}
