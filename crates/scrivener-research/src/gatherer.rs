//! Evidence gathering on a bounded worker pool
//!
//! Each worker owns one hypothesis and its fixed query set. For every query it
//! searches once, classifies each new hit once and returns. There is no
//! re-searching and no completeness judgement: the query count bounds the work.

use crate::citations::quote_in_content;
use crate::config::{ResearchConfig, RetryPolicy};
use crate::parser::parse_classification;
use crate::pool::{call_blocking, reason, run_bounded, UnitOutcome};
use crate::prompt::{classify_prompt, CLASSIFY_SCHEMA};
use crate::quality::source_quality_weight;
use scrivener_domain::traits::{LlmProvider, SearchProvider};
use scrivener_domain::{
    unix_now, EvidenceBatch, EvidenceId, EvidenceItem, Hypothesis, HypothesisId, SearchHit,
    SearchQuery,
};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one worker produced for one hypothesis
#[derive(Debug, Clone, PartialEq)]
pub struct GatherOutcome {
    /// Hypothesis the worker owned
    pub hypothesis_id: HypothesisId,
    /// Evidence collected
    pub items: Vec<EvidenceItem>,
    /// Queries that failed after retries
    pub failed_queries: usize,
    /// Hits dropped for unusable classifications
    pub dropped_hits: usize,
    /// Whether the worker died before returning
    pub panicked: bool,
}

impl GatherOutcome {
    fn empty(hypothesis_id: HypothesisId) -> Self {
        Self {
            hypothesis_id,
            items: Vec::new(),
            failed_queries: 0,
            dropped_hits: 0,
            panicked: false,
        }
    }

    /// The persisted form of the outcome
    pub fn into_batch(self) -> EvidenceBatch {
        EvidenceBatch {
            hypothesis_id: self.hypothesis_id,
            items: self.items,
            failed_queries: self.failed_queries,
        }
    }
}

/// Gathers evidence for hypotheses in parallel
pub struct EvidenceGatherer<L, S> {
    llm: Arc<L>,
    search: Arc<S>,
    config: ResearchConfig,
}

impl<L, S> EvidenceGatherer<L, S>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
{
    /// Create a new gatherer
    pub fn new(llm: Arc<L>, search: Arc<S>, config: ResearchConfig) -> Self {
        Self {
            llm,
            search,
            config,
        }
    }

    /// Gather evidence for every hypothesis
    ///
    /// Returns one outcome per hypothesis, in input order, after every worker
    /// has finished.
    pub async fn gather(&self, hypotheses: &[Hypothesis], plan: &[SearchQuery]) -> Vec<GatherOutcome> {
        let units: Vec<(Hypothesis, Vec<SearchQuery>)> = hypotheses
            .iter()
            .map(|h| {
                let queries = plan
                    .iter()
                    .filter(|q| q.hypothesis_id == h.id)
                    .cloned()
                    .collect();
                (h.clone(), queries)
            })
            .collect();
        let ids: Vec<HypothesisId> = hypotheses.iter().map(|h| h.id).collect();

        info!(
            "Gathering evidence for {} hypotheses with {} workers",
            units.len(),
            self.config.worker_count
        );

        let outcomes = run_bounded(units, self.config.worker_count, |(hypothesis, queries)| {
            let llm = Arc::clone(&self.llm);
            let search = Arc::clone(&self.search);
            let policy = self.config.retry.clone();
            async move { gather_one(llm, search, policy, hypothesis, queries).await }
        })
        .await;

        outcomes
            .into_iter()
            .zip(ids)
            .map(|(outcome, id)| match outcome {
                UnitOutcome::Completed(outcome) => outcome,
                UnitOutcome::Panicked(reason) => {
                    warn!("Evidence worker for {} died: {}", id, reason);
                    GatherOutcome {
                        panicked: true,
                        ..GatherOutcome::empty(id)
                    }
                }
            })
            .collect()
    }
}

async fn gather_one<L, S>(
    llm: Arc<L>,
    search: Arc<S>,
    policy: RetryPolicy,
    hypothesis: Hypothesis,
    queries: Vec<SearchQuery>,
) -> GatherOutcome
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
{
    let mut outcome = GatherOutcome::empty(hypothesis.id);
    let mut seen_urls = HashSet::new();

    for query in &queries {
        let hits = {
            let search = Arc::clone(&search);
            let text = query.text.clone();
            call_blocking(&policy, "search", move || {
                search.search(&text, search.max_results())
            })
            .await
        };
        let hits = match hits {
            Ok(hits) => hits,
            Err(e) => {
                warn!("{}: query '{}' failed: {}", hypothesis.id, query.text, e);
                outcome.failed_queries += 1;
                continue;
            }
        };
        debug!("{}: query '{}' returned {} hits", hypothesis.id, query.text, hits.len());

        for hit in hits {
            if !seen_urls.insert(hit.url.clone()) {
                continue;
            }
            match classify_hit(&llm, &policy, &hypothesis, query, &hit).await {
                Some(item) => outcome.items.push(item),
                None => outcome.dropped_hits += 1,
            }
        }
    }

    info!(
        "{}: {} evidence items ({} failed queries, {} dropped hits)",
        hypothesis.id,
        outcome.items.len(),
        outcome.failed_queries,
        outcome.dropped_hits
    );
    outcome
}

async fn classify_hit<L>(
    llm: &Arc<L>,
    policy: &RetryPolicy,
    hypothesis: &Hypothesis,
    query: &SearchQuery,
    hit: &SearchHit,
) -> Option<EvidenceItem>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
{
    if hit.snippet.trim().is_empty() {
        debug!("Skipping {}: no text to classify", hit.url);
        return None;
    }

    let prompt = classify_prompt(&hypothesis.statement, &query.text, query.intent, hit);
    let response = match reason(llm, policy, "classification", prompt, CLASSIFY_SCHEMA).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Classification of {} failed: {}", hit.url, e);
            return None;
        }
    };
    let classification = match parse_classification(&response) {
        Ok(c) => c,
        Err(e) => {
            warn!("Unparseable classification for {}: {}", hit.url, e);
            return None;
        }
    };
    if !quote_in_content(&classification.quote, &hit.snippet) {
        warn!("Quote for {} does not occur in the source text", hit.url);
        return None;
    }

    Some(EvidenceItem {
        id: EvidenceId::new(),
        hypothesis_id: hypothesis.id,
        source_url: hit.url.clone(),
        title: hit.title.clone(),
        fetched_quote: classification.quote,
        claim: classification.claim,
        verdict: classification.verdict,
        source_quality_weight: source_quality_weight(&hit.url),
        query: query.text.clone(),
        intent: query.intent,
        collected_at: unix_now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designer::ExperimentDesigner;
    use scrivener_domain::{Stance, Verdict};
    use scrivener_llm::MockProvider;
    use scrivener_web::MockSearch;

    fn config() -> ResearchConfig {
        ResearchConfig {
            worker_count: 2,
            retry: RetryPolicy {
                call_timeout_secs: 5,
                max_attempts: 2,
                backoff_base_ms: 1,
            },
            ..ResearchConfig::default()
        }
    }

    fn hit(url: &str, snippet: &str) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            title: format!("Title of {}", url),
            snippet: snippet.to_string(),
            date: None,
        }
    }

    fn hypotheses() -> Vec<Hypothesis> {
        vec![
            Hypothesis::new(HypothesisId(1), "Ferries are safe", Stance::Supportive, 0.6),
            Hypothesis::new(HypothesisId(2), "Ferries are unsafe", Stance::Critical, 0.4),
        ]
    }

    const BUTTRESS: &str =
        r#"{"verdict": "buttress", "quote": "Ferry accidents are rare.", "claim": "Ferry accidents are rare."}"#;

    #[tokio::test]
    async fn test_gather_classifies_each_url_once() {
        let llm = Arc::new(MockProvider::new(BUTTRESS));
        let search = Arc::new(MockSearch::new(20));
        search.add_results(
            "Ferries are safe",
            vec![
                hit("https://www.transport.gov/ferries", "Ferry accidents are rare."),
                hit("https://blog.example.com/ferry", "Ferry accidents are rare. I love boats."),
            ],
        );

        let hypotheses = hypotheses();
        let plan = ExperimentDesigner::new(3).design(&hypotheses);
        let gatherer = EvidenceGatherer::new(Arc::clone(&llm), Arc::clone(&search), config());
        let outcomes = gatherer.gather(&hypotheses, &plan).await;

        assert_eq!(outcomes.len(), 2);
        let first = &outcomes[0];
        assert_eq!(first.hypothesis_id, HypothesisId(1));
        // Three queries return the same two URLs; each is classified once
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].source_quality_weight, 1.0);
        assert_eq!(first.items[1].source_quality_weight, 0.5);
        assert_eq!(first.items[0].verdict, Verdict::Buttress);
        assert_eq!(llm.call_count(), 2);
        assert!(outcomes[1].items.is_empty());
    }

    #[tokio::test]
    async fn test_search_uses_provider_max_results() {
        let llm = Arc::new(MockProvider::new(BUTTRESS));
        let search = Arc::new(MockSearch::new(20));
        let hypotheses = hypotheses();
        let plan = ExperimentDesigner::new(1).design(&hypotheses);

        EvidenceGatherer::new(llm, Arc::clone(&search), config())
            .gather(&hypotheses, &plan)
            .await;

        assert!(search.queries().iter().all(|(_, n)| *n == 20));
        assert_eq!(search.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_query_does_not_fail_worker() {
        let llm = Arc::new(MockProvider::new(BUTTRESS));
        let search = Arc::new(MockSearch::new(20));
        search.add_failure("evidence against");
        search.add_results(
            "Ferries are safe",
            vec![hit("https://a.org/1", "Ferry accidents are rare.")],
        );

        let hypotheses = hypotheses();
        let plan = ExperimentDesigner::new(2).design(&hypotheses);
        let outcomes = EvidenceGatherer::new(llm, Arc::clone(&search), config())
            .gather(&hypotheses, &plan)
            .await;

        assert_eq!(outcomes[0].failed_queries, 1);
        assert_eq!(outcomes[0].items.len(), 1);
        assert!(!outcomes[0].panicked);
        // Two attempts for each failing query, one for each other
        assert_eq!(search.call_count(), 6);
    }

    #[tokio::test]
    async fn test_unusable_classifications_are_dropped() {
        let llm = Arc::new(MockProvider::new("not json"));
        llm.add_rule(
            "https://a.org/quoted",
            r#"{"verdict": "falsify", "quote": "invented words", "claim": "c"}"#,
        );
        let search = Arc::new(MockSearch::new(20));
        search.add_results(
            "Ferries are unsafe",
            vec![
                hit("https://a.org/garbled", "Some text."),
                hit("https://a.org/quoted", "Other text."),
                hit("https://a.org/empty", "  "),
            ],
        );

        let hypotheses = hypotheses();
        let plan = ExperimentDesigner::new(1).design(&hypotheses);
        let outcomes = EvidenceGatherer::new(Arc::clone(&llm), search, config())
            .gather(&hypotheses, &plan)
            .await;

        assert!(outcomes[1].items.is_empty());
        assert_eq!(outcomes[1].dropped_hits, 3);
        // The empty snippet never reaches the reasoner
        assert_eq!(llm.calls_containing("https://a.org/empty"), 0);
    }

    #[test]
    fn test_into_batch() {
        let outcome = GatherOutcome {
            failed_queries: 2,
            ..GatherOutcome::empty(HypothesisId(3))
        };
        let batch = outcome.into_batch();
        assert_eq!(batch.hypothesis_id, HypothesisId(3));
        assert_eq!(batch.failed_queries, 2);
    }
}
