//! Three-layer citation verification
//!
//! 1. Reachability: the URL answers with a 2xx/3xx status
//! 2. Retrieval: readable content comes back, truncated for the reasoner
//! 3. Support: the reasoner finds the claim supported, confidently, with a
//!    quote that really occurs in the content
//!
//! Citations are checked in parallel on a bounded pool. Layers short-circuit:
//! an unreachable or empty source fails without a reasoning call.

use crate::citations::quote_in_content;
use crate::config::{ResearchConfig, RetryPolicy};
use crate::parser::{parse_support, SupportJudgement};
use crate::pool::{call_blocking, reason, run_bounded, UnitOutcome};
use crate::prompt::{verify_prompt, VERIFY_SCHEMA};
use scrivener_domain::traits::{is_reachable, ContentFetcher, LlmProvider};
use scrivener_domain::{
    truncate_chars, Citation, CitationId, CitationVerdict, Draft, VerificationReport,
    VerificationStatus,
};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings the verification layers need
#[derive(Debug, Clone)]
pub struct VerifySettings {
    /// Characters of content shown to the reasoner
    pub max_content_chars: usize,
    /// Confidence required for a verified verdict
    pub min_support_confidence: f64,
    /// Collaborator call policy
    pub retry: RetryPolicy,
}

impl From<&ResearchConfig> for VerifySettings {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            max_content_chars: config.max_content_chars,
            min_support_confidence: config.min_support_confidence,
            retry: config.retry.clone(),
        }
    }
}

/// Status for a layer-3 judgement
pub fn classify_support(
    judgement: &SupportJudgement,
    quote_matched: bool,
    min_confidence: f64,
) -> VerificationStatus {
    if !judgement.supported {
        VerificationStatus::Failed
    } else if judgement.confidence >= min_confidence && quote_matched {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Partial
    }
}

/// Verifies every citation of a draft
pub struct CitationVerifier<L, F> {
    llm: Arc<L>,
    fetcher: Arc<F>,
    config: ResearchConfig,
}

impl<L, F> CitationVerifier<L, F>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
{
    /// Create a new verifier
    pub fn new(llm: Arc<L>, fetcher: Arc<F>, config: ResearchConfig) -> Self {
        Self {
            llm,
            fetcher,
            config,
        }
    }

    /// Verify every citation in `draft`
    pub async fn verify(&self, draft: &Draft) -> VerificationReport {
        info!(
            "Verifying {} citations of draft v{}",
            draft.citations.len(),
            draft.version
        );

        let settings = VerifySettings::from(&self.config);
        let units = draft.citations.clone();
        let ids: Vec<_> = units.iter().map(|c| c.id).collect();

        let outcomes = run_bounded(units, self.config.verification_concurrency, |citation| {
            let llm = Arc::clone(&self.llm);
            let fetcher = Arc::clone(&self.fetcher);
            let settings = settings.clone();
            async move { verify_citation(llm, fetcher, settings, citation).await }
        })
        .await;

        let verdicts = outcomes
            .into_iter()
            .zip(ids)
            .map(|(outcome, id)| match outcome {
                UnitOutcome::Completed(verdict) => verdict,
                UnitOutcome::Panicked(reason) => CitationVerdict {
                    reasoning: format!("verification aborted: {}", reason),
                    ..failed_verdict(id)
                },
            })
            .collect();

        let report = VerificationReport::new(
            draft.version,
            verdicts,
            self.config.verification_threshold,
        );
        info!(
            "Draft v{}: {}/{} citations verified ({:.0}%)",
            draft.version,
            report.verified_count,
            report.total_claims,
            report.verification_rate * 100.0
        );
        report
    }
}

fn failed_verdict(id: CitationId) -> CitationVerdict {
    CitationVerdict {
        citation_id: id,
        status: VerificationStatus::Failed,
        reachable: false,
        http_status: None,
        content_chars: 0,
        supported: false,
        confidence: 0.0,
        quote: String::new(),
        quote_matched: false,
        reasoning: String::new(),
    }
}

/// Run the three layers for one citation
pub async fn verify_citation<L, F>(
    llm: Arc<L>,
    fetcher: Arc<F>,
    settings: VerifySettings,
    citation: Citation,
) -> CitationVerdict
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
{
    let mut verdict = failed_verdict(citation.id);
    let url = citation.source_url.clone();

    // Layer 1
    let status = {
        let fetcher = Arc::clone(&fetcher);
        let url = url.clone();
        call_blocking(&settings.retry, "reachability check", move || fetcher.check(&url)).await
    };
    match status {
        Ok(code) => {
            verdict.http_status = Some(code);
            verdict.reachable = is_reachable(code);
        }
        Err(e) => {
            verdict.reasoning = format!("unreachable: {}", e);
            return verdict;
        }
    }
    if !verdict.reachable {
        debug!("{} unreachable (HTTP {:?})", citation.id, verdict.http_status);
        verdict.reasoning = format!("unreachable: HTTP {}", verdict.http_status.unwrap_or_default());
        return verdict;
    }

    // Layer 2
    let content = {
        let fetcher = Arc::clone(&fetcher);
        let url = url.clone();
        call_blocking(&settings.retry, "content fetch", move || fetcher.fetch(&url)).await
    };
    let content = match content {
        Ok(text) => truncate_chars(&text, settings.max_content_chars),
        Err(e) => {
            verdict.reasoning = format!("content unavailable: {}", e);
            return verdict;
        }
    };
    verdict.content_chars = content.chars().count();
    if content.trim().is_empty() {
        verdict.reasoning = "empty content".to_string();
        return verdict;
    }

    // Layer 3
    let prompt = verify_prompt(&citation.claim_text, &url, &content);
    let judgement = match reason(&llm, &settings.retry, "claim support", prompt, VERIFY_SCHEMA)
        .await
        .and_then(|response| parse_support(&response))
    {
        Ok(judgement) => judgement,
        Err(e) => {
            warn!("Support check for {} unusable: {}", citation.id, e);
            verdict.reasoning = format!("support check unusable: {}", e);
            return verdict;
        }
    };

    verdict.quote_matched = quote_in_content(&judgement.quote, &content);
    verdict.status = classify_support(
        &judgement,
        verdict.quote_matched,
        settings.min_support_confidence,
    );
    verdict.supported = judgement.supported;
    verdict.confidence = judgement.confidence;
    verdict.quote = judgement.quote;
    verdict.reasoning = judgement.reasoning;

    debug!("{} -> {}", citation.id, verdict.status.as_str());
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_domain::{DraftSection, EvidenceId, HypothesisId, Sentence};
    use scrivener_llm::MockProvider;
    use scrivener_web::MockFetcher;

    const PAGE: &str = "Ferry accidents are rare. Most crossings finish without incident.";
    const SUPPORTED: &str =
        r#"{"supported": true, "confidence": 0.9, "quote": "Ferry accidents are rare.", "reasoning": "stated"}"#;

    fn config() -> ResearchConfig {
        ResearchConfig {
            verification_concurrency: 2,
            retry: RetryPolicy {
                call_timeout_secs: 5,
                max_attempts: 1,
                backoff_base_ms: 1,
            },
            ..ResearchConfig::default()
        }
    }

    fn draft(urls: &[&str]) -> Draft {
        let citations: Vec<Citation> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| Citation {
                id: CitationId(i as u32 + 1),
                claim_text: format!("Claim {}", i + 1),
                source_url: url.to_string(),
                quote: String::new(),
                evidence_id: EvidenceId::from_value(i as u128),
                hypothesis_id: HypothesisId(1),
                verification_status: VerificationStatus::Pending,
                confidence: 0.0,
            })
            .collect();
        let sentences = citations
            .iter()
            .map(|c| Sentence::new(c.claim_text.clone(), vec![c.id]))
            .collect();
        Draft::new(
            1,
            "T",
            vec![DraftSection {
                heading: "S".to_string(),
                sentences,
            }],
            vec![],
            citations,
            0,
        )
    }

    #[tokio::test]
    async fn test_all_layers_pass() {
        let llm = Arc::new(MockProvider::new(SUPPORTED));
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.add_page("https://a.org", PAGE);

        let report = CitationVerifier::new(llm, fetcher, config())
            .verify(&draft(&["https://a.org"]))
            .await;

        assert_eq!(report.verification_rate, 1.0);
        let verdict = &report.verdicts[0];
        assert_eq!(verdict.status, VerificationStatus::Verified);
        assert!(verdict.quote_matched);
        assert_eq!(verdict.http_status, Some(200));
    }

    #[tokio::test]
    async fn test_unreachable_fails_without_reasoning() {
        let llm = Arc::new(MockProvider::new(SUPPORTED));
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.add_failure("https://down.org");

        let report = CitationVerifier::new(Arc::clone(&llm), Arc::clone(&fetcher), config())
            .verify(&draft(&["https://missing.org", "https://down.org"]))
            .await;

        assert_eq!(report.verdicts[0].status, VerificationStatus::Failed);
        assert_eq!(report.verdicts[0].http_status, Some(404));
        assert!(!report.verdicts[1].reachable);
        assert_eq!(report.verification_rate, 0.0);
        assert_eq!(llm.call_count(), 0);
        assert_eq!(fetcher.fetch_count("https://missing.org"), 0);
    }

    #[tokio::test]
    async fn test_partial_when_quote_missing_or_weak() {
        let llm = Arc::new(MockProvider::new(SUPPORTED));
        llm.add_rule(
            "Source URL: https://weak.org",
            r#"{"supported": true, "confidence": 0.5, "quote": "Ferry accidents are rare."}"#,
        );
        llm.add_rule(
            "Source URL: https://invented.org",
            r#"{"supported": true, "confidence": 0.95, "quote": "Ferries never sink."}"#,
        );
        llm.add_rule(
            "Source URL: https://contradicts.org",
            r#"{"supported": false, "confidence": 0.9, "quote": ""}"#,
        );
        let fetcher = Arc::new(MockFetcher::new());
        for url in ["https://weak.org", "https://invented.org", "https://contradicts.org"] {
            fetcher.add_page(url, PAGE);
        }

        let report = CitationVerifier::new(llm, fetcher, config())
            .verify(&draft(&["https://weak.org", "https://invented.org", "https://contradicts.org"]))
            .await;

        assert_eq!(report.verdicts[0].status, VerificationStatus::Partial);
        assert_eq!(report.verdicts[1].status, VerificationStatus::Partial);
        assert!(!report.verdicts[1].quote_matched);
        assert_eq!(report.verdicts[2].status, VerificationStatus::Failed);
        assert_eq!(report.verified_count, 0);
    }

    #[tokio::test]
    async fn test_empty_content_fails() {
        let llm = Arc::new(MockProvider::new(SUPPORTED));
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.add_page("https://blank.org", "   ");

        let report = CitationVerifier::new(Arc::clone(&llm), fetcher, config())
            .verify(&draft(&["https://blank.org"]))
            .await;

        assert_eq!(report.verdicts[0].status, VerificationStatus::Failed);
        assert!(report.verdicts[0].reachable);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_verdicts_are_deterministic() {
        let llm = Arc::new(MockProvider::new(SUPPORTED));
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.add_page("https://a.org", PAGE);
        fetcher.add_page("https://b.org", PAGE);
        let verifier = CitationVerifier::new(Arc::clone(&llm), fetcher, config());
        let d = draft(&["https://a.org", "https://b.org"]);

        let first = verifier.verify(&d).await;
        let second = verifier.verify(&d).await;
        assert_eq!(first, second);

        // Identical inputs produce identical prompts
        let prompts = llm.prompts();
        let mut first_round: Vec<_> = prompts[..2].to_vec();
        let mut second_round: Vec<_> = prompts[2..].to_vec();
        first_round.sort();
        second_round.sort();
        assert_eq!(first_round, second_round);
    }

    #[tokio::test]
    async fn test_no_citations_is_vacuously_verified() {
        let llm = Arc::new(MockProvider::new(SUPPORTED));
        let fetcher = Arc::new(MockFetcher::new());
        let report = CitationVerifier::new(llm, fetcher, config())
            .verify(&draft(&[]))
            .await;
        assert_eq!(report.total_claims, 0);
        assert_eq!(report.verification_rate, 1.0);
        assert!(report.meets_threshold());
    }
}
