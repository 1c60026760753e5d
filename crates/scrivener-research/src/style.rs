//! Style finalization
//!
//! The restyled body is compared with the verified body sentence by sentence.
//! It is accepted only when every cited sentence survives verbatim with its
//! markers, no cited sentence is added or repeated, and no uncited sentence
//! is added. Anything else falls back to the verified text unchanged.

use crate::citations::{extract_markers, marker_set, normalize, split_sentences};
use crate::config::{ResearchConfig, StyleGuide};
use crate::parser::strip_code_fences;
use crate::pool::call_blocking;
use crate::prompt::style_prompt;
use scrivener_domain::traits::LlmProvider;
use scrivener_domain::Draft;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{info, warn};

/// The finished report text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOutcome {
    /// Body (styled or not) followed by the source list
    pub content: String,
    /// Whether the styled body was accepted
    pub styled: bool,
}

/// Applies a tone to the last verified draft
pub struct StyleFinalizer<L> {
    llm: Arc<L>,
    config: ResearchConfig,
}

impl<L> StyleFinalizer<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
{
    /// Create a finalizer
    pub fn new(llm: Arc<L>, config: ResearchConfig) -> Self {
        Self { llm, config }
    }

    /// Restyle `draft`, keeping the unstyled text if the citations would change
    pub async fn finalize(&self, draft: &Draft, guide: StyleGuide) -> StyleOutcome {
        let body = draft.render_body();
        let sources = draft.render_sources();
        let prompt = style_prompt(&body, guide);

        let llm = Arc::clone(&self.llm);
        let response = call_blocking(&self.config.retry, "style", move || llm.generate(&prompt)).await;

        let styled = match response {
            Ok(text) => {
                let text = strip_code_fences(&text);
                match check_styled(&body, &text) {
                    Ok(()) => Some(text),
                    Err(reason) => {
                        warn!("Styled report rejected ({}), keeping verified text", reason);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Style call failed, keeping verified text: {}", e);
                None
            }
        };

        let accepted = styled.is_some();
        let mut content = styled.unwrap_or(body);
        if !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&sources);

        info!(
            "Finalized report v{} with {} style ({})",
            draft.version,
            guide.as_str(),
            if accepted { "styled" } else { "unstyled" }
        );
        StyleOutcome {
            content,
            styled: accepted,
        }
    }
}

fn check_styled(body: &str, styled: &str) -> Result<(), String> {
    if styled.trim().is_empty() {
        return Err("empty response".to_string());
    }
    let expected = marker_set(body);
    let found = marker_set(styled);
    if expected != found {
        return Err(format!(
            "citation markers changed ({} expected, {} found)",
            expected.len(),
            found.len()
        ));
    }

    let (mut cited, uncited) = sentence_census(body);
    let (styled_cited, styled_uncited) = sentence_census(styled);
    for sentence in styled_cited
        .into_iter()
        .flat_map(|(sentence, n)| std::iter::repeat(sentence).take(n))
    {
        match cited.get_mut(&sentence) {
            Some(count) if *count > 0 => *count -= 1,
            _ => return Err(format!("cited sentence added or altered: {}", sentence)),
        }
    }
    if let Some((missing, _)) = cited.iter().find(|(_, count)| **count > 0) {
        return Err(format!("cited sentence dropped: {}", missing));
    }
    if styled_uncited > uncited {
        return Err(format!("{} uncited sentences added", styled_uncited - uncited));
    }
    Ok(())
}

/// Normalized cited sentences with their multiplicity, and the uncited count
fn sentence_census(text: &str) -> (BTreeMap<String, usize>, usize) {
    let mut cited: BTreeMap<String, usize> = BTreeMap::new();
    let mut uncited = 0;
    for sentence in split_sentences(text) {
        if extract_markers(&sentence).is_empty() {
            uncited += 1;
        } else {
            *cited.entry(normalize(&sentence)).or_default() += 1;
        }
    }
    (cited, uncited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use scrivener_domain::{
        Citation, CitationId, DraftSection, EvidenceId, HypothesisId, Sentence, VerificationStatus,
    };
    use scrivener_llm::MockProvider;

    fn draft() -> Draft {
        let citation = Citation {
            id: CitationId(1),
            claim_text: "Tides follow the moon.".to_string(),
            source_url: "https://noaa.gov/tides".to_string(),
            quote: "tides follow the moon".to_string(),
            evidence_id: EvidenceId::new(),
            hypothesis_id: HypothesisId(1),
            verification_status: VerificationStatus::Verified,
            confidence: 0.9,
        };
        Draft::new(
            2,
            "Tides",
            vec![DraftSection {
                heading: "Cause".to_string(),
                sentences: vec![
                    Sentence::new("Tides follow the moon.", vec![CitationId(1)]),
                    Sentence::new("This is well known.", vec![]),
                ],
            }],
            vec![],
            vec![citation],
            0,
        )
    }

    fn finalizer(llm: MockProvider) -> StyleFinalizer<MockProvider> {
        let config = ResearchConfig {
            retry: RetryPolicy {
                call_timeout_secs: 5,
                max_attempts: 1,
                backoff_base_ms: 1,
            },
            ..ResearchConfig::default()
        };
        StyleFinalizer::new(Arc::new(llm), config)
    }

    #[tokio::test]
    async fn test_rewording_uncited_text_accepted() {
        let llm = MockProvider::new(
            "# Tides, explained\n\n## Why the sea moves\n\nTides follow the moon. [1] It's common knowledge.\n",
        );
        let outcome = finalizer(llm).finalize(&draft(), StyleGuide::Conversational).await;

        assert!(outcome.styled);
        assert!(outcome.content.contains("It's common knowledge."));
        assert!(outcome.content.ends_with("## Sources\n\n[1] https://noaa.gov/tides\n"));
    }

    #[tokio::test]
    async fn test_added_uncited_sentence_rejected() {
        let llm = MockProvider::new(
            "# Tides\n\n## Cause\n\nTides follow the moon. [1] This is well known. As everyone learns in school.\n",
        );
        let d = draft();
        let outcome = finalizer(llm).finalize(&d, StyleGuide::Conversational).await;

        assert!(!outcome.styled);
        assert!(!outcome.content.contains("As everyone learns in school."));
        assert_eq!(outcome.content, d.content);
    }

    #[tokio::test]
    async fn test_reused_marker_on_new_claim_rejected() {
        let llm = MockProvider::new(
            "# Tides\n\nTides follow the moon. [1] Tides also double in height every Tuesday. [1]\n",
        );
        let d = draft();
        let outcome = finalizer(llm).finalize(&d, StyleGuide::Technical).await;

        assert!(!outcome.styled);
        assert_eq!(outcome.content, d.content);
    }

    #[tokio::test]
    async fn test_repeated_cited_sentence_rejected() {
        let llm = MockProvider::new(
            "# Tides\n\nTides follow the moon. [1] Tides follow the moon. [1]\n",
        );
        let d = draft();
        let outcome = finalizer(llm).finalize(&d, StyleGuide::Academic).await;
        assert!(!outcome.styled);
    }

    #[tokio::test]
    async fn test_reworded_citation_rejected() {
        let llm = MockProvider::new("# Tides\n\nThe moon drives tides. [1]\n");
        let d = draft();
        let outcome = finalizer(llm).finalize(&d, StyleGuide::Academic).await;

        assert!(!outcome.styled);
        assert_eq!(outcome.content, d.content);
    }

    #[tokio::test]
    async fn test_dropped_marker_rejected() {
        let llm = MockProvider::new("# Tides\n\nTides follow the moon.\n");
        let d = draft();
        let outcome = finalizer(llm).finalize(&d, StyleGuide::Technical).await;
        assert!(!outcome.styled);
        assert_eq!(outcome.content, d.content);
    }

    #[tokio::test]
    async fn test_failed_call_keeps_draft() {
        let llm = MockProvider::new("unused");
        llm.fail_next(1);
        let d = draft();
        let outcome = finalizer(llm).finalize(&d, StyleGuide::Technical).await;
        assert!(!outcome.styled);
        assert_eq!(outcome.content, d.content);
    }
}
