//! Hypothesis formation
//!
//! One reasoning call turns a topic into 3 to 5 hypotheses with priors from
//! general knowledge. No search or fetch happens here.

use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::parser::{parse_hypotheses, HypothesisCandidate};
use crate::pool::reason;
use crate::prompt::{hypothesis_prompt, HYPOTHESIS_SCHEMA};
use scrivener_domain::traits::LlmProvider;
use scrivener_domain::{Hypothesis, HypothesisId, Stance};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shortest accepted topic (characters)
pub const MIN_TOPIC_CHARS: usize = 10;
/// Longest accepted topic (characters)
pub const MAX_TOPIC_CHARS: usize = 500;
/// Fewest hypotheses a run may proceed with
pub const MIN_HYPOTHESES: usize = 3;
/// Most hypotheses a run keeps
pub const MAX_HYPOTHESES: usize = 5;

/// Check a topic and return it trimmed
pub fn validate_topic(topic: &str) -> Result<String, ResearchError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ResearchError::Input("Topic must not be empty".to_string()));
    }
    let chars = topic.chars().count();
    if chars < MIN_TOPIC_CHARS {
        return Err(ResearchError::Input(format!(
            "Topic too short: {} chars (min: {})",
            chars, MIN_TOPIC_CHARS
        )));
    }
    if chars > MAX_TOPIC_CHARS {
        return Err(ResearchError::Input(format!(
            "Topic too long: {} chars (max: {})",
            chars, MAX_TOPIC_CHARS
        )));
    }
    let has_word = topic
        .split_whitespace()
        .any(|word| word.chars().filter(|c| c.is_alphabetic()).count() >= 2);
    if !has_word {
        return Err(ResearchError::Input(
            "Topic must contain at least one word".to_string(),
        ));
    }
    Ok(topic.to_string())
}

/// Forms hypotheses for a topic
pub struct HypothesisFormer<L> {
    llm: Arc<L>,
    config: ResearchConfig,
}

impl<L> HypothesisFormer<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
{
    /// Create a new former
    pub fn new(llm: Arc<L>, config: ResearchConfig) -> Self {
        Self { llm, config }
    }

    /// Form hypotheses for `topic`
    pub async fn form(&self, topic: &str) -> Result<Vec<Hypothesis>, ResearchError> {
        let topic = validate_topic(topic)?;
        let count = self
            .config
            .hypothesis_count
            .clamp(MIN_HYPOTHESES, MAX_HYPOTHESES);

        info!("Forming {} hypotheses for topic '{}'", count, topic);

        let response = reason(
            &self.llm,
            &self.config.retry,
            "hypothesis formation",
            hypothesis_prompt(&topic, count),
            HYPOTHESIS_SCHEMA,
        )
        .await?;
        debug!("Former response length: {} chars", response.len());

        let candidates = dedupe(parse_hypotheses(&response)?);
        if candidates.len() < MIN_HYPOTHESES {
            return Err(ResearchError::InvalidFormat(format!(
                "Reasoner produced {} valid hypotheses, need at least {}",
                candidates.len(),
                MIN_HYPOTHESES
            )));
        }

        let selected = select_diverse(candidates, count);
        let has = |stance: Stance| selected.iter().any(|c| c.stance == stance);
        if !has(Stance::Supportive) || !has(Stance::Critical) {
            return Err(ResearchError::InvalidFormat(
                "Hypotheses must include at least one supportive and one critical stance"
                    .to_string(),
            ));
        }

        let hypotheses: Vec<Hypothesis> = selected
            .into_iter()
            .enumerate()
            .map(|(idx, c)| {
                Hypothesis::new(HypothesisId(idx as u32 + 1), c.statement, c.stance, c.prior)
                    .with_reasoning(c.reasoning)
            })
            .collect();

        info!("Formed {} hypotheses", hypotheses.len());
        Ok(hypotheses)
    }
}

fn dedupe(candidates: Vec<HypothesisCandidate>) -> Vec<HypothesisCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.statement.to_lowercase());
            if !fresh {
                warn!("Dropping duplicate hypothesis '{}'", c.statement);
            }
            fresh
        })
        .collect()
}

/// Keep the first `count` candidates, swapping in a missing stance if truncation dropped it
fn select_diverse(candidates: Vec<HypothesisCandidate>, count: usize) -> Vec<HypothesisCandidate> {
    let (mut kept, rest): (Vec<_>, Vec<_>) = {
        let mut iter = candidates.into_iter();
        let kept: Vec<_> = iter.by_ref().take(count).collect();
        (kept, iter.collect::<Vec<_>>())
    };

    for stance in [Stance::Supportive, Stance::Critical] {
        if kept.iter().any(|c| c.stance == stance) {
            continue;
        }
        let Some(extra) = rest.iter().find(|c| c.stance == stance) else {
            continue;
        };
        if let Some(last) = kept.iter().rposition(|c| c.stance != stance) {
            debug!("Swapping in '{}' for stance diversity", extra.statement);
            kept[last] = extra.clone();
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use scrivener_llm::MockProvider;

    fn config() -> ResearchConfig {
        ResearchConfig {
            hypothesis_count: 4,
            retry: RetryPolicy {
                call_timeout_secs: 5,
                max_attempts: 2,
                backoff_base_ms: 1,
            },
            ..ResearchConfig::default()
        }
    }

    const FIVE: &str = r#"[
        {"statement": "A is true", "stance": "supportive", "prior": 0.7},
        {"statement": "B is true", "stance": "supportive", "prior": 0.6},
        {"statement": "C is true", "stance": "supportive", "prior": 0.6},
        {"statement": "D is true", "stance": "supportive", "prior": 0.5},
        {"statement": "A is false", "stance": "critical", "prior": 0.3}
    ]"#;

    #[test]
    fn test_validate_topic() {
        assert!(validate_topic("   ").is_err());
        assert!(validate_topic("short").is_err());
        assert!(validate_topic(&"x".repeat(501)).is_err());
        assert!(validate_topic("1234567890 !!").is_err());
        assert_eq!(
            validate_topic("  Is Rust memory safe?  ").unwrap(),
            "Is Rust memory safe?"
        );
    }

    #[tokio::test]
    async fn test_form_assigns_ids_and_keeps_diversity() {
        let llm = Arc::new(MockProvider::new(FIVE));
        let former = HypothesisFormer::new(llm, config());

        let hypotheses = former.form("Is Rust memory safe in practice?").await.unwrap();
        assert_eq!(hypotheses.len(), 4);
        assert_eq!(hypotheses[0].id, HypothesisId(1));
        assert_eq!(hypotheses[3].id, HypothesisId(4));
        // The only critical hypothesis was fifth; it replaces the last supportive one
        assert_eq!(hypotheses[3].statement, "A is false");
        assert_eq!(hypotheses[0].initial_certitude, 0.7);
    }

    #[tokio::test]
    async fn test_form_rejects_too_few() {
        let llm = Arc::new(MockProvider::new(
            r#"[{"statement": "A", "stance": "supportive", "prior": 0.5},
                {"statement": "a", "stance": "critical", "prior": 0.5}]"#,
        ));
        let former = HypothesisFormer::new(llm, config());
        assert!(matches!(
            former.form("Is Rust memory safe in practice?").await,
            Err(ResearchError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_form_requires_both_stances() {
        let llm = Arc::new(MockProvider::new(
            r#"[{"statement": "A", "stance": "supportive", "prior": 0.5},
                {"statement": "B", "stance": "supportive", "prior": 0.5},
                {"statement": "C", "stance": "supportive", "prior": 0.5}]"#,
        ));
        let former = HypothesisFormer::new(llm, config());
        assert!(former.form("Is Rust memory safe in practice?").await.is_err());
    }

    #[tokio::test]
    async fn test_form_rejects_bad_topic_without_calling_reasoner() {
        let llm = Arc::new(MockProvider::new(FIVE));
        let former = HypothesisFormer::new(Arc::clone(&llm), config());
        assert!(matches!(former.form("tiny").await, Err(ResearchError::Input(_))));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_form_retries_transient_failure() {
        let llm = Arc::new(MockProvider::new(FIVE));
        llm.fail_next(1);
        let former = HypothesisFormer::new(Arc::clone(&llm), config());
        assert!(former.form("Is Rust memory safe in practice?").await.is_ok());
        assert_eq!(llm.call_count(), 2);
    }
}
