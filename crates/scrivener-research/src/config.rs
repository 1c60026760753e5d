//! Configuration for the research stages

use scrivener_domain::certitude_computation::CertitudeConfig;
pub use scrivener_domain::RevisionStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tone applied by the style finalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleGuide {
    /// Precise, neutral, jargon allowed
    #[default]
    Technical,
    /// Plain language for a general reader
    Conversational,
    /// Formal register with measured qualifiers
    Academic,
}

impl StyleGuide {
    /// Every guide, in listing order
    pub const ALL: [StyleGuide; 3] = [
        StyleGuide::Technical,
        StyleGuide::Conversational,
        StyleGuide::Academic,
    ];

    /// Get the guide name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleGuide::Technical => "technical",
            StyleGuide::Conversational => "conversational",
            StyleGuide::Academic => "academic",
        }
    }

    /// Parse a guide name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "technical" => Some(StyleGuide::Technical),
            "conversational" => Some(StyleGuide::Conversational),
            "academic" => Some(StyleGuide::Academic),
            _ => None,
        }
    }

    /// Who the guide writes for
    pub fn audience(&self) -> &'static str {
        match self {
            StyleGuide::Technical => "engineers and developers",
            StyleGuide::Conversational => "general audience",
            StyleGuide::Academic => "research and formal publications",
        }
    }

    /// One-line description for listings
    pub fn description(&self) -> &'static str {
        match self {
            StyleGuide::Technical => {
                "For engineers and developers. Technical jargon, precise specifications."
            }
            StyleGuide::Conversational => {
                "For general audience. Friendly, simple language with analogies."
            }
            StyleGuide::Academic => {
                "For research and formal publications. Scholarly rigor, evidence-based."
            }
        }
    }
}

/// A style guide as listed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleGuideInfo {
    /// Guide name, as accepted in a session config
    pub name: String,
    /// Who the guide writes for
    pub audience: String,
    /// One-line description
    pub description: String,
}

impl From<StyleGuide> for StyleGuideInfo {
    fn from(guide: StyleGuide) -> Self {
        Self {
            name: guide.as_str().to_string(),
            audience: guide.audience().to_string(),
            description: guide.description().to_string(),
        }
    }
}

/// All style guides, in listing order
pub fn style_guides() -> Vec<StyleGuideInfo> {
    StyleGuide::ALL.into_iter().map(StyleGuideInfo::from).collect()
}

/// Retry and deadline policy for every collaborator call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Deadline for a single attempt (seconds)
    pub call_timeout_secs: u64,
    /// Attempts before the call is recorded as failed
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts (milliseconds)
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    /// Get the per-attempt deadline as a Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            call_timeout_secs: 120,
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Configuration for the research stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Hypotheses requested from the former (3 to 5)
    pub hypothesis_count: usize,

    /// Queries planned per hypothesis (clamped to 1..=3)
    pub queries_per_hypothesis: usize,

    /// Parallel evidence workers
    pub worker_count: usize,

    /// Evidence items cited per included hypothesis
    pub max_citations_per_hypothesis: usize,

    /// Parallel citation checks
    pub verification_concurrency: usize,

    /// Characters of fetched content shown to the claim-support check
    pub max_content_chars: usize,

    /// Confidence required for a verified verdict
    pub min_support_confidence: f64,

    /// Verification rate required to finish without warning
    pub verification_threshold: f64,

    /// Revise-and-reverify rounds allowed
    pub max_iterations: u32,

    /// Search hits tried when looking for a replacement source
    pub max_replacement_candidates: usize,

    /// Strategies tried for each unverified citation, in order
    pub revision_order: Vec<RevisionStrategy>,

    /// Tone for the final report
    pub style: StyleGuide,

    /// Certitude formula parameters
    pub certitude: CertitudeConfig,

    /// Collaborator call policy
    pub retry: RetryPolicy,
}

impl ResearchConfig {
    /// Queries per hypothesis after clamping
    pub fn effective_queries_per_hypothesis(&self) -> usize {
        self.queries_per_hypothesis.clamp(1, 3)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(3..=5).contains(&self.hypothesis_count) {
            return Err("hypothesis_count must be between 3 and 5".to_string());
        }
        if !(1..=10).contains(&self.worker_count) {
            return Err("worker_count must be between 1 and 10".to_string());
        }
        if !(1..=5).contains(&self.max_iterations) {
            return Err("max_iterations must be between 1 and 5".to_string());
        }
        if self.queries_per_hypothesis == 0 {
            return Err("queries_per_hypothesis must be greater than 0".to_string());
        }
        if self.max_citations_per_hypothesis == 0 {
            return Err("max_citations_per_hypothesis must be greater than 0".to_string());
        }
        if self.verification_concurrency == 0 {
            return Err("verification_concurrency must be greater than 0".to_string());
        }
        if self.max_content_chars == 0 {
            return Err("max_content_chars must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_support_confidence) {
            return Err("min_support_confidence must be between 0.0 and 1.0".to_string());
        }
        if !(self.verification_threshold > 0.0 && self.verification_threshold <= 1.0) {
            return Err("verification_threshold must be in (0.0, 1.0]".to_string());
        }
        if self.revision_order.is_empty() {
            return Err("revision_order must name at least one strategy".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be greater than 0".to_string());
        }
        if self.retry.call_timeout_secs == 0 {
            return Err("retry.call_timeout_secs must be greater than 0".to_string());
        }
        self.certitude.validate()
    }
}

impl Default for ResearchConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            hypothesis_count: 4,
            queries_per_hypothesis: 3,
            worker_count: 5,
            max_citations_per_hypothesis: 4,
            verification_concurrency: 8,
            max_content_chars: 4000,
            min_support_confidence: 0.7,
            verification_threshold: 0.90,
            max_iterations: 3,
            max_replacement_candidates: 3,
            revision_order: vec![
                RevisionStrategy::Replace,
                RevisionStrategy::Hedge,
                RevisionStrategy::Remove,
            ],
            style: StyleGuide::Technical,
            certitude: CertitudeConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ResearchConfig {
    /// Aggressive preset: fewer queries, shorter deadlines, one revision round
    pub fn aggressive() -> Self {
        Self {
            hypothesis_count: 3,
            queries_per_hypothesis: 2,
            worker_count: 10,
            max_citations_per_hypothesis: 3,
            verification_concurrency: 16,
            max_iterations: 1,
            max_replacement_candidates: 2,
            retry: RetryPolicy {
                call_timeout_secs: 60,
                max_attempts: 2,
                backoff_base_ms: 250,
            },
            ..Self::default()
        }
    }

    /// Lenient preset: more hypotheses, longer deadlines, more revision rounds
    pub fn lenient() -> Self {
        Self {
            hypothesis_count: 5,
            worker_count: 3,
            max_citations_per_hypothesis: 6,
            verification_concurrency: 4,
            max_content_chars: 8000,
            max_iterations: 5,
            max_replacement_candidates: 5,
            retry: RetryPolicy {
                call_timeout_secs: 300,
                max_attempts: 4,
                backoff_base_ms: 1000,
            },
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ResearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_aggressive_config_is_valid() {
        assert!(ResearchConfig::aggressive().validate().is_ok());
    }

    #[test]
    fn test_lenient_config_is_valid() {
        assert!(ResearchConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_worker_count_bounds() {
        let mut config = ResearchConfig::default();
        config.worker_count = 0;
        assert!(config.validate().is_err());
        config.worker_count = 11;
        assert!(config.validate().is_err());
        config.worker_count = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_iterations_bounds() {
        let mut config = ResearchConfig::default();
        config.max_iterations = 0;
        assert!(config.validate().is_err());
        config.max_iterations = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_queries_are_clamped() {
        let mut config = ResearchConfig::default();
        config.queries_per_hypothesis = 7;
        assert_eq!(config.effective_queries_per_hypothesis(), 3);
        config.queries_per_hypothesis = 1;
        assert_eq!(config.effective_queries_per_hypothesis(), 1);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let policy = RetryPolicy {
            call_timeout_secs: 1,
            max_attempts: 4,
            backoff_base_ms: 100,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_style_guide_parse() {
        assert_eq!(StyleGuide::parse("Academic"), Some(StyleGuide::Academic));
        assert_eq!(StyleGuide::parse("pirate"), None);
    }

    #[test]
    fn test_style_guide_listing() {
        let guides = style_guides();
        let names: Vec<&str> = guides.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["technical", "conversational", "academic"]);
        for guide in &guides {
            assert!(StyleGuide::parse(&guide.name).is_some());
            assert!(guide.description.starts_with(&format!("For {}.", guide.audience)));
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ResearchConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        let parsed = ResearchConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.worker_count, parsed.worker_count);
        assert_eq!(config.max_iterations, parsed.max_iterations);
        assert_eq!(config.revision_order, parsed.revision_order);
        assert_eq!(config.style, parsed.style);
    }
}
