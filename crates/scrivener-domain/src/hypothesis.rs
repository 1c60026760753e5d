//! Hypothesis module - candidate answers to a research topic

use crate::{CertitudeBand, DomainError, HypothesisId};
use serde::{Deserialize, Serialize};

/// The angle a hypothesis takes on the topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// Argues the favourable reading of the topic
    Supportive,
    /// Argues against, or for the risks and limits
    Critical,
}

impl Stance {
    /// Get the stance name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Supportive => "supportive",
            Stance::Critical => "critical",
        }
    }

    /// Parse a stance from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "supportive" | "support" | "pro" | "positive" => Some(Stance::Supportive),
            "critical" | "against" | "contra" | "negative" | "skeptical" => Some(Stance::Critical),
            _ => None,
        }
    }
}

/// Lifecycle of a hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    /// Formed, no evidence yet
    Proposed,
    /// Evidence gathered and being weighed
    Tested,
    /// Certitude landed in the likely or well-supported band
    Supported,
    /// Certitude landed below the falsification threshold
    Falsified,
    /// Certitude stayed in the uncertain band
    Uncertain,
}

impl HypothesisStatus {
    /// Final status for a certitude band
    pub fn from_band(band: CertitudeBand) -> Self {
        match band {
            CertitudeBand::Falsified => HypothesisStatus::Falsified,
            CertitudeBand::Uncertain => HypothesisStatus::Uncertain,
            CertitudeBand::Likely | CertitudeBand::WellSupported => HypothesisStatus::Supported,
        }
    }
}

/// A candidate answer with a certitude in [0, 1]
///
/// Certitude only changes through [`Hypothesis::apply_certitude`], which the
/// certitude updater calls with the aggregated evidence result. Once a draft
/// references the hypothesis it is frozen and further updates are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Identifier within the session
    pub id: HypothesisId,

    /// The hypothesis statement
    pub statement: String,

    /// Supportive or critical angle
    pub stance: Stance,

    /// Why the former proposed it
    #[serde(default)]
    pub reasoning: String,

    /// Prior certitude before any evidence
    pub initial_certitude: f64,

    /// Certitude after the latest evidence aggregation
    pub current_certitude: f64,

    /// Lifecycle status
    pub status: HypothesisStatus,

    /// Set once a draft references this hypothesis
    #[serde(default)]
    pub frozen: bool,
}

impl Hypothesis {
    /// Create a proposed hypothesis; the prior is clamped to [0, 1]
    pub fn new(
        id: HypothesisId,
        statement: impl Into<String>,
        stance: Stance,
        initial_certitude: f64,
    ) -> Self {
        let prior = if initial_certitude.is_finite() {
            initial_certitude.clamp(0.0, 1.0)
        } else {
            0.5
        };
        Self {
            id,
            statement: statement.into(),
            stance,
            reasoning: String::new(),
            initial_certitude: prior,
            current_certitude: prior,
            status: HypothesisStatus::Proposed,
            frozen: false,
        }
    }

    /// Attach the former's reasoning
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Mark the hypothesis as under test
    pub fn mark_tested(&mut self) -> Result<(), DomainError> {
        if self.frozen {
            return Err(DomainError::FrozenHypothesis(self.id));
        }
        self.status = HypothesisStatus::Tested;
        Ok(())
    }

    /// Record a new certitude and the status derived from its band
    pub fn apply_certitude(
        &mut self,
        certitude: f64,
        band: CertitudeBand,
    ) -> Result<(), DomainError> {
        if self.frozen {
            return Err(DomainError::FrozenHypothesis(self.id));
        }
        if !(0.0..=1.0).contains(&certitude) {
            return Err(DomainError::InvalidValue(format!(
                "certitude {} outside [0, 1]",
                certitude
            )));
        }
        self.current_certitude = certitude;
        self.status = HypothesisStatus::from_band(band);
        Ok(())
    }

    /// Freeze the hypothesis once a draft references it
    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}

/// Result of aggregating evidence for one hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertitudeUpdate {
    /// Hypothesis the update applies to
    pub hypothesis_id: HypothesisId,
    /// Certitude before the update
    pub previous: f64,
    /// Certitude after the update
    pub certitude: f64,
    /// Band of the new certitude
    pub band: CertitudeBand,
    /// Sum of buttressing source weights
    pub buttress_weight: f64,
    /// Sum of falsifying source weights
    pub falsify_weight: f64,
    /// Number of evidence items considered (neutral included)
    pub evidence_count: usize,
}
