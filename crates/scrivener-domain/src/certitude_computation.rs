//! Certitude computation
//!
//! Implements the deterministic formula that turns classified evidence into a
//! hypothesis certitude:
//!
//! ```text
//! B = Σ weight over buttressing items      F = Σ weight over falsifying items
//! B + F = 0  →  certitude 0.5 (uncertain)
//! c    = 1 - exp(-(B + F) / evidence_scale)
//! vote = B / (B + F)
//! certitude = prior + (vote - prior) · c
//! B = 0, F > 0  →  certitude = min(certitude, falsified_below · (1 - c))
//! ```
//!
//! `c` is the strength of the evidence: with little evidence the prior
//! dominates, with a lot the vote does. Neutral evidence carries no weight.

use crate::{CertitudeBand, CertitudeThresholds, EvidenceItem, Verdict};
use serde::{Deserialize, Serialize};

/// Evidence mass at which strength reaches 1 - 1/e (default: 1.0)
pub const EVIDENCE_SCALE: f64 = 1.0;

/// Certitude assigned when no decisive evidence exists
pub const NO_EVIDENCE_CERTITUDE: f64 = 0.5;

/// Floor applied to each source weight so decisive evidence always counts
pub const MIN_SOURCE_WEIGHT: f64 = 0.01;

/// Configuration for certitude computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CertitudeConfig {
    /// Evidence mass scale (larger needs more evidence to move off the prior)
    pub evidence_scale: f64,
    /// Band boundaries
    pub thresholds: CertitudeThresholds,
}

impl Default for CertitudeConfig {
    fn default() -> Self {
        Self {
            evidence_scale: EVIDENCE_SCALE,
            thresholds: CertitudeThresholds::default(),
        }
    }
}

impl CertitudeConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.evidence_scale > 0.0) {
            return Err("evidence_scale must be greater than 0".to_string());
        }
        self.thresholds.validate()
    }
}

/// Outcome of aggregating one hypothesis' evidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CertitudeOutcome {
    /// New certitude in [0, 1]
    pub certitude: f64,
    /// Band of the new certitude
    pub band: CertitudeBand,
    /// Sum of buttressing weights
    pub buttress_weight: f64,
    /// Sum of falsifying weights
    pub falsify_weight: f64,
}

/// Sum buttressing and falsifying weights
///
/// Weights are clamped to `[MIN_SOURCE_WEIGHT, 1]`; neutral items are ignored.
pub fn aggregate_weights(evidence: &[EvidenceItem]) -> (f64, f64) {
    evidence.iter().fold((0.0, 0.0), |(b, f), item| {
        let w = clamp_weight(item.source_quality_weight);
        match item.verdict {
            Verdict::Buttress => (b + w, f),
            Verdict::Falsify => (b, f + w),
            Verdict::Neutral => (b, f),
        }
    })
}

/// Compute the certitude for a hypothesis with the given prior and evidence
pub fn compute_certitude(
    prior: f64,
    evidence: &[EvidenceItem],
    config: &CertitudeConfig,
) -> CertitudeOutcome {
    let (buttress_weight, falsify_weight) = aggregate_weights(evidence);
    let certitude = certitude_from_weights(prior, buttress_weight, falsify_weight, config);

    CertitudeOutcome {
        certitude,
        band: config.thresholds.band(certitude),
        buttress_weight,
        falsify_weight,
    }
}

/// The formula itself, on pre-aggregated weights
pub fn certitude_from_weights(
    prior: f64,
    buttress: f64,
    falsify: f64,
    config: &CertitudeConfig,
) -> f64 {
    let total = buttress + falsify;
    if total <= 0.0 {
        return NO_EVIDENCE_CERTITUDE;
    }

    let prior = prior.clamp(0.0, 1.0);
    let strength = 1.0 - (-total / config.evidence_scale).exp();
    let vote = buttress / total;
    let mut certitude = prior + (vote - prior) * strength;

    // Only counter-evidence: always lands in the falsified band
    if buttress <= 0.0 && falsify > 0.0 {
        certitude = certitude.min(config.thresholds.falsified_below * (1.0 - strength));
    }

    certitude.clamp(0.0, 1.0)
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.clamp(MIN_SOURCE_WEIGHT, 1.0)
    } else {
        MIN_SOURCE_WEIGHT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvidenceId, HypothesisId, QueryIntent};

    fn item(verdict: Verdict, weight: f64) -> EvidenceItem {
        EvidenceItem {
            id: EvidenceId::new(),
            hypothesis_id: HypothesisId(1),
            source_url: "https://example.org/a".to_string(),
            title: String::new(),
            fetched_quote: "quote".to_string(),
            claim: "claim".to_string(),
            verdict,
            source_quality_weight: weight,
            query: "q".to_string(),
            intent: QueryIntent::Confirm,
            collected_at: 0,
        }
    }

    #[test]
    fn test_no_evidence_is_uncertain() {
        let config = CertitudeConfig::default();
        let outcome = compute_certitude(0.9, &[], &config);
        assert_eq!(outcome.certitude, 0.5);
        assert_eq!(outcome.band, CertitudeBand::Uncertain);
    }

    #[test]
    fn test_neutral_evidence_is_ignored() {
        let config = CertitudeConfig::default();
        let evidence = vec![item(Verdict::Neutral, 1.0), item(Verdict::Neutral, 1.0)];
        let outcome = compute_certitude(0.7, &evidence, &config);
        assert_eq!(outcome.certitude, 0.5);
        assert_eq!(outcome.buttress_weight, 0.0);
    }

    #[test]
    fn test_single_falsifier_falsifies() {
        let config = CertitudeConfig::default();
        let evidence = vec![item(Verdict::Falsify, 0.25)];
        let outcome = compute_certitude(0.95, &evidence, &config);
        assert!(outcome.certitude < 0.3, "got {}", outcome.certitude);
        assert_eq!(outcome.band, CertitudeBand::Falsified);
    }

    #[test]
    fn test_eight_buttressing_items_well_supported() {
        let config = CertitudeConfig::default();
        let evidence: Vec<_> = (0..8).map(|_| item(Verdict::Buttress, 0.5)).collect();
        let outcome = compute_certitude(0.5, &evidence, &config);
        // B = 4.0, strength = 1 - e^-4 ≈ 0.982, certitude ≈ 0.991
        assert!(outcome.certitude >= 0.9, "got {}", outcome.certitude);
        assert_eq!(outcome.band, CertitudeBand::WellSupported);
    }

    #[test]
    fn test_weak_evidence_stays_near_prior() {
        let config = CertitudeConfig::default();
        let evidence = vec![item(Verdict::Buttress, 0.1)];
        let outcome = compute_certitude(0.4, &evidence, &config);
        // strength ≈ 0.095; certitude ≈ 0.4 + 0.6 * 0.095
        assert!((outcome.certitude - 0.457).abs() < 0.01);
    }

    #[test]
    fn test_mixed_evidence_moves_towards_vote() {
        let config = CertitudeConfig::default();
        let evidence = vec![
            item(Verdict::Buttress, 1.0),
            item(Verdict::Buttress, 1.0),
            item(Verdict::Buttress, 1.0),
            item(Verdict::Falsify, 1.0),
        ];
        let outcome = compute_certitude(0.5, &evidence, &config);
        // vote = 0.75, strength ≈ 0.982
        assert!((outcome.certitude - 0.745).abs() < 0.01);
        assert_eq!(outcome.band, CertitudeBand::Likely);
    }

    #[test]
    fn test_zero_weight_still_counts() {
        let config = CertitudeConfig::default();
        let evidence = vec![item(Verdict::Falsify, 0.0)];
        let outcome = compute_certitude(0.5, &evidence, &config);
        assert!(outcome.certitude < 0.3);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let config = CertitudeConfig {
            evidence_scale: 0.0,
            ..CertitudeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: certitude always lands in [0, 1]
        #[test]
        fn test_certitude_range(
            prior in 0.0f64..=1.0,
            buttress in 0.0f64..20.0,
            falsify in 0.0f64..20.0,
        ) {
            let c = certitude_from_weights(prior, buttress, falsify, &CertitudeConfig::default());
            prop_assert!((0.0..=1.0).contains(&c));
        }

        /// Property: only falsifying evidence always falsifies
        #[test]
        fn test_only_falsifiers_falsify(prior in 0.0f64..=1.0, falsify in 0.01f64..20.0) {
            let config = CertitudeConfig::default();
            let c = certitude_from_weights(prior, 0.0, falsify, &config);
            prop_assert!(c < config.thresholds.falsified_below);
        }

        /// Property: more buttressing evidence never lowers certitude
        #[test]
        fn test_buttress_monotonic(
            prior in 0.0f64..=1.0,
            buttress in 0.0f64..10.0,
            extra in 0.0f64..10.0,
            falsify in 0.0f64..10.0,
        ) {
            let config = CertitudeConfig::default();
            let before = certitude_from_weights(prior, buttress, falsify, &config);
            let after = certitude_from_weights(prior, buttress + extra, falsify, &config);
            // The no-evidence case resets to 0.5 and is excluded
            prop_assume!(buttress + falsify > 0.0);
            prop_assert!(after + 1e-9 >= before, "{} -> {}", before, after);
        }
    }
}
