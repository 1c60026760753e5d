//! Certitude updating from aggregated evidence

use crate::error::ResearchError;
use scrivener_domain::certitude_computation::{compute_certitude, CertitudeConfig};
use scrivener_domain::{CertitudeUpdate, EvidenceItem, Hypothesis, HypothesisId};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Applies the certitude formula to every hypothesis
#[derive(Debug, Clone, Copy, Default)]
pub struct CertitudeUpdater {
    config: CertitudeConfig,
}

impl CertitudeUpdater {
    /// Create an updater
    pub fn new(config: CertitudeConfig) -> Self {
        Self { config }
    }

    /// Update each hypothesis from its evidence, returning one update per hypothesis
    ///
    /// Hypotheses without evidence end up uncertain. Fails if any hypothesis is
    /// already frozen.
    pub fn update(
        &self,
        hypotheses: &mut [Hypothesis],
        evidence: &BTreeMap<HypothesisId, Vec<EvidenceItem>>,
    ) -> Result<Vec<CertitudeUpdate>, ResearchError> {
        let mut updates = Vec::with_capacity(hypotheses.len());

        for hypothesis in hypotheses.iter_mut() {
            let items = evidence
                .get(&hypothesis.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let previous = hypothesis.current_certitude;
            let outcome = compute_certitude(hypothesis.initial_certitude, items, &self.config);

            hypothesis.mark_tested()?;
            hypothesis.apply_certitude(outcome.certitude, outcome.band)?;

            debug!(
                "{}: B={:.2} F={:.2} -> {:.3} ({})",
                hypothesis.id,
                outcome.buttress_weight,
                outcome.falsify_weight,
                outcome.certitude,
                outcome.band.as_str()
            );

            updates.push(CertitudeUpdate {
                hypothesis_id: hypothesis.id,
                previous,
                certitude: outcome.certitude,
                band: outcome.band,
                buttress_weight: outcome.buttress_weight,
                falsify_weight: outcome.falsify_weight,
                evidence_count: items.len(),
            });
        }

        let included = updates.iter().filter(|u| u.band.is_included()).count();
        info!(
            "Updated certitude for {} hypotheses ({} included in the draft)",
            updates.len(),
            included
        );
        Ok(updates)
    }
}
