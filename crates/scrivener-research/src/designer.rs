//! Experiment design: a fixed search plan per hypothesis
//!
//! Planning is pure and deterministic. Query 1 always tries to falsify the
//! hypothesis, query 2 confirms it, query 3 takes a second falsification angle.

use scrivener_domain::{Hypothesis, QueryIntent, SearchQuery};

/// Longest statement text carried into a query (characters)
const MAX_STATEMENT_CHARS: usize = 200;

const QUERY_TEMPLATES: [(QueryIntent, &str); 3] = [
    (QueryIntent::Falsify, "evidence against"),
    (QueryIntent::Confirm, "evidence"),
    (QueryIntent::Falsify, "criticism limitations"),
];

/// Plans searches for hypotheses
#[derive(Debug, Clone, Copy)]
pub struct ExperimentDesigner {
    queries_per_hypothesis: usize,
}

impl ExperimentDesigner {
    /// Create a designer; the query count is clamped to 1..=3
    pub fn new(queries_per_hypothesis: usize) -> Self {
        Self {
            queries_per_hypothesis: queries_per_hypothesis.clamp(1, QUERY_TEMPLATES.len()),
        }
    }

    /// The search plan for all hypotheses, grouped by hypothesis in input order
    pub fn design(&self, hypotheses: &[Hypothesis]) -> Vec<SearchQuery> {
        hypotheses
            .iter()
            .flat_map(|h| self.queries_for(h))
            .collect()
    }

    /// The queries for one hypothesis
    pub fn queries_for(&self, hypothesis: &Hypothesis) -> Vec<SearchQuery> {
        let subject = query_subject(&hypothesis.statement);
        QUERY_TEMPLATES
            .iter()
            .take(self.queries_per_hypothesis)
            .map(|(intent, suffix)| SearchQuery {
                hypothesis_id: hypothesis.id,
                text: format!("{} {}", subject, suffix),
                intent: *intent,
            })
            .collect()
    }
}

impl Default for ExperimentDesigner {
    fn default() -> Self {
        Self::new(QUERY_TEMPLATES.len())
    }
}

fn query_subject(statement: &str) -> String {
    let trimmed = statement
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == '?' || c == '!');
    trimmed.chars().take(MAX_STATEMENT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_domain::{HypothesisId, Stance};

    fn hypotheses() -> Vec<Hypothesis> {
        vec![
            Hypothesis::new(HypothesisId(1), "Rust prevents memory bugs.", Stance::Supportive, 0.7),
            Hypothesis::new(HypothesisId(2), "Rust slows teams down", Stance::Critical, 0.4),
        ]
    }

    #[test]
    fn test_full_plan() {
        let plan = ExperimentDesigner::default().design(&hypotheses());
        assert_eq!(plan.len(), 6);
        assert_eq!(plan[0].text, "Rust prevents memory bugs evidence against");
        assert_eq!(plan[0].intent, QueryIntent::Falsify);
        assert_eq!(plan[1].intent, QueryIntent::Confirm);
        assert_eq!(plan[2].intent, QueryIntent::Falsify);
        assert_eq!(plan[3].hypothesis_id, HypothesisId(2));
    }

    #[test]
    fn test_every_hypothesis_gets_a_falsify_query() {
        for count in 0..=5 {
            let plan = ExperimentDesigner::new(count).design(&hypotheses());
            for h in hypotheses() {
                assert!(plan
                    .iter()
                    .any(|q| q.hypothesis_id == h.id && q.intent == QueryIntent::Falsify));
            }
        }
    }

    #[test]
    fn test_count_is_clamped() {
        assert_eq!(ExperimentDesigner::new(0).design(&hypotheses()).len(), 2);
        assert_eq!(ExperimentDesigner::new(9).design(&hypotheses()).len(), 6);
    }

    #[test]
    fn test_design_is_deterministic() {
        let designer = ExperimentDesigner::new(2);
        assert_eq!(designer.design(&hypotheses()), designer.design(&hypotheses()));
    }
}
