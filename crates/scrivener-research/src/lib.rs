//! Scrivener Research
//!
//! The reasoning stages of a research run: hypotheses, search plans, evidence,
//! certitude, drafting, citation verification, critique, revision and styling.
//!
//! # Overview
//!
//! Each stage is a component that takes the previous stage's artifacts and
//! returns its own. Components never touch the session store; the pipeline
//! orchestrator persists what they return once a stage's parallel work has
//! fully resolved.
//!
//! # Architecture
//!
//! ```text
//! topic → HypothesisFormer → ExperimentDesigner → EvidenceGatherer (pool)
//!       → CertitudeUpdater → Drafter → CitationVerifier (pool)
//!       → [Critic → RevisionController → CitationVerifier]* → StyleFinalizer
//! ```
//!
//! # Key Features
//!
//! - **Bounded pools**: gathering and verification run on a semaphore-capped
//!   `JoinSet`, one unit per hypothesis or citation
//! - **Finite calls**: every collaborator call runs on a blocking thread under
//!   a timeout with bounded retries
//! - **Three-layer verification**: reachability, content, then claim support
//!   with the quote checked against the fetched text
//! - **Pluggable revision**: a [`RevisionPolicy`] picks replace, hedge or
//!   remove for each unverified citation, reading the [`Critic`]'s advice
//!
//! # Example Usage
//!
//! ```no_run
//! use scrivener_research::{ExperimentDesigner, HypothesisFormer, ResearchConfig};
//! use scrivener_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = Arc::new(MockProvider::new("[]"));
//! let config = ResearchConfig::default();
//!
//! let former = HypothesisFormer::new(llm, config.clone());
//! let hypotheses = former.form("Are four-day work weeks productive?").await?;
//!
//! let plan = ExperimentDesigner::new(config.effective_queries_per_hypothesis())
//!     .design(&hypotheses);
//! println!("{} hypotheses, {} queries", hypotheses.len(), plan.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod certitude;
mod config;
mod critic;
mod designer;
mod drafter;
mod error;
mod former;
mod gatherer;
mod pool;
mod revision;
mod style;
mod verifier;

pub mod citations;
pub mod parser;
pub mod prompt;
pub mod quality;

pub use certitude::CertitudeUpdater;
pub use config::{style_guides, ResearchConfig, RetryPolicy, RevisionStrategy, StyleGuide, StyleGuideInfo};
pub use critic::Critic;
pub use designer::ExperimentDesigner;
pub use drafter::{plan_citations, CitationPlan, DraftOutcome, Drafter, PlannedSection};
pub use error::ResearchError;
pub use former::{
    validate_topic, HypothesisFormer, MAX_HYPOTHESES, MAX_TOPIC_CHARS, MIN_HYPOTHESES,
    MIN_TOPIC_CHARS,
};
pub use gatherer::{EvidenceGatherer, GatherOutcome};
pub use pool::{call_blocking, run_bounded, UnitOutcome};
pub use revision::{
    apply_revision, PreferenceOrderPolicy, RevisionController, RevisionOutcome,
    RevisionPolicy,
};
pub use style::{StyleFinalizer, StyleOutcome};
pub use verifier::{classify_support, verify_citation, CitationVerifier, VerifySettings};
