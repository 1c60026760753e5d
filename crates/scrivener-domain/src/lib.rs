//! Scrivener Domain Layer
//!
//! This crate contains the core domain model for Scrivener, a hypothesis-driven
//! research and citation-verification pipeline. It defines the value objects,
//! the certitude formula, the stage state machine and the trait interfaces that
//! every other layer depends upon.
//!
//! ## Key Concepts
//!
//! - **Hypothesis**: a candidate answer to the research topic, with a certitude in [0, 1]
//! - **Evidence**: a quote fetched from a source, classified as buttressing or falsifying
//! - **Citation**: a claim in a draft traced back to exactly one evidence item
//! - **Draft**: a versioned markdown report with inline `[n]` citation markers
//! - **Session**: one research run, persisted as an append-only log of stage artifacts
//!
//! ## Architecture
//!
//! - No I/O: pure domain logic only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for every external collaborator (reasoner, search, fetch, store)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod certitude;
pub mod certitude_computation;
pub mod citation;
pub mod error;
pub mod evidence;
pub mod hypothesis;
pub mod ids;
pub mod report;
pub mod session;
pub mod traits;

// Re-exports for convenience
pub use artifact::{Artifact, ArtifactKey, ArtifactKind, EvidenceBatch, StoredArtifact};
pub use certitude::{CertitudeBand, CertitudeThresholds};
pub use citation::{Citation, Draft, DraftSection, Sentence, VerificationStatus};
pub use error::{DomainError, PipelineError};
pub use evidence::{EvidenceItem, QueryIntent, SearchQuery, Verdict};
pub use hypothesis::{CertitudeUpdate, Hypothesis, HypothesisStatus, Stance};
pub use ids::{CitationId, EvidenceId, HypothesisId, SessionId};
pub use report::{
    CitationVerdict, Critique, CritiqueNote, FinalReport, RevisionAction, RevisionRecord,
    RevisionStrategy, UnresolvedClaim, VerificationReport,
};
pub use session::{Session, SessionStatus, Stage, TranscriptEntry};
pub use traits::SearchHit;

/// Current Unix time in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
