//! Scrivener Pipeline
//!
//! Session orchestration for research runs: stage sequencing, persistence,
//! resume and cancellation.
//!
//! # Overview
//!
//! The [`Orchestrator`] drives one session through the research stages,
//! writing each stage's artifacts once its parallel work has resolved. The
//! artifact log in the session store is the source of truth; a run always
//! starts by replaying it into a [`SessionState`], so a resumed session
//! continues at the first stage it never completed.
//!
//! The [`ResearchService`] is the outward face: it validates submissions,
//! runs each session as a background task and answers status, report,
//! resume and cancel requests.
//!
//! # Key Features
//!
//! - **Single writer**: only the orchestrator appends to the store; stage
//!   components hand their results back
//! - **Checked artifacts**: every artifact is validated against the replayed
//!   state before it is written, and again when the log is replayed
//! - **Cooperative cancellation**: checked at every stage boundary, never
//!   mid-stage
//! - **Bounded revision**: verify and revise repeat until the threshold is
//!   met or the iteration cap is reached
//!
//! # Example Usage
//!
//! ```no_run
//! use scrivener_pipeline::{Orchestrator, SharedStore};
//! use scrivener_domain::{traits::SessionStore, unix_now, Session};
//! use scrivener_llm::MockProvider;
//! use scrivener_research::ResearchConfig;
//! use scrivener_store::SqliteSessionStore;
//! use scrivener_web::{MockFetcher, MockSearch};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = SqliteSessionStore::in_memory()?;
//! let session = Session::new("Do four-day weeks raise output?", unix_now());
//! store.create_session(&session)?;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(MockProvider::default()),
//!     Arc::new(MockSearch::default()),
//!     Arc::new(MockFetcher::new()),
//!     SharedStore::new(store),
//! );
//! let report = orchestrator.run(session.id, &ResearchConfig::default()).await?;
//! println!("{:.0}% of citations verified", report.verification_rate * 100.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod orchestrator;
mod service;
mod state;
mod store;

pub use config::PipelineConfig;
pub use error::ServiceError;
pub use orchestrator::{build_final_report, Orchestrator};
pub use service::{ResearchService, SessionStatusView};
pub use state::{ArtifactSummary, SessionState};
pub use store::SharedStore;
pub use tokio_util::sync::CancellationToken;
