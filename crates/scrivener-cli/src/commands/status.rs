//! Status command implementation.

use super::parse_session_id;
use crate::cli::SessionArgs;
use crate::error::Result;
use crate::output::Formatter;
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider, SessionStore};
use scrivener_pipeline::ResearchService;
use std::fmt::Display;

/// Execute the status command.
pub fn execute_status<L, S, F, St>(
    args: SessionArgs,
    service: &ResearchService<L, S, F, St>,
    formatter: &Formatter,
) -> Result<String>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
    St: SessionStore + Send + 'static,
    St::Error: Display,
{
    let id = parse_session_id(&args.id)?;
    let view = service.get_session_status(id)?;
    formatter.format_status(&view)
}
