//! Sessions command implementation.

use crate::cli::SessionsArgs;
use crate::error::Result;
use crate::output::Formatter;
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider, SessionStore};
use scrivener_pipeline::ResearchService;
use std::fmt::Display;

/// Execute the sessions command.
pub fn execute_sessions<L, S, F, St>(
    args: SessionsArgs,
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
    let mut sessions = service.list_sessions()?;
    sessions.truncate(args.limit);
    formatter.format_sessions(&sessions)
}
