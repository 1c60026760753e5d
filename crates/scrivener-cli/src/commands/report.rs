//! Report command implementation.

use super::parse_session_id;
use crate::cli::ReportArgs;
use crate::error::Result;
use crate::output::Formatter;
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider, SessionStore};
use scrivener_pipeline::ResearchService;
use std::fmt::Display;
use std::fs;

/// Execute the report command.
pub fn execute_report<L, S, F, St>(
    args: ReportArgs,
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
    let report = service.get_final_report(id)?;

    if let Some(path) = &args.output {
        fs::write(path, &report.content)?;
        eprintln!("{}", formatter.success(&format!("Report written to {}", path.display())));
    }
    formatter.format_report(&report)
}
