//! Research and resume command implementations.

use super::parse_session_id;
use crate::cli::{ResearchArgs, ResumeArgs};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider, SessionStore};
use scrivener_domain::{SessionId, SessionStatus};
use scrivener_pipeline::ResearchService;
use scrivener_research::ResearchConfig;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execute the research command.
///
/// Submits the topic, waits for the session to end and renders its report.
/// Ctrl-C cancels the session at its next stage boundary.
pub async fn execute_research<L, S, F, St>(
    args: ResearchArgs,
    service: Arc<ResearchService<L, S, F, St>>,
    defaults: &ResearchConfig,
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
    let config = args.research_config(defaults);
    let id = service.submit_research(&args.topic, Some(config))?;
    eprintln!("{}", formatter.info(&format!("Session {} started", id)));

    follow(service, id, args.output.as_deref(), formatter).await
}

/// Execute the resume command.
pub async fn execute_resume<L, S, F, St>(
    args: ResumeArgs,
    service: Arc<ResearchService<L, S, F, St>>,
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
    service.resume(id)?;
    eprintln!("{}", formatter.info(&format!("Session {} resumed", id)));

    follow(service, id, args.output.as_deref(), formatter).await
}

async fn follow<L, S, F, St>(
    service: Arc<ResearchService<L, S, F, St>>,
    id: SessionId,
    output: Option<&Path>,
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
    let finished = CancellationToken::new();
    let interrupt = {
        let service = Arc::clone(&service);
        let finished = finished.clone();
        tokio::spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        eprintln!("Cancelling after the current stage...");
                        let _ = service.cancel(id);
                    }
                }
                _ = finished.cancelled() => {}
            }
        })
    };
    let session = service.wait(id).await;
    finished.cancel();
    let _ = interrupt.await;
    let session = session?;

    match session.status {
        SessionStatus::Done | SessionStatus::DoneWithWarning => {
            let report = service.get_final_report(id)?;
            if let Some(path) = output {
                fs::write(path, &report.content)?;
                eprintln!("{}", formatter.success(&format!("Report written to {}", path.display())));
            }
            formatter.format_report(&report)
        }
        SessionStatus::Cancelled => Ok(formatter.warning(&format!(
            "Session {} cancelled after {}; continue with `scrivener resume {}`",
            id, session.current_stage, id
        ))),
        SessionStatus::Failed => Err(CliError::SessionFailed {
            id,
            reason: session.error.unwrap_or_else(|| "unknown error".to_string()),
        }),
        SessionStatus::Running => Err(CliError::InvalidInput(format!(
            "session {} is still running in another process",
            id
        ))),
    }
}
