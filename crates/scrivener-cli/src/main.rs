//! Scrivener CLI - research a topic into a cited, verified report.

use anyhow::Context;
use clap::Parser;
use scrivener_cli::commands;
use scrivener_cli::{Cli, CliError, Command, Config, Formatter};
use scrivener_llm::OllamaProvider;
use scrivener_pipeline::{PipelineConfig, ResearchService, SharedStore};
use scrivener_store::SqliteSessionStore;
use scrivener_web::{HttpFetcher, TavilySearch};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    if let Some(db) = cli.db {
        config.backend.database_path = Some(db);
    }
    if let Some(host) = cli.ollama_host {
        config.backend.ollama_endpoint = host;
    }
    if let Some(model) = cli.model {
        config.backend.model = model;
    }

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    if matches!(cli.command, Command::StyleGuides) {
        println!("{}", commands::execute_style_guides(&formatter)?);
        return Ok(());
    }

    let needs_search = matches!(cli.command, Command::Research(_) | Command::Resume(_));
    let tavily_key = match cli.tavily_key {
        Some(key) => key,
        None if needs_search => {
            return Err(CliError::Config(
                "a Tavily API key is required (--tavily-key or TAVILY_API_KEY)".into(),
            )
            .into())
        }
        None => String::new(),
    };

    let database_path = config.database_path()?;
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = SqliteSessionStore::new(&database_path)
        .with_context(|| format!("opening {}", database_path.display()))?;

    let llm = OllamaProvider::new(config.backend.ollama_endpoint.clone(), config.backend.model.clone())
        .with_timeout(config.research.retry.call_timeout())
        .with_max_retries(1);
    let service = Arc::new(ResearchService::new(
        Arc::new(llm),
        Arc::new(TavilySearch::new(tavily_key)),
        Arc::new(HttpFetcher::new(config.backend.fetcher.clone())),
        SharedStore::new(store),
        PipelineConfig {
            max_active_sessions: 1,
            resume_interrupted: false,
            research: config.research.clone(),
        },
    ));

    let output = match cli.command {
        Command::Research(args) => {
            commands::execute_research(args, service, &config.research, &formatter).await?
        }
        Command::Resume(args) => commands::execute_resume(args, service, &formatter).await?,
        Command::Status(args) => commands::execute_status(args, service.as_ref(), &formatter)?,
        Command::Report(args) => commands::execute_report(args, service.as_ref(), &formatter)?,
        Command::Sessions(args) => commands::execute_sessions(args, service.as_ref(), &formatter)?,
        Command::StyleGuides => commands::execute_style_guides(&formatter)?,
    };

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
