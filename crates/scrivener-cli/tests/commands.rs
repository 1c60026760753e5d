//! Command tests against mock collaborators and an on-disk session database

use clap::Parser;
use scrivener_cli::commands;
use scrivener_cli::config::OutputFormat;
use scrivener_cli::{Cli, CliError, Command, Formatter};
use scrivener_domain::SearchHit;
use scrivener_llm::MockProvider;
use scrivener_pipeline::{PipelineConfig, ResearchService, ServiceError, SharedStore};
use scrivener_research::{ResearchConfig, RetryPolicy};
use scrivener_store::SqliteSessionStore;
use scrivener_web::{MockFetcher, MockSearch};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const QUOTE: &str = "Output rose 13% for remote staff.";
const TOPIC: &str = "Does remote work change developer productivity?";

type Service = ResearchService<MockProvider, MockSearch, MockFetcher, SqliteSessionStore>;

fn defaults() -> ResearchConfig {
    ResearchConfig {
        hypothesis_count: 3,
        retry: RetryPolicy {
            call_timeout_secs: 5,
            max_attempts: 1,
            backoff_base_ms: 1,
        },
        ..ResearchConfig::default()
    }
}

fn reasoner() -> MockProvider {
    let llm = MockProvider::new("{}");
    llm.add_rule(
        "Check whether the source supports the claim.",
        format!(r#"{{"supported": true, "confidence": 0.9, "quote": "{}"}}"#, QUOTE),
    );
    llm.add_rule(
        "You are forming research hypotheses.",
        r#"[
          {"statement": "Remote work increases developer productivity.", "stance": "supportive", "prior": 0.6},
          {"statement": "Remote work harms team communication.", "stance": "critical", "prior": 0.5},
          {"statement": "Remote work lowers office costs.", "stance": "neutral", "prior": 0.5}
        ]"#,
    );
    llm.add_rule(
        "Hypothesis: Remote work increases developer productivity.",
        format!(r#"{{"verdict": "buttress", "quote": "{}"}}"#, QUOTE),
    );
    llm
}

fn service(db: &Path) -> Arc<Service> {
    let search = MockSearch::default();
    search.add_results(
        "Remote work increases developer productivity",
        vec![SearchHit {
            url: "https://www.bls.gov/remote".to_string(),
            title: "Remote work survey".to_string(),
            snippet: format!("Survey results. {}", QUOTE),
            date: None,
        }],
    );
    let fetcher = MockFetcher::new();
    fetcher.add_page("https://www.bls.gov/remote", format!("Survey. {} More.", QUOTE));

    Arc::new(ResearchService::new(
        Arc::new(reasoner()),
        Arc::new(search),
        Arc::new(fetcher),
        SharedStore::new(SqliteSessionStore::new(db).unwrap()),
        PipelineConfig {
            research: defaults(),
            ..PipelineConfig::default()
        },
    ))
}

fn parse(args: &[&str]) -> Command {
    let mut argv = vec!["scrivener"];
    argv.extend_from_slice(args);
    Cli::parse_from(argv).command
}

fn quiet() -> Formatter {
    Formatter::new(OutputFormat::Quiet, false)
}

#[tokio::test]
async fn test_research_writes_report_and_lists_session() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sessions.db");
    let report_path = dir.path().join("report.md");
    let service = service(&db);

    let Command::Research(args) = parse(&["research", TOPIC, "-o", report_path.to_str().unwrap()])
    else {
        panic!("Expected Research command");
    };
    let output = commands::execute_research(args, Arc::clone(&service), &defaults(), &quiet())
        .await
        .unwrap();

    assert!(output.contains("https://www.bls.gov/remote"));
    let written = std::fs::read_to_string(&report_path).unwrap();
    assert_eq!(written, output);

    let Command::Sessions(args) = parse(&["sessions"]) else {
        panic!("Expected Sessions command");
    };
    let listing = commands::execute_sessions(args, service.as_ref(), &quiet()).unwrap();
    assert_eq!(listing.lines().count(), 1);

    let id = listing.trim().to_string();
    let Command::Status(args) = parse(&["status", &id]) else {
        panic!("Expected Status command");
    };
    assert_eq!(commands::execute_status(args, service.as_ref(), &quiet()).unwrap(), "done");
}

#[tokio::test]
async fn test_report_survives_reopening_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sessions.db");

    let id = {
        let service = service(&db);
        let id = service.submit_research(TOPIC, None).unwrap();
        service.wait(id).await.unwrap();
        id
    };

    let reopened = service(&db);
    let Command::Report(args) = parse(&["report", &id.to_string()]) else {
        panic!("Expected Report command");
    };
    let json = commands::execute_report(args, reopened.as_ref(), &Formatter::new(OutputFormat::Json, false))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["status"], "done");
    assert_eq!(value["draft_version"], 1);

    let Command::Resume(args) = parse(&["resume", &id.to_string()]) else {
        panic!("Expected Resume command");
    };
    let err = commands::execute_resume(args, reopened, &quiet()).await.unwrap_err();
    assert!(matches!(err, CliError::Service(ServiceError::AlreadyFinished(_))));
}

#[tokio::test]
async fn test_bad_inputs() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir.path().join("sessions.db"));

    let Command::Status(args) = parse(&["status", "not-a-session"]) else {
        panic!("Expected Status command");
    };
    assert!(matches!(
        commands::execute_status(args, service.as_ref(), &quiet()),
        Err(CliError::InvalidInput(_))
    ));

    let Command::Research(args) = parse(&["research", TOPIC, "-i", "9"]) else {
        panic!("Expected Research command");
    };
    let err = commands::execute_research(args, Arc::clone(&service), &defaults(), &quiet())
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Service(ServiceError::Input(_))));

    let Command::Sessions(args) = parse(&["sessions"]) else {
        panic!("Expected Sessions command");
    };
    let table = commands::execute_sessions(args, service.as_ref(), &Formatter::new(OutputFormat::Table, false))
        .unwrap();
    assert!(table.contains("No sessions found"));
}

#[test]
fn test_style_guides_listing() {
    assert!(matches!(parse(&["style-guides"]), Command::StyleGuides));

    let names = commands::execute_style_guides(&quiet()).unwrap();
    assert_eq!(names, "technical\nconversational\nacademic");

    let table = commands::execute_style_guides(&Formatter::new(OutputFormat::Table, false)).unwrap();
    assert!(table.contains("For general audience. Friendly, simple language with analogies."));

    let json = commands::execute_style_guides(&Formatter::new(OutputFormat::Json, false)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[2]["name"], "academic");
}
