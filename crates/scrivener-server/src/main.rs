//! Scrivener Server
//!
//! Starts the HTTP server for the research service.

use scrivener_server::{config::ServerConfig, start_server, ServerError};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let args: Vec<String> = env::args().collect();

    let config = if args.len() > 2 && args[1] == "--config" {
        ServerConfig::from_file(&args[2])?
    } else if args.len() > 1 && args[1] == "--help" {
        print_help();
        process::exit(0);
    } else {
        eprintln!("Warning: No config file specified, using defaults");
        eprintln!("Usage: scrivener-server --config <path-to-config.toml>");
        eprintln!();
        ServerConfig::default()
    };

    start_server(config.with_env_overrides()).await?;

    Ok(())
}

fn print_help() {
    println!("Scrivener Server - Verified Research Reports over HTTP");
    println!();
    println!("USAGE:");
    println!("    scrivener-server --config <path-to-config.toml>");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Load configuration from TOML file");
    println!("    --help             Print this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    TAVILY_API_KEY     Search API key (required)");
    println!("    SCRIVENER_DB       Session database path");
    println!("    OLLAMA_HOST        Ollama endpoint");
    println!("    SCRIVENER_MODEL    Model name");
    println!("    RUST_LOG           Log filter (default: info)");
    println!();
    println!("ENDPOINTS:");
    println!("    POST /api/research                 Submit a topic");
    println!("    GET  /api/sessions                 List sessions");
    println!("    GET  /api/sessions/:id/status      Session progress");
    println!("    GET  /api/sessions/:id/report      Final report");
    println!("    POST /api/sessions/:id/cancel      Cancel a running session");
    println!("    POST /api/sessions/:id/resume      Resume a stopped session");
    println!("    GET  /api/style-guides             Available report styles");
    println!("    GET  /health                       Health check");
    println!();
}
