//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use scrivener_research::{ResearchConfig, StyleGuide};
use std::path::PathBuf;

/// Scrivener CLI - Research a topic into a cited, verified report.
#[derive(Debug, Parser)]
#[command(name = "scrivener")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path (default: ~/.scrivener/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Session database path
    #[arg(long, env = "SCRIVENER_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Ollama endpoint
    #[arg(long, env = "OLLAMA_HOST", global = true)]
    pub ollama_host: Option<String>,

    /// Model name
    #[arg(long, env = "SCRIVENER_MODEL", global = true)]
    pub model: Option<String>,

    /// Tavily API key
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true, global = true)]
    pub tavily_key: Option<String>,

    /// Log more (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs or report text only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Research a topic and wait for the report
    Research(ResearchArgs),

    /// Show a session's progress
    Status(SessionArgs),

    /// Print a finished session's report
    Report(ReportArgs),

    /// Continue an interrupted, cancelled or failed session
    Resume(ResumeArgs),

    /// List sessions
    Sessions(SessionsArgs),

    /// List the report styles a session can use
    StyleGuides,
}

/// Arguments for the research command.
#[derive(Debug, Parser)]
pub struct ResearchArgs {
    /// Topic or question to research
    pub topic: String,

    /// Settings preset
    #[arg(short, long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Revise-and-reverify rounds allowed (1-5)
    #[arg(short = 'i', long)]
    pub max_iterations: Option<u32>,

    /// Required share of verified citations (0.0-1.0]
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Hypotheses to form (3-5)
    #[arg(long)]
    pub hypotheses: Option<usize>,

    /// Tone of the final report
    #[arg(short, long, value_enum)]
    pub style: Option<StyleArg>,

    /// Write the report markdown to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ResearchArgs {
    /// The session configuration: preset (or `base`), then explicit flags
    pub fn research_config(&self, base: &ResearchConfig) -> ResearchConfig {
        let mut config = match self.preset {
            Some(PresetArg::Default) => ResearchConfig::default(),
            Some(PresetArg::Aggressive) => ResearchConfig::aggressive(),
            Some(PresetArg::Lenient) => ResearchConfig::lenient(),
            None => base.clone(),
        };
        if let Some(n) = self.max_iterations {
            config.max_iterations = n;
        }
        if let Some(t) = self.threshold {
            config.verification_threshold = t;
        }
        if let Some(n) = self.hypotheses {
            config.hypothesis_count = n;
        }
        if let Some(style) = self.style {
            config.style = style.into();
        }
        config
    }
}

/// Arguments naming one session.
#[derive(Debug, Parser)]
pub struct SessionArgs {
    /// Session ID
    pub id: String,
}

/// Arguments for the report command.
#[derive(Debug, Parser)]
pub struct ReportArgs {
    /// Session ID
    pub id: String,

    /// Write the report markdown to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the resume command.
#[derive(Debug, Parser)]
pub struct ResumeArgs {
    /// Session ID
    pub id: String,

    /// Write the report markdown to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the sessions command.
#[derive(Debug, Parser)]
pub struct SessionsArgs {
    /// Maximum number of sessions shown
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Settings preset argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced defaults
    Default,
    /// Fewer queries, one revision round
    Aggressive,
    /// More hypotheses, more revision rounds
    Lenient,
}

/// Style argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StyleArg {
    /// Precise technical prose
    Technical,
    /// Formal academic register
    Academic,
    /// Plain language for a general reader
    Conversational,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<StyleArg> for StyleGuide {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Technical => StyleGuide::Technical,
            StyleArg::Academic => StyleGuide::Academic,
            StyleArg::Conversational => StyleGuide::Conversational,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_command() {
        let cli = Cli::parse_from([
            "scrivener",
            "research",
            "Does remote work raise output?",
            "--preset",
            "lenient",
            "-i",
            "2",
            "--style",
            "academic",
        ]);
        match cli.command {
            Command::Research(args) => {
                assert_eq!(args.topic, "Does remote work raise output?");
                let config = args.research_config(&ResearchConfig::default());
                assert_eq!(config.max_iterations, 2);
                assert_eq!(config.hypothesis_count, 5);
                assert_eq!(config.style, StyleGuide::Academic);
            }
            _ => panic!("Expected Research command"),
        }
    }

    #[test]
    fn test_base_config_used_without_preset() {
        let cli = Cli::parse_from(["scrivener", "research", "A topic worth checking"]);
        let Command::Research(args) = cli.command else {
            panic!("Expected Research command");
        };
        let base = ResearchConfig {
            max_iterations: 4,
            ..ResearchConfig::default()
        };
        assert_eq!(args.research_config(&base).max_iterations, 4);
    }

    #[test]
    fn test_style_guides_command() {
        let cli = Cli::parse_from(["scrivener", "style-guides", "-f", "json"]);
        assert!(matches!(cli.command, Command::StyleGuides));
        assert!(matches!(cli.format, Some(CliFormat::Json)));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["scrivener", "sessions", "--format", "json", "--db", "/tmp/s.db"]);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/s.db")));
        match cli.command {
            Command::Sessions(args) => assert_eq!(args.limit, 20),
            _ => panic!("Expected Sessions command"),
        }
    }
}
