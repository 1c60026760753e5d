//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use scrivener_domain::{truncate_chars, FinalReport, Session, SessionStatus};
use scrivener_pipeline::SessionStatusView;
use scrivener_research::StyleGuideInfo;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a final report.
    pub fn format_report(&self, report: &FinalReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report.content.clone()),
            OutputFormat::Table => Ok(self.format_report_table(report)),
        }
    }

    fn format_report_table(&self, report: &FinalReport) -> String {
        let mut out = report.content.trim_end().to_string();
        out.push_str("\n\n");

        if !report.citations.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["#", "Status", "Confidence", "Source"]);
            for citation in &report.citations {
                builder.push_record([
                    citation.id.to_string(),
                    citation.verification_status.as_str().to_string(),
                    format!("{:.2}", citation.confidence),
                    citation.source_url.clone(),
                ]);
            }
            let mut table = builder.build();
            table
                .with(Style::rounded())
                .with(Modify::new(Rows::first()).with(Alignment::center()));
            out.push_str(&table.to_string());
            out.push('\n');
        }

        let summary = format!(
            "{:.0}% of citations verified (threshold {:.0}%), {} revision round(s)",
            report.verification_rate * 100.0,
            report.threshold * 100.0,
            report.revision_count
        );
        if report.status == SessionStatus::Done {
            out.push_str(&self.success(&summary));
        } else {
            out.push_str(&self.warning(&summary));
            for claim in &report.unresolved_claims {
                out.push('\n');
                out.push_str(&format!(
                    "  {} {} ({}): {}",
                    claim.citation_id,
                    claim.status.as_str(),
                    claim.source_url,
                    truncate(&claim.claim_text, 80)
                ));
            }
            if !report.removed_claims.is_empty() {
                out.push('\n');
                out.push_str(&self.warning(&format!(
                    "{} claim(s) removed during revision",
                    report.removed_claims.len()
                )));
                for claim in &report.removed_claims {
                    out.push('\n');
                    out.push_str(&format!(
                        "  {} {} ({}): {}",
                        claim.citation_id,
                        claim.status.as_str(),
                        claim.source_url,
                        truncate(&claim.claim_text, 80)
                    ));
                }
            }
        }
        if !report.styled {
            out.push('\n');
            out.push_str(&self.info("Style pass skipped; the verified draft is shown as written"));
        }
        out
    }

    /// Format a session status.
    pub fn format_status(&self, view: &SessionStatusView) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(view)?),
            OutputFormat::Quiet => Ok(view.status.as_str().to_string()),
            OutputFormat::Table => {
                let summary = &view.artifacts;
                let rate = summary
                    .latest_verification_rate
                    .map(|r| format!("{:.0}%", r * 100.0))
                    .unwrap_or_else(|| "-".to_string());

                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                builder.push_record(["ID".to_string(), view.id.to_string()]);
                builder.push_record(["Topic".to_string(), view.topic.clone()]);
                builder.push_record(["Stage".to_string(), view.stage.to_string()]);
                builder.push_record(["Status".to_string(), self.status_text(view.status)]);
                builder.push_record(["Revisions".to_string(), view.revision_count.to_string()]);
                builder.push_record(["Hypotheses".to_string(), summary.hypotheses.to_string()]);
                builder.push_record(["Evidence".to_string(), summary.evidence_items.to_string()]);
                builder.push_record(["Drafts".to_string(), summary.drafts.to_string()]);
                builder.push_record(["Critiques".to_string(), summary.critiques.to_string()]);
                builder.push_record(["Verified".to_string(), rate]);
                if let Some(error) = &view.error {
                    builder.push_record(["Error".to_string(), error.clone()]);
                }

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    /// Format a session listing.
    pub fn format_sessions(&self, sessions: &[Session]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<serde_json::Value> = sessions
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "id": s.id.to_string(),
                            "topic": s.topic,
                            "stage": s.current_stage.to_string(),
                            "status": s.status.as_str(),
                            "revision_count": s.revision_count,
                            "created_at": s.created_at,
                            "updated_at": s.updated_at
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }
            OutputFormat::Quiet => Ok(sessions
                .iter()
                .map(|s| s.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if sessions.is_empty() {
                    return Ok(self.colorize("No sessions found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["ID", "Topic", "Stage", "Status", "Revisions"]);
                for session in sessions {
                    builder.push_record([
                        session.id.to_string(),
                        truncate(&session.topic, 48),
                        session.current_stage.to_string(),
                        self.status_text(session.status),
                        session.revision_count.to_string(),
                    ]);
                }

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    /// Format the style guide listing.
    pub fn format_style_guides(&self, guides: &[StyleGuideInfo]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(guides)?),
            OutputFormat::Quiet => Ok(guides
                .iter()
                .map(|g| g.name.clone())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Style", "Description"]);
                for guide in guides {
                    builder.push_record([guide.name.clone(), guide.description.clone()]);
                }

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    fn status_text(&self, status: SessionStatus) -> String {
        let color = match status {
            SessionStatus::Done => "green",
            SessionStatus::DoneWithWarning | SessionStatus::Cancelled => "yellow",
            SessionStatus::Failed => "red",
            SessionStatus::Running => "cyan",
        };
        self.colorize(status.as_str(), color)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut = truncate_chars(text, max_chars.saturating_sub(1));
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_domain::{
        Citation, CitationId, EvidenceId, HypothesisId, UnresolvedClaim, VerificationStatus,
    };

    fn citation(id: u32, status: VerificationStatus) -> Citation {
        Citation {
            id: CitationId(id),
            claim_text: format!("Claim {}.", id),
            source_url: format!("https://source{}.gov/page", id),
            quote: "A quote.".to_string(),
            evidence_id: EvidenceId::new(),
            hypothesis_id: HypothesisId(1),
            verification_status: status,
            confidence: 0.9,
        }
    }

    fn report(status: SessionStatus) -> FinalReport {
        FinalReport {
            content: "# Report\n\nClaim 1. [1]\n".to_string(),
            citations: vec![
                citation(1, VerificationStatus::Verified),
                citation(2, VerificationStatus::Failed),
            ],
            verification_rate: 0.5,
            threshold: 0.9,
            status,
            unresolved_claims: vec![UnresolvedClaim {
                citation_id: CitationId(2),
                claim_text: "Claim 2.".to_string(),
                source_url: "https://source2.gov/page".to_string(),
                status: VerificationStatus::Failed,
            }],
            removed_claims: vec![],
            revision_count: 3,
            draft_version: 4,
            styled: true,
        }
    }

    #[test]
    fn test_report_table_lists_unresolved() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter
            .format_report(&report(SessionStatus::DoneWithWarning))
            .unwrap();
        assert!(output.starts_with("# Report"));
        assert!(output.contains("Confidence"));
        assert!(output.contains("⚠ 50% of citations verified (threshold 90%), 3 revision round(s)"));
        assert!(output.contains("https://source2.gov/page"));
    }

    #[test]
    fn test_report_table_lists_removed_claims() {
        let mut removed = report(SessionStatus::DoneWithWarning);
        removed.verification_rate = 1.0;
        removed.citations.truncate(1);
        removed.unresolved_claims.clear();
        removed.removed_claims.push(UnresolvedClaim {
            citation_id: CitationId(2),
            claim_text: "Claim 2.".to_string(),
            source_url: "https://source2.gov/gone".to_string(),
            status: VerificationStatus::Failed,
        });

        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_report(&removed).unwrap();
        assert!(output.contains("⚠ 100% of citations verified"));
        assert!(output.contains("⚠ 1 claim(s) removed during revision"));
        assert!(output.contains("  2 failed (https://source2.gov/gone): Claim 2."));
    }

    #[test]
    fn test_report_quiet_is_content_only() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let output = formatter.format_report(&report(SessionStatus::Done)).unwrap();
        assert_eq!(output, "# Report\n\nClaim 1. [1]\n");
    }

    #[test]
    fn test_report_json() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_report(&report(SessionStatus::Done)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["revision_count"], 3);
    }

    #[test]
    fn test_empty_sessions() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_sessions(&[]).unwrap();
        assert!(output.contains("No sessions found"));
    }

    #[test]
    fn test_sessions_quiet() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let sessions = vec![Session::new("topic one", 1), Session::new("topic two", 2)];
        let output = formatter.format_sessions(&sessions).unwrap();
        assert_eq!(output.lines().count(), 2);
        assert!(!output.contains("topic"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
    }
}
