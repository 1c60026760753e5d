//! Prompt engineering for every reasoning call
//!
//! Each prompt is a pure function of its inputs, so a deterministic reasoner
//! gives identical answers for identical stage inputs.

use crate::config::StyleGuide;
use crate::drafter::PlannedSection;
use scrivener_domain::{CertitudeBand, QueryIntent, SearchHit};

/// Builds the drafting prompt from the citation plan
pub struct DraftPromptBuilder<'a> {
    topic: &'a str,
    sections: &'a [PlannedSection],
    needs_research: Vec<String>,
}

impl<'a> DraftPromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(topic: &'a str, sections: &'a [PlannedSection]) -> Self {
        Self {
            topic,
            sections,
            needs_research: Vec::new(),
        }
    }

    /// Mention hypotheses that must not be asserted
    pub fn with_needs_research(mut self, statements: Vec<String>) -> Self {
        self.needs_research = statements;
        self
    }

    /// Build the complete drafting prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(DRAFT_INSTRUCTIONS);
        prompt.push_str("\n\n");
        prompt.push_str(&format!("Research topic: {}\n\n", self.topic));

        for section in self.sections {
            prompt.push_str(&format!(
                "Hypothesis {} ({}): {}\n",
                section.hypothesis_id,
                band_guidance(section.band),
                section.statement
            ));
            prompt.push_str("Available citations:\n");
            for citation in &section.citations {
                prompt.push_str(&format!(
                    "{} claim: {} | quote: \"{}\" | source: {}\n",
                    citation.id.marker(),
                    citation.claim_text,
                    citation.quote,
                    citation.source_url
                ));
            }
            prompt.push('\n');
        }

        if !self.needs_research.is_empty() {
            prompt.push_str("Do NOT make claims about these open questions:\n");
            for statement in &self.needs_research {
                prompt.push_str(&format!("- {}\n", statement));
            }
            prompt.push('\n');
        }

        prompt.push_str(DRAFT_FORMAT_REMINDER);
        prompt
    }
}

fn band_guidance(band: CertitudeBand) -> &'static str {
    match band {
        CertitudeBand::WellSupported => "well supported: state confidently",
        CertitudeBand::Likely => "likely: hedge the wording",
        CertitudeBand::Uncertain | CertitudeBand::Falsified => "do not assert",
    }
}

/// Prompt asking for `count` hypotheses about `topic`
pub fn hypothesis_prompt(topic: &str, count: usize) -> String {
    format!(
        "{}\n\nNumber of hypotheses: {}\nTopic: {}\n\n{}",
        HYPOTHESIS_INSTRUCTIONS, count, topic, HYPOTHESIS_FORMAT_REMINDER
    )
}

/// Prompt classifying one search hit against a hypothesis
pub fn classify_prompt(statement: &str, query: &str, intent: QueryIntent, hit: &SearchHit) -> String {
    format!(
        "{}\n\nHypothesis: {}\nSearch query ({}): {}\n\nSource URL: {}\nSource title: {}\nSource text:\n---\n{}\n---\n\n{}",
        CLASSIFY_INSTRUCTIONS,
        statement,
        intent.as_str(),
        query,
        hit.url,
        hit.title,
        hit.snippet,
        CLASSIFY_FORMAT_REMINDER
    )
}

/// Prompt judging whether `content` fetched from `url` supports `claim`
pub fn verify_prompt(claim: &str, url: &str, content: &str) -> String {
    format!(
        "{}\n\nClaim: {}\nSource URL: {}\nSource content:\n---\n{}\n---\n\n{}",
        VERIFY_INSTRUCTIONS, claim, url, content, VERIFY_FORMAT_REMINDER
    )
}

/// Prompt reviewing a draft against the citations verification left unverified
///
/// `findings` holds one line per unverified citation.
pub fn critique_prompt(body: &str, findings: &[String]) -> String {
    format!(
        "{}\n\nDraft:\n---\n{}\n---\n\nVerification findings:\n{}\n\n{}",
        CRITIQUE_INSTRUCTIONS,
        body,
        findings.join("\n"),
        CRITIQUE_FORMAT_REMINDER
    )
}

/// Prompt restyling a report body without touching cited sentences
pub fn style_prompt(body: &str, guide: StyleGuide) -> String {
    format!(
        "{}\n\nTone: {}\n{}\n\nReport:\n---\n{}\n---\n\nReturn only the restyled markdown.",
        STYLE_INSTRUCTIONS,
        guide.as_str(),
        style_guidance(guide),
        body
    )
}

fn style_guidance(guide: StyleGuide) -> &'static str {
    match guide {
        StyleGuide::Technical => {
            "Write for practitioners: precise terms, short declarative sentences, no filler."
        }
        StyleGuide::Conversational => {
            "Write for a curious general reader: plain words, friendly transitions, no jargon."
        }
        StyleGuide::Academic => {
            "Write for a scholarly audience: formal register, measured qualifiers, clear structure."
        }
    }
}

const HYPOTHESIS_INSTRUCTIONS: &str = r#"You are forming research hypotheses.
Propose distinct, testable hypotheses that answer the topic below.

Rules:
- Each hypothesis is one declarative sentence that evidence could confirm or refute
- Include at least one supportive hypothesis and at least one critical (skeptical) hypothesis
- Give each a prior between 0.0 and 1.0 from general knowledge only:
  - Widely doubted: 0.2-0.4
  - Plausible but contested: 0.4-0.6
  - Broadly accepted: 0.6-0.8
- Do not search, cite or quote anything yet"#;

const HYPOTHESIS_FORMAT_REMINDER: &str = r#"Output format (JSON array only, no additional text):
[
  {
    "statement": "one testable sentence",
    "stance": "supportive or critical",
    "prior": 0.5,
    "reasoning": "why this hypothesis is worth testing"
  }
]"#;

const CLASSIFY_INSTRUCTIONS: &str = r#"Classify how this search result bears on the hypothesis.

Rules:
- "buttress" if the source gives evidence the hypothesis is true
- "falsify" if the source gives evidence the hypothesis is false
- "neutral" if the source is related but not decisive, or off-topic
- The quote MUST be copied verbatim from the source text, one or two sentences
- The claim is a single sentence stating what the quote establishes"#;

const CLASSIFY_FORMAT_REMINDER: &str = r#"Output format (JSON object only, no additional text):
{
  "verdict": "buttress, falsify or neutral",
  "quote": "exact text from the source",
  "claim": "one-sentence assertion the quote supports"
}"#;

const DRAFT_INSTRUCTIONS: &str = r#"Write the body of a research report from the citations below.

Rules:
- Write one section per hypothesis
- Every sentence must rest on one or more of the listed citations and name them by number
- Only cite a source for a sentence it fully supports
- Never introduce facts that are not in the listed claims or quotes
- Follow the hedging guidance given for each hypothesis"#;

const DRAFT_FORMAT_REMINDER: &str = r#"Output format (JSON object only, no additional text):
{
  "title": "report title",
  "sections": [
    {
      "hypothesis": "H1",
      "heading": "section heading",
      "sentences": [
        { "text": "sentence without markers", "citations": [1, 2] }
      ]
    }
  ]
}"#;

const VERIFY_INSTRUCTIONS: &str = r#"Check whether the source supports the claim.

Rules:
- "supported" is true only if the source content states or directly implies the claim
- "confidence" is your certainty between 0.0 and 1.0
- "quote" MUST be copied verbatim from the source content; leave it empty if nothing supports the claim
- Judge only from the content shown, not from outside knowledge"#;

const VERIFY_FORMAT_REMINDER: &str = r#"Output format (JSON object only, no additional text):
{
  "supported": true,
  "confidence": 0.9,
  "quote": "exact text from the source content",
  "reasoning": "one sentence"
}"#;

const CRITIQUE_INSTRUCTIONS: &str = r#"Critique this research draft against its verification findings.

Rules:
- Write one note per citation listed in the findings, naming it by number
- Say what is wrong with the claim as written: overstated, unsupported, or resting on a dead source
- Advise one fix per citation:
  - "replace" when the claim is sound but the source failed
  - "hedge" when the source supports a weaker version of the claim
  - "remove" when nothing is likely to support the claim
- Do not rewrite the draft yourself"#;

const CRITIQUE_FORMAT_REMINDER: &str = r#"Output format (JSON object only, no additional text):
{
  "summary": "two or three sentences on the draft overall",
  "notes": [
    { "citation": 1, "issue": "what is wrong", "advice": "replace, hedge or remove" }
  ]
}"#;

const STYLE_INSTRUCTIONS: &str = r#"Restyle the following research report.

Rules:
- Copy every sentence that ends with citation markers such as [1] or [2][3] exactly as written, markers included
- You may rewrite headings, add a short introduction, transitions and a conclusion
- Sentences you add must not carry citation markers and must not introduce new facts
- Keep the "Needs further research" list if present"#;

/// JSON schema for hypothesis formation output
pub const HYPOTHESIS_SCHEMA: &str = r#"{"type":"array","items":{"type":"object","properties":{"statement":{"type":"string"},"stance":{"type":"string"},"prior":{"type":"number"},"reasoning":{"type":"string"}},"required":["statement","stance","prior"]}}"#;

/// JSON schema for search-hit classification output
pub const CLASSIFY_SCHEMA: &str = r#"{"type":"object","properties":{"verdict":{"type":"string"},"quote":{"type":"string"},"claim":{"type":"string"}},"required":["verdict","quote"]}"#;

/// JSON schema for drafting output
pub const DRAFT_SCHEMA: &str = r#"{"type":"object","properties":{"title":{"type":"string"},"sections":{"type":"array","items":{"type":"object","properties":{"hypothesis":{"type":"string"},"heading":{"type":"string"},"sentences":{"type":"array","items":{"type":"object","properties":{"text":{"type":"string"},"citations":{"type":"array","items":{"type":"integer"}}},"required":["text","citations"]}}},"required":["heading","sentences"]}}},"required":["sections"]}"#;

/// JSON schema for critique output
pub const CRITIQUE_SCHEMA: &str = r#"{"type":"object","properties":{"summary":{"type":"string"},"notes":{"type":"array","items":{"type":"object","properties":{"citation":{"type":"integer"},"issue":{"type":"string"},"advice":{"type":"string"}},"required":["citation","issue"]}}},"required":["summary","notes"]}"#;

/// JSON schema for claim-support output
pub const VERIFY_SCHEMA: &str = r#"{"type":"object","properties":{"supported":{"type":"boolean"},"confidence":{"type":"number"},"quote":{"type":"string"},"reasoning":{"type":"string"}},"required":["supported","confidence","quote"]}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hypothesis_prompt_contents() {
        let prompt = hypothesis_prompt("Is Rust memory safe?", 4);
        assert!(prompt.contains("Topic: Is Rust memory safe?"));
        assert!(prompt.contains("Number of hypotheses: 4"));
        assert!(prompt.contains("critical"));
    }

    #[test]
    fn test_verify_prompt_is_pure() {
        let a = verify_prompt("claim", "https://a.org", "content");
        let b = verify_prompt("claim", "https://a.org", "content");
        assert_eq!(a, b);
        assert!(a.contains("Claim: claim"));
        assert!(a.contains("Source URL: https://a.org"));
    }

    #[test]
    fn test_classify_prompt_includes_hit() {
        let hit = SearchHit {
            url: "https://a.org".to_string(),
            title: "A".to_string(),
            snippet: "Snippet text".to_string(),
            date: None,
        };
        let prompt = classify_prompt("H", "q", QueryIntent::Falsify, &hit);
        assert!(prompt.contains("Search query (falsify): q"));
        assert!(prompt.contains("Snippet text"));
    }

    #[test]
    fn test_critique_prompt_lists_findings() {
        let findings = vec!["[2] failed: unreachable (HTTP 404)".to_string()];
        let prompt = critique_prompt("# Draft", &findings);
        assert!(prompt.starts_with("Critique this research draft"));
        assert!(prompt.contains("[2] failed: unreachable (HTTP 404)"));
        assert!(prompt.contains("# Draft"));
    }

    #[test]
    fn test_style_prompt_names_tone() {
        let prompt = style_prompt("# Report", StyleGuide::Academic);
        assert!(prompt.contains("Tone: academic"));
        assert!(prompt.contains("# Report"));
    }

    #[test]
    fn test_schemas_are_valid_json() {
        for schema in [HYPOTHESIS_SCHEMA, CLASSIFY_SCHEMA, DRAFT_SCHEMA, CRITIQUE_SCHEMA, VERIFY_SCHEMA] {
            assert!(serde_json::from_str::<serde_json::Value>(schema).is_ok());
        }
    }
}
