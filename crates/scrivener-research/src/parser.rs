//! Parse reasoner output into stage values

use crate::error::ResearchError;
use scrivener_domain::{RevisionStrategy, Stance, Verdict};
use serde_json::{Map, Value};
use tracing::warn;

/// A hypothesis proposed by the reasoner, before ids are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisCandidate {
    /// Hypothesis statement
    pub statement: String,
    /// Supportive or critical
    pub stance: Stance,
    /// Prior certitude
    pub prior: f64,
    /// Why it was proposed
    pub reasoning: String,
}

/// Classification of one search hit
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Stance towards the hypothesis
    pub verdict: Verdict,
    /// Verbatim quote
    pub quote: String,
    /// One-sentence claim
    pub claim: String,
}

/// A drafted sentence with the citation numbers it names
#[derive(Debug, Clone, PartialEq)]
pub struct DraftedSentence {
    /// Sentence text
    pub text: String,
    /// Citation numbers as written by the reasoner
    pub citations: Vec<u32>,
}

/// A drafted section
#[derive(Debug, Clone, PartialEq)]
pub struct DraftedSection {
    /// Hypothesis label, e.g. `H2`, when given
    pub hypothesis: Option<String>,
    /// Section heading
    pub heading: String,
    /// Sentences in order
    pub sentences: Vec<DraftedSentence>,
}

/// A drafted report body
#[derive(Debug, Clone, PartialEq)]
pub struct DraftedReport {
    /// Title, when given
    pub title: Option<String>,
    /// Sections in order
    pub sections: Vec<DraftedSection>,
}

/// Claim-support judgement for one (claim, content) pair
#[derive(Debug, Clone, PartialEq)]
pub struct SupportJudgement {
    /// Whether the content supports the claim
    pub supported: bool,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Quote offered as support
    pub quote: String,
    /// Short explanation
    pub reasoning: String,
}

/// One critique note as written by the reasoner
#[derive(Debug, Clone, PartialEq)]
pub struct CritiqueEntry {
    /// Citation number
    pub citation: u32,
    /// What is wrong with the claim
    pub issue: String,
    /// Recommended fix, when one was named and recognised
    pub advice: Option<RevisionStrategy>,
}

/// A parsed critique
#[derive(Debug, Clone, PartialEq)]
pub struct CritiqueResponse {
    /// Overall assessment
    pub summary: String,
    /// Per-citation notes
    pub notes: Vec<CritiqueEntry>,
}

/// Parse the hypothesis former's response; invalid items are skipped
pub fn parse_hypotheses(response: &str) -> Result<Vec<HypothesisCandidate>, ResearchError> {
    let json = parse_value(response)?;
    let items = json
        .as_array()
        .ok_or_else(|| ResearchError::InvalidFormat("Expected JSON array".to_string()))?;

    let mut candidates = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        match parse_hypothesis_json(item) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!("Failed to parse hypothesis {}: {}", idx, e),
        }
    }
    Ok(candidates)
}

fn parse_hypothesis_json(json: &Value) -> Result<HypothesisCandidate, String> {
    let obj = as_object(json, "Hypothesis")?;
    let statement = required_str(obj, "statement")?;
    if statement.is_empty() {
        return Err("Empty 'statement'".to_string());
    }
    let stance = obj
        .get("stance")
        .and_then(Value::as_str)
        .and_then(Stance::parse)
        .ok_or_else(|| "Missing or invalid 'stance'".to_string())?;
    let prior = obj
        .get("prior")
        .and_then(Value::as_f64)
        .ok_or_else(|| "Missing or invalid 'prior'".to_string())?;
    if !(0.0..=1.0).contains(&prior) {
        return Err(format!("Prior {} outside [0, 1]", prior));
    }

    Ok(HypothesisCandidate {
        statement,
        stance,
        prior,
        reasoning: optional_str(obj, "reasoning"),
    })
}

/// Parse a search-hit classification
pub fn parse_classification(response: &str) -> Result<Classification, ResearchError> {
    let json = parse_value(response)?;
    let obj = as_object(&json, "Classification").map_err(ResearchError::InvalidFormat)?;

    let verdict = obj
        .get("verdict")
        .and_then(Value::as_str)
        .and_then(Verdict::parse)
        .ok_or_else(|| ResearchError::InvalidFormat("Missing or invalid 'verdict'".to_string()))?;
    let quote = required_str(obj, "quote").map_err(ResearchError::InvalidFormat)?;

    Ok(Classification {
        verdict,
        quote,
        claim: optional_str(obj, "claim"),
    })
}

/// Parse the drafter's response; malformed sentences and sections are skipped
pub fn parse_draft(response: &str) -> Result<DraftedReport, ResearchError> {
    let json = parse_value(response)?;
    let obj = as_object(&json, "Draft").map_err(ResearchError::InvalidFormat)?;
    let sections_json = obj
        .get("sections")
        .and_then(Value::as_array)
        .ok_or_else(|| ResearchError::InvalidFormat("Missing 'sections' array".to_string()))?;

    let mut sections = Vec::new();
    for (idx, section) in sections_json.iter().enumerate() {
        match parse_section_json(section) {
            Ok(section) => sections.push(section),
            Err(e) => warn!("Failed to parse draft section {}: {}", idx, e),
        }
    }

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(DraftedReport { title, sections })
}

fn parse_section_json(json: &Value) -> Result<DraftedSection, String> {
    let obj = as_object(json, "Section")?;
    let heading = required_str(obj, "heading")?;
    let sentences_json = obj
        .get("sentences")
        .and_then(Value::as_array)
        .ok_or_else(|| "Missing 'sentences' array".to_string())?;

    let mut sentences = Vec::new();
    for (idx, sentence) in sentences_json.iter().enumerate() {
        let Some(obj) = sentence.as_object() else {
            warn!("Sentence {} is not a JSON object", idx);
            continue;
        };
        let text = optional_str(obj, "text");
        if text.is_empty() {
            warn!("Sentence {} has no text", idx);
            continue;
        }
        let citations = obj
            .get("citations")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(citation_number).collect())
            .unwrap_or_default();
        sentences.push(DraftedSentence { text, citations });
    }

    let hypothesis = obj
        .get("hypothesis")
        .and_then(Value::as_str)
        .map(|h| h.trim().to_string());

    Ok(DraftedSection {
        hypothesis,
        heading,
        sentences,
    })
}

/// Parse a claim-support judgement
pub fn parse_support(response: &str) -> Result<SupportJudgement, ResearchError> {
    let json = parse_value(response)?;
    let obj = as_object(&json, "Judgement").map_err(ResearchError::InvalidFormat)?;

    let supported = obj
        .get("supported")
        .and_then(Value::as_bool)
        .ok_or_else(|| ResearchError::InvalidFormat("Missing or invalid 'supported'".to_string()))?;
    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| ResearchError::InvalidFormat("Missing or invalid 'confidence'".to_string()))?;

    Ok(SupportJudgement {
        supported,
        confidence: if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        },
        quote: optional_str(obj, "quote"),
        reasoning: optional_str(obj, "reasoning"),
    })
}

/// Parse a critique; notes without a citation number or issue are skipped
pub fn parse_critique(response: &str) -> Result<CritiqueResponse, ResearchError> {
    let json = parse_value(response)?;
    let obj = as_object(&json, "Critique").map_err(ResearchError::InvalidFormat)?;
    let items = obj
        .get("notes")
        .and_then(Value::as_array)
        .ok_or_else(|| ResearchError::InvalidFormat("Missing or invalid 'notes'".to_string()))?;

    let mut notes = Vec::new();
    for item in items {
        let Some(note) = item.as_object() else {
            warn!("Skipping non-object critique note");
            continue;
        };
        let citation = note
            .get("citation")
            .and_then(citation_number)
            .filter(|n| *n > 0);
        let issue = optional_str(note, "issue");
        let (Some(citation), false) = (citation, issue.is_empty()) else {
            warn!("Skipping critique note without citation or issue");
            continue;
        };
        notes.push(CritiqueEntry {
            citation,
            issue,
            advice: RevisionStrategy::parse(&optional_str(note, "advice")),
        });
    }

    Ok(CritiqueResponse {
        summary: optional_str(obj, "summary"),
        notes,
    })
}

/// Strip markdown code fences from a free-text response
pub fn strip_code_fences(response: &str) -> String {
    let trimmed = response.trim();
    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        let end = if lines.len() > 1 && lines[lines.len() - 1].trim() == "```" {
            lines.len() - 1
        } else {
            lines.len()
        };
        lines[1.min(end)..end].join("\n")
    } else {
        trimmed.to_string()
    }
}

/// Extract JSON from response, handling markdown code blocks and chatter
fn extract_json(response: &str) -> Result<String, ResearchError> {
    let stripped = strip_code_fences(response);
    if stripped.is_empty() {
        return Err(ResearchError::InvalidFormat("Empty response".to_string()));
    }
    if stripped.starts_with('{') || stripped.starts_with('[') {
        return Ok(stripped);
    }

    // Reasoners sometimes wrap the JSON in a sentence of prose
    let start = stripped.find(['{', '[']);
    let end = stripped.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(stripped[s..=e].to_string()),
        _ => Err(ResearchError::InvalidFormat("No JSON found in response".to_string())),
    }
}

fn parse_value(response: &str) -> Result<Value, ResearchError> {
    let json_str = extract_json(response)?;
    serde_json::from_str(&json_str)
        .map_err(|e| ResearchError::InvalidFormat(format!("JSON parse error: {}", e)))
}

/// A citation number written as `2`, `"2"` or `"[2]"`
fn citation_number(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().trim_matches(['[', ']']).parse().ok()))
        .and_then(|n| u32::try_from(n).ok())
}

fn as_object<'v>(json: &'v Value, what: &str) -> Result<&'v Map<String, Value>, String> {
    json.as_object()
        .ok_or_else(|| format!("{} is not a JSON object", what))
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| format!("Missing or invalid '{}'", key))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hypotheses() {
        let response = r#"[
            {"statement": "Rust prevents memory bugs", "stance": "supportive", "prior": 0.7, "reasoning": "ownership"},
            {"statement": "Rust slows teams down", "stance": "critical", "prior": 0.4}
        ]"#;
        let hypotheses = parse_hypotheses(response).unwrap();
        assert_eq!(hypotheses.len(), 2);
        assert_eq!(hypotheses[0].stance, Stance::Supportive);
        assert_eq!(hypotheses[1].reasoning, "");
    }

    #[test]
    fn test_parse_hypotheses_skips_invalid_items() {
        let response = r#"[
            {"statement": "Valid", "stance": "critical", "prior": 0.3},
            {"statement": "Bad prior", "stance": "critical", "prior": 1.7},
            {"statement": "Bad stance", "stance": "sideways", "prior": 0.5},
            "not an object"
        ]"#;
        assert_eq!(parse_hypotheses(response).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_json_with_markdown_wrapper() {
        let response = "```json\n{\"verdict\": \"buttress\", \"quote\": \"q\", \"claim\": \"c\"}\n```";
        let classification = parse_classification(response).unwrap();
        assert_eq!(classification.verdict, Verdict::Buttress);
        assert_eq!(classification.claim, "c");
    }

    #[test]
    fn test_parse_json_with_prose() {
        let response = "Here you go: {\"supported\": true, \"confidence\": 0.8, \"quote\": \"q\"} Hope it helps.";
        let judgement = parse_support(response).unwrap();
        assert!(judgement.supported);
        assert_eq!(judgement.confidence, 0.8);
    }

    #[test]
    fn test_parse_support_clamps_confidence() {
        let judgement =
            parse_support(r#"{"supported": false, "confidence": 3.0, "quote": ""}"#).unwrap();
        assert_eq!(judgement.confidence, 1.0);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_support("This is not JSON"),
            Err(ResearchError::InvalidFormat(_))
        ));
        assert!(parse_classification(r#"{"verdict": "maybe", "quote": "q"}"#).is_err());
    }

    #[test]
    fn test_parse_draft() {
        let response = r#"{
            "title": "Memory safety",
            "sections": [
                {"hypothesis": "H1", "heading": "Safety", "sentences": [
                    {"text": "Rust prevents use-after-free.", "citations": [1, "2"]},
                    {"text": "", "citations": [3]},
                    {"text": "Uncited.", "citations": []}
                ]},
                {"sentences": []}
            ]
        }"#;
        let draft = parse_draft(response).unwrap();
        assert_eq!(draft.title.as_deref(), Some("Memory safety"));
        assert_eq!(draft.sections.len(), 1);
        assert_eq!(draft.sections[0].hypothesis.as_deref(), Some("H1"));
        assert_eq!(draft.sections[0].sentences.len(), 2);
        assert_eq!(draft.sections[0].sentences[0].citations, vec![1, 2]);
        assert!(draft.sections[0].sentences[1].citations.is_empty());
    }

    #[test]
    fn test_parse_critique() {
        let response = r#"{
            "summary": "Two claims overreach.",
            "notes": [
                {"citation": 2, "issue": "dead source", "advice": "replace"},
                {"citation": "[3]", "issue": "overstated", "advice": "Hedge"},
                {"citation": 4, "issue": "no support", "advice": "rewrite"},
                {"citation": 0, "issue": "bad number"},
                {"issue": "no number"},
                {"citation": 5, "issue": ""}
            ]
        }"#;
        let critique = parse_critique(response).unwrap();
        assert_eq!(critique.summary, "Two claims overreach.");
        assert_eq!(critique.notes.len(), 3);
        assert_eq!(critique.notes[0].advice, Some(RevisionStrategy::Replace));
        assert_eq!(critique.notes[1].citation, 3);
        assert_eq!(critique.notes[1].advice, Some(RevisionStrategy::Hedge));
        assert_eq!(critique.notes[2].advice, None);

        assert!(parse_critique(r#"{"summary": "no notes"}"#).is_err());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```markdown\n# Title\nBody\n```"), "# Title\nBody");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }
}
