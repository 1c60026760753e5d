//! Citation marker extraction, sentence splitting and text normalisation

use regex::Regex;
use scrivener_domain::CitationId;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").ok());

/// Citation ids referenced by `[n]` or `[n, m]` markers, in order of first use
pub fn extract_markers(content: &str) -> Vec<CitationId> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    let Some(marker) = MARKER.as_ref() else {
        return ids;
    };
    for caps in marker.captures_iter(content) {
        for part in caps[1].split(',') {
            if let Ok(n) = part.trim().parse::<u32>() {
                if seen.insert(n) {
                    ids.push(CitationId(n));
                }
            }
        }
    }
    ids
}

/// The set of citation ids referenced in `content`
pub fn marker_set(content: &str) -> BTreeSet<CitationId> {
    extract_markers(content).into_iter().collect()
}

/// Lowercase and collapse whitespace, for tolerant substring checks
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `quote` occurs in `content`, ignoring case and whitespace runs
pub fn quote_in_content(quote: &str, content: &str) -> bool {
    let quote = normalize(quote);
    !quote.is_empty() && normalize(content).contains(&quote)
}

/// Split rendered report text into sentences
///
/// Heading lines are skipped and list bullets stripped. A sentence ends at
/// `.`, `!` or `?` followed by whitespace, a marker or the end of the line,
/// and keeps the `[n]` markers that directly follow it.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line);

        let mut start = 0;
        let mut chars = line.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if !matches!(c, '.' | '!' | '?') {
                continue;
            }
            let after = i + c.len_utf8();
            let rest = &line[after..];
            if !(rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with('[')) {
                continue;
            }
            let end = after + trailing_markers(rest);
            push_sentence(&mut sentences, &line[start..end]);
            start = end;
            while chars.next_if(|(j, _)| *j < end).is_some() {}
        }
        push_sentence(&mut sentences, &line[start..]);
    }
    sentences
}

/// Bytes of `rest` taken up by markers directly after a sentence end
fn trailing_markers(rest: &str) -> usize {
    let Some(marker) = MARKER.as_ref() else {
        return 0;
    };
    let mut consumed = 0;
    loop {
        let tail = &rest[consumed..];
        let trimmed = tail.trim_start();
        match marker.find(trimmed) {
            Some(m) if m.start() == 0 => consumed += tail.len() - trimmed.len() + m.end(),
            _ => return consumed,
        }
    }
}

fn push_sentence(sentences: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        sentences.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_and_grouped_markers() {
        let ids = extract_markers("Rust is safe [1]. It is fast [2, 3][1].");
        assert_eq!(ids, vec![CitationId(1), CitationId(2), CitationId(3)]);
    }

    #[test]
    fn test_ignores_non_numeric_brackets() {
        assert!(extract_markers("see [note] and [a, b]").is_empty());
    }

    #[test]
    fn test_marker_set() {
        let set = marker_set("x [3] y [1]");
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![CitationId(1), CitationId(3)]);
    }

    #[test]
    fn test_quote_matching_is_tolerant() {
        let content = "The  borrow checker\nprevents data races at compile time.";
        assert!(quote_in_content("borrow checker prevents DATA races", content));
        assert!(!quote_in_content("garbage collector", content));
        assert!(!quote_in_content("   ", content));
    }

    #[test]
    fn test_split_sentences_keeps_trailing_markers() {
        let text = "# Title\n\n## Part\n\nTides follow the moon. [1][3] They are old. Really?\n- Open item\n";
        assert_eq!(
            split_sentences(text),
            vec!["Tides follow the moon. [1][3]", "They are old.", "Really?", "Open item"]
        );
    }

    #[test]
    fn test_split_sentences_ignores_inner_dots() {
        let text = "Output rose 13.5% in 2023 [2]. See [note] for more";
        assert_eq!(
            split_sentences(text),
            vec!["Output rose 13.5% in 2023 [2].", "See [note] for more"]
        );
    }
}
