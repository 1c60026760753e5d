//! HTML to readable text
//!
//! Drops page chrome (scripts, styles, navigation, headers and footers),
//! strips the remaining tags, decodes common entities and collapses
//! whitespace to single spaces.

use regex::Regex;
use std::sync::LazyLock;

const CHROME_TAGS: [&str; 7] = ["script", "style", "nav", "footer", "header", "noscript", "svg"];

static CHROME: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CHROME_TAGS
        .iter()
        .filter_map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok())
        .collect()
});

static COMMENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").ok());

static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").ok());

static NUMERIC_ENTITY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").ok());

/// Extract readable text from an HTML document
pub fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();

    for re in CHROME.iter() {
        text = re.replace_all(&text, " ").into_owned();
    }
    if let Some(re) = COMMENT.as_ref() {
        text = re.replace_all(&text, " ").into_owned();
    }
    if let Some(re) = TAG.as_ref() {
        text = re.replace_all(&text, " ").into_owned();
    }

    collapse_whitespace(&decode_entities(&text))
}

/// Whether a body looks like HTML rather than plain text
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(512).collect::<String>().to_lowercase();
    head.contains("<html") || head.contains("<!doctype html") || head.contains("<body")
}

/// Collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&mdash;", "-")
        .replace("&ndash;", "-")
        .replace("&hellip;", "...");

    let numeric = match NUMERIC_ENTITY.as_ref() {
        Some(re) => re
            .replace_all(&named, |caps: &regex::Captures<'_>| {
                let code = &caps[1];
                let value = match code.strip_prefix('x') {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => code.parse::<u32>().ok(),
                };
                value
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            })
            .into_owned(),
        None => named,
    };

    // Last, so "&amp;lt;" decodes to "&lt;" rather than "<"
    numeric.replace("&amp;", "&")
}
