//! Source quality weighting
//!
//! Evidence is weighted by where it came from, judged only by the URL host.

use url::Url;

/// Primary sources: government, academic, standards bodies, journals
pub const PRIMARY_WEIGHT: f64 = 1.0;
/// Established news organisations and reference works
pub const REPUTABLE_WEIGHT: f64 = 0.75;
/// Anything else
pub const GENERAL_WEIGHT: f64 = 0.5;
/// Forums, social media and user-generated content
pub const LOW_WEIGHT: f64 = 0.25;

const PRIMARY_SUFFIXES: &[&str] = &[".gov", ".edu", ".mil", ".int", ".gov.uk", ".ac.uk", ".edu.au"];

const PRIMARY_DOMAINS: &[&str] = &[
    "nature.com",
    "science.org",
    "arxiv.org",
    "doi.org",
    "nih.gov",
    "europa.eu",
    "un.org",
    "who.int",
    "ietf.org",
    "w3.org",
    "ieee.org",
    "acm.org",
    "nejm.org",
    "thelancet.com",
    "bmj.com",
    "plos.org",
];

const REPUTABLE_DOMAINS: &[&str] = &[
    "reuters.com",
    "apnews.com",
    "bbc.com",
    "bbc.co.uk",
    "nytimes.com",
    "theguardian.com",
    "ft.com",
    "economist.com",
    "wsj.com",
    "bloomberg.com",
    "washingtonpost.com",
    "npr.org",
    "wikipedia.org",
    "britannica.com",
    "springer.com",
    "sciencedirect.com",
    "wiley.com",
];

const LOW_DOMAINS: &[&str] = &[
    "reddit.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "tiktok.com",
    "quora.com",
    "medium.com",
    "pinterest.com",
    "youtube.com",
    "tumblr.com",
];

fn matches_domain(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Weight in [0, 1] for evidence from `url`
///
/// Unparseable URLs get the lowest weight.
pub fn source_quality_weight(url: &str) -> f64 {
    let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(host) => host,
        None => return LOW_WEIGHT,
    };
    let host = host.trim_start_matches("www.");

    if PRIMARY_SUFFIXES.iter().any(|s| host.ends_with(s))
        || PRIMARY_DOMAINS.iter().any(|d| matches_domain(host, d))
    {
        PRIMARY_WEIGHT
    } else if REPUTABLE_DOMAINS.iter().any(|d| matches_domain(host, d)) {
        REPUTABLE_WEIGHT
    } else if LOW_DOMAINS.iter().any(|d| matches_domain(host, d))
        || host.starts_with("forum.")
        || host.starts_with("forums.")
    {
        LOW_WEIGHT
    } else {
        GENERAL_WEIGHT
    }
}

/// Host of a URL without a leading `www.`, or the URL itself when it has none
pub fn display_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_sources() {
        assert_eq!(source_quality_weight("https://www.cdc.gov/flu"), PRIMARY_WEIGHT);
        assert_eq!(source_quality_weight("https://cs.stanford.edu/paper"), PRIMARY_WEIGHT);
        assert_eq!(source_quality_weight("https://www.nature.com/articles/x"), PRIMARY_WEIGHT);
        assert_eq!(source_quality_weight("https://pubmed.ncbi.nlm.nih.gov/1"), PRIMARY_WEIGHT);
    }

    #[test]
    fn test_reputable_sources() {
        assert_eq!(source_quality_weight("https://www.reuters.com/a"), REPUTABLE_WEIGHT);
        assert_eq!(source_quality_weight("https://en.wikipedia.org/wiki/Rust"), REPUTABLE_WEIGHT);
    }

    #[test]
    fn test_low_sources() {
        assert_eq!(source_quality_weight("https://old.reddit.com/r/rust"), LOW_WEIGHT);
        assert_eq!(source_quality_weight("https://forum.example.com/t/1"), LOW_WEIGHT);
        assert_eq!(source_quality_weight("not a url"), LOW_WEIGHT);
    }

    #[test]
    fn test_general_sources() {
        assert_eq!(source_quality_weight("https://blog.example.com/post"), GENERAL_WEIGHT);
        // Suffix matching is on whole labels
        assert_eq!(source_quality_weight("https://notreddit.com/"), GENERAL_WEIGHT);
    }

    #[test]
    fn test_display_host() {
        assert_eq!(display_host("https://www.nature.com/articles/x"), "nature.com");
        assert_eq!(display_host("garbage"), "garbage");
    }
}
