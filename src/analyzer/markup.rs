use regex::Regex;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"))
}

fn whitespace_regex() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

fn title_regex() -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid"))
}

/// Replaces tag-delimited markup with spaces and collapses runs of whitespace
pub fn strip_markup(html: &str) -> String {
    let text = tag_regex().replace_all(html, " ");
    whitespace_regex().replace_all(&text, " ").trim().to_string()
}

/// Returns the contents of the first `<title>` element, or an empty string
pub fn extract_title(html: &str) -> String {
    title_regex()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| whitespace_regex().replace_all(m.as_str(), " ").trim().to_string())
        .unwrap_or_default()
}
