//! HTML helpers shared by the site profiles
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so documents
//! are parsed, queried and dropped without crossing an await point.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Parses a CSS selector, returning None for an invalid one
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Collapses runs of whitespace and trims
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text content of an element
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Text of the first element matching `css` that has any text
pub fn select_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Tries each selector in order and returns the first non-empty text
pub fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| select_text(document, css))
}

/// Value of `attr` on the first element matching `css` that carries it
pub fn select_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|element| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Extracts the page title from the HTML document
pub fn extract_title(document: &Html) -> Option<String> {
    select_text(document, "title")
}

/// Extracts `<meta name="description">`
pub fn meta_description(document: &Html) -> Option<String> {
    select_attr(document, r#"meta[name="description"]"#, "content").map(|s| clean_text(&s))
}

fn price_regex() -> &'static Regex {
    static PRICE: OnceLock<Regex> = OnceLock::new();
    PRICE.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid price regex"))
}

fn page_param_regex() -> &'static Regex {
    static PAGE: OnceLock<Regex> = OnceLock::new();
    PAGE.get_or_init(|| Regex::new(r"[?&]page=(\d+)").expect("valid page regex"))
}

/// Pulls the first number out of a price label such as `৳ 1,234.50`
///
/// Thousands separators are dropped. Returns None when no digits are present.
pub fn parse_price(text: &str) -> Option<f64> {
    let matched = price_regex().find(text)?;
    matched.as_str().replace(',', "").parse().ok()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - Invalid URLs or non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}

/// Returns true if both URLs point at the same host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Collects same-origin links accepted by `keep`, deduplicated in document order
pub fn collect_links<F>(document: &Html, base_url: &Url, keep: F) -> Vec<String>
where
    F: Fn(&Url) -> bool,
{
    let Some(sel) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&sel) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };
        if !same_origin(&url, base_url) || !keep(&url) {
            continue;
        }
        let url = url.to_string();
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    links
}

/// Highest page number advertised by a pagination widget
///
/// Both `?page=N` hrefs and numeric link labels count.
pub fn detect_last_page(document: &Html) -> Option<u32> {
    let sel = selector("ul.pagination a, .pagination a")?;
    document
        .select(&sel)
        .filter_map(|link| {
            let from_href = link
                .value()
                .attr("href")
                .and_then(|href| page_param_regex().captures(href))
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok());
            from_href.or_else(|| element_text(link).parse::<u32>().ok())
        })
        .max()
}

/// Recognises the "page not found" templates sites serve with a 200 status
pub fn looks_like_not_found(document: &Html) -> bool {
    let is_404 = |text: &str| {
        let lower = text.to_lowercase();
        lower.contains("page not found")
            || lower.starts_with("not found")
            || lower.split(|c: char| !c.is_ascii_alphanumeric()).any(|t| t == "404")
    };

    extract_title(document).map_or(false, |t| is_404(&t))
        || select_text(document, "h1").map_or(false, |t| is_404(&t))
}

/// Phrases of block, rate-limit and bot-challenge pages, matched against the
/// title and main heading
const BLOCK_PHRASES: &[&str] = &[
    "captcha",
    "access denied",
    "too many requests",
    "rate limit",
    "cloudflare",
    "please verify",
    "attention required",
    "just a moment",
    "you have been blocked",
];

/// Challenge widgets that never appear on a catalog page
const BLOCK_SELECTORS: &[&str] = &[
    "#challenge-form",
    "#cf-wrapper",
    ".cf-error-details",
    ".g-recaptcha",
    ".h-captcha",
    "iframe[src*='captcha']",
];

/// Recognises pages a site serves instead of content when it refuses the
/// scraper, whatever the HTTP status
///
/// Only the title, the first heading and challenge widgets are checked; body
/// text is not, since product copy and CDN script URLs mention words like
/// "blocked" or "cloudflare".
pub fn looks_blocked(document: &Html) -> bool {
    let has_phrase = |text: &str| {
        let lower = text.to_lowercase();
        BLOCK_PHRASES.iter().any(|phrase| lower.contains(phrase))
    };

    if extract_title(document).map_or(false, |t| has_phrase(&t))
        || select_text(document, "h1").map_or(false, |t| has_phrase(&t))
    {
        return true;
    }

    BLOCK_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .any(|sel| document.select(&sel).next().is_some())
}
