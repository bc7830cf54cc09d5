//! Parsing helpers shared by the site adapters
//!
//! Every lookup that the adapters depend on fails with
//! [`MangaError::Upstream`] naming the site and the missing piece, so stale
//! scraping logic is reported instead of producing empty or corrupt results.

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::{MangaError, Result};

/// Compile a CSS selector
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| MangaError::upstream("selector", format!("{}: {:?}", css, e)))
}

/// Compile a regular expression
pub fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| MangaError::upstream("regex", e.to_string()))
}

/// First element of the document matching `css`, or an upstream error
pub fn find<'a>(site: &str, document: &'a Html, css: &str) -> Result<ElementRef<'a>> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .next()
        .ok_or_else(|| MangaError::upstream(site, format!("missing `{}`", css)))
}

/// First descendant of `element` matching `css`, or an upstream error
pub fn find_in<'a>(site: &str, element: ElementRef<'a>, css: &str) -> Result<ElementRef<'a>> {
    let sel = selector(css)?;
    element
        .select(&sel)
        .next()
        .ok_or_else(|| MangaError::upstream(site, format!("missing `{}`", css)))
}

/// Required attribute value
pub fn attr(site: &str, element: ElementRef<'_>, name: &str) -> Result<String> {
    element
        .value()
        .attr(name)
        .map(|v| v.to_string())
        .ok_or_else(|| {
            MangaError::upstream(
                site,
                format!("`{}` without `{}` attribute", element.value().name(), name),
            )
        })
}

/// Element text with runs of whitespace collapsed
pub fn text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `href` against `base`
pub fn absolute(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}/{}", base.trim_end_matches('/'), href.trim_start_matches('/')))
}

/// Percent-encode a URL, leaving `:`, `/` and existing escapes untouched
pub fn quote_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for byte in url.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':' | b'/' | b'%' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// `true` when `url` is `base` or lives under it (same scheme and authority)
pub fn is_under(base: &str, url: &str) -> bool {
    let base = base.trim_end_matches('/');
    url.trim_end_matches('/') == base || url.starts_with(&format!("{}/", base))
}

/// Scheme and authority of a URL, e.g. `https://es.ninemanga.com`
pub fn origin(url: &str) -> Result<String> {
    Url::parse(url)
        .map(|u| u.origin().ascii_serialization())
        .map_err(|e| MangaError::InvalidArgument(format!("bad url {}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_url_keeps_structure() {
        assert_eq!(
            quote_url("https://cdn.example/a b/ñ.jpg"),
            "https://cdn.example/a%20b/%C3%B1.jpg"
        );
        assert_eq!(quote_url("https://x/already%20done"), "https://x/already%20done");
        assert_eq!(quote_url("https://x/p?a=1"), "https://x/p%3Fa%3D1");
    }

    #[test]
    fn test_absolute() {
        assert_eq!(absolute("https://a.example", "/manga/x"), "https://a.example/manga/x");
        assert_eq!(absolute("https://a.example/dir/", "page"), "https://a.example/dir/page");
        assert_eq!(absolute("https://a.example", " https://b.example/x "), "https://b.example/x");
    }

    #[test]
    fn test_is_under_matches_whole_authority() {
        assert!(is_under("https://mangabuddy.com", "https://mangabuddy.com/one-piece"));
        assert!(is_under("https://mangabuddy.com/", "https://mangabuddy.com/one-piece"));
        assert!(!is_under("https://mangabuddy.com", "https://mangabuddy.com.evil.example/x"));
        assert!(is_under("https://mangabuddy.com", "https://mangabuddy.com"));
    }

    #[test]
    fn test_origin() {
        assert_eq!(origin("https://es.ninemanga.com/chapter/x/1.html").unwrap(), "https://es.ninemanga.com");
        assert_eq!(origin("https://es.ninemanga.com").unwrap(), "https://es.ninemanga.com");
        assert_eq!(origin("https://es.ninemanga.com:8443/x").unwrap(), "https://es.ninemanga.com:8443");
        assert!(origin("not a url").unwrap_err().is_usage());
    }

    #[test]
    fn test_find_reports_missing_selector() {
        let doc = Html::parse_document("<div class='a'><span>x</span></div>");
        assert!(find("Test", &doc, "div.a span").is_ok());
        let err = find("Test", &doc, "div.b").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response from Test: missing `div.b`");
    }

    #[test]
    fn test_text_collapses_whitespace() {
        let doc = Html::parse_document("<p id='t'>  Chapter\u{a0}1\n  <b>End</b> </p>");
        let p = find("Test", &doc, "p#t").unwrap();
        assert_eq!(text(p), "Chapter 1 End");
    }
}
