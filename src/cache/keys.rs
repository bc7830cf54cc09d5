//! Deterministic cache keys.

use sha2::{Digest, Sha256};

use crate::models::Language;

/// Short stable digest of a query string
pub fn fingerprint(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Key for one search: site, language and query all take part.
pub fn search_key(lang: Language, site_url: &str, query: &str) -> String {
    format!("search:{}|{}|{}", lang.code(), site_url, fingerprint(query))
}

pub fn chapters_key(manga_url: &str) -> String {
    format!("chapters:{}", manga_url)
}

pub fn images_key(chapter_url: &str) -> String {
    format!("images:{}", chapter_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("one piece"), fingerprint("one piece"));
        assert_ne!(fingerprint("one piece"), fingerprint("one piece "));
        assert_eq!(fingerprint("").len(), 16);
    }

    #[test]
    fn test_search_keys_do_not_collide() {
        let base = search_key(Language::En, "https://ninemanga.com", "naruto");
        assert_ne!(base, search_key(Language::Es, "https://ninemanga.com", "naruto"));
        assert_ne!(base, search_key(Language::En, "https://mangabuddy.com", "naruto"));
        assert_ne!(base, search_key(Language::En, "https://ninemanga.com", "bleach"));
        assert!(base.starts_with("search:en|https://ninemanga.com|"));
    }

    #[test]
    fn test_list_keys() {
        assert_eq!(chapters_key("https://x/m"), "chapters:https://x/m");
        assert_eq!(images_key("https://x/c"), "images:https://x/c");
    }
}
