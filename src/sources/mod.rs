//! Site adapters, one module per manga source.
//!
//! Every adapter implements [`Site`]. Listing methods hand back lazy
//! [`Items`]: nothing is requested until the first item is pulled, and later
//! result pages are fetched only when the consumer reaches them. An `Err`
//! item ends the sequence; adapters never return partial results on failure.

use std::collections::VecDeque;

use crate::error::{MangaError, Result};
use crate::helpers;
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

pub mod asurascans;
pub mod heavenmanga;
pub mod kissmanga;
pub mod mangabuddy;
pub mod manganelo;
pub mod mangatigre;
pub mod manhuako;
pub mod ninemanga;
pub mod tmo;
pub mod wiemanga;

/// Upper bound of extra search result pages any adapter will follow
pub const MAX_SEARCH_PAGES: usize = 4;

/// Upper bound of chapter list pages any adapter will follow
pub const MAX_CHAPTER_PAGES: usize = 30;

/// Lazy, fallible sequence produced by an adapter
pub type Items<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Uniform contract over one external manga source
pub trait Site: Send + Sync {
    fn name(&self) -> &str;

    fn base_url(&self) -> &str;

    fn supported_languages(&self) -> &[Language];

    /// Shared HTTP session used by the default download methods
    fn client(&self) -> &HttpClient;

    fn search(&self, query: &str, lang: Option<Language>) -> Items<'_, Manga>;

    /// Chapters in the order the site lists them
    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter>;

    /// Pages in reading order, exactly as the site presents them
    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage>;

    fn download_image(&self, image: &ChapterImage) -> Result<Vec<u8>> {
        self.client().get_bytes(&image.url, image.referer.as_deref())
    }

    fn download_cover(&self, manga: &Manga) -> Result<Vec<u8>> {
        let cover = manga
            .cover
            .as_deref()
            .ok_or_else(|| MangaError::InvalidArgument(format!("{} has no cover", manga.url)))?;
        self.client().get_bytes(cover, None)
    }

    /// `true` if the URL belongs to this site's domain
    fn owns_url(&self, url: &str) -> bool {
        helpers::is_under(self.base_url(), url)
    }
}

/// Validate the requested language against what a site serves.
///
/// Multi-language sites require an explicit language; single-language sites
/// default to their only one.
pub fn resolve_language(site: &str, supported: &[Language], lang: Option<Language>) -> Result<Language> {
    match (lang, supported) {
        (Some(lang), _) if supported.contains(&lang) => Ok(lang),
        (Some(lang), _) => Err(MangaError::InvalidArgument(format!(
            "{} does not support language {}",
            site, lang
        ))),
        (None, [only]) => Ok(*only),
        (None, _) => Err(MangaError::InvalidArgument(format!("{} needs a language", site))),
    }
}

/// Sequence that yields a single error
pub fn fail<'a, T: 'a>(error: MangaError) -> Items<'a, T> {
    Box::new(std::iter::once(Err(error)))
}

/// Defer a single-request fetch until the first item is pulled.
pub fn lazy<'a, T, F>(fetch: F) -> Items<'a, T>
where
    T: 'a,
    F: FnOnce() -> Result<Vec<T>> + 'a,
{
    paged(move || fetch().map(|items| (items, Vec::new())), |_: &str| Ok(Vec::new()))
}

/// First page plus further page URLs, each fetched on demand with `next_page`.
pub fn paged<'a, T, F, N>(first: F, next_page: N) -> Items<'a, T>
where
    T: 'a,
    F: FnOnce() -> Result<(Vec<T>, Vec<String>)> + 'a,
    N: FnMut(&str) -> Result<Vec<T>> + 'a,
{
    Box::new(Paged {
        first: Some(Box::new(first)),
        next_page: Box::new(next_page),
        pending: VecDeque::new(),
        current: Vec::new().into_iter(),
        done: false,
    })
}

struct Paged<'a, T> {
    first: Option<Box<dyn FnOnce() -> Result<(Vec<T>, Vec<String>)> + 'a>>,
    next_page: Box<dyn FnMut(&str) -> Result<Vec<T>> + 'a>,
    pending: VecDeque<String>,
    current: std::vec::IntoIter<T>,
    done: bool,
}

impl<T> Iterator for Paged<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(first) = self.first.take() {
            match first() {
                Ok((items, pages)) => {
                    self.current = items.into_iter();
                    self.pending = pages.into();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        loop {
            if let Some(item) = self.current.next() {
                return Some(Ok(item));
            }
            let url = match self.pending.pop_front() {
                Some(url) => url,
                None => {
                    self.done = true;
                    return None;
                }
            };
            match (self.next_page)(&url) {
                Ok(items) => self.current = items.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_lazy_does_not_fetch_until_pulled() {
        let calls = Cell::new(0);
        let mut items = lazy(|| {
            calls.set(calls.get() + 1);
            Ok(vec![1, 2])
        });
        assert_eq!(calls.get(), 0);
        assert_eq!(items.next().unwrap().unwrap(), 1);
        assert_eq!(items.next().unwrap().unwrap(), 2);
        assert!(items.next().is_none());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_paged_fetches_pages_in_order_on_demand() {
        let fetched = Cell::new(0);
        let items = paged(
            || Ok((vec!["a1".to_string()], vec!["p2".to_string(), "p3".to_string()])),
            |url: &str| {
                fetched.set(fetched.get() + 1);
                Ok(vec![format!("{}-item", url)])
            },
        );
        let mut items = items;
        assert_eq!(items.next().unwrap().unwrap(), "a1");
        assert_eq!(fetched.get(), 0);
        let rest: Vec<String> = items.map(|r| r.unwrap()).collect();
        assert_eq!(rest, vec!["p2-item", "p3-item"]);
        assert_eq!(fetched.get(), 2);
    }

    #[test]
    fn test_failed_page_aborts_sequence() {
        let items = paged(
            || Ok((vec![1], vec!["bad".to_string(), "never".to_string()])),
            |url: &str| {
                if url == "bad" {
                    Err(MangaError::upstream("Test", "broken page"))
                } else {
                    Ok(vec![99])
                }
            },
        );
        let collected: Result<Vec<i32>> = items.collect();
        assert!(collected.is_err());
    }

    #[test]
    fn test_resolve_language() {
        let multi = [Language::En, Language::Es];
        assert_eq!(resolve_language("S", &multi, Some(Language::Es)).unwrap(), Language::Es);
        assert!(resolve_language("S", &multi, None).unwrap_err().is_usage());
        assert!(resolve_language("S", &multi, Some(Language::Ru)).unwrap_err().is_usage());
        assert_eq!(resolve_language("S", &[Language::De], None).unwrap(), Language::De);
    }
}
