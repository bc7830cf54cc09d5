use reqwest::header::HeaderMap;
use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, paged, resolve_language, Items, Site, MAX_CHAPTER_PAGES};
use crate::error::{MangaError, Result};
use crate::helpers::{attr, find, find_in, quote_url, selector, text};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "ManhuaKO";
const BASE_URL: &str = "https://manhuako.com";
const LANGUAGES: &[Language] = &[Language::Es];
const PAGE_DELAY_MS: u64 = 100;

pub struct ManhuaKo {
    client: Arc<HttpClient>,
}

impl ManhuaKo {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

/// Search cards, skipping novels
pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let card_selector = selector("div.card")?;
    let type_selector = selector("p.type")?;

    let mut results = Vec::new();
    for card in document.select(&card_selector) {
        let kind = card.select(&type_selector).next().map(text).unwrap_or_default();
        if kind == "Novela" {
            continue;
        }
        let anchor = find_in(NAME, card, "a.white-text")?;
        let img = find_in(NAME, card, "img")?;
        results.push(Manga::new(
            attr(NAME, anchor, "href")?.trim(),
            text(anchor),
            Some(attr(NAME, img, "src")?.trim().to_string()),
        ));
    }
    Ok(results)
}

/// Only the second result page is ever followed
pub fn second_search_page(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let link_selector = selector("ul.pagination a")?;
    Ok(document
        .select(&link_selector)
        .nth(1)
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string()))
}

/// Number of the last chapter list page, from the last pagination link
pub fn last_chapter_page(html: &str) -> Result<Option<usize>> {
    let document = Html::parse_document(html);
    let link_selector = selector("ul.pagination a")?;
    let last = match document.select(&link_selector).last() {
        Some(a) => attr(NAME, a, "href")?,
        None => return Ok(None),
    };
    let number = last.trim().trim_matches('/').rsplit('/').next().unwrap_or_default();
    number
        .parse()
        .map(Some)
        .map_err(|_| MangaError::upstream(NAME, format!("bad pagination link `{}`", last)))
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let table = find(NAME, &document, "table.table-chapters")?;
    let row_selector = selector("tr")?;
    let anchor_selector = selector("a")?;

    let mut chapters = Vec::new();
    for row in table.select(&row_selector) {
        // header rows carry no link
        if let Some(anchor) = row.select(&anchor_selector).next() {
            chapters.push(Chapter::new(attr(NAME, anchor, "href")?.trim(), text(anchor)));
        }
    }
    Ok(chapters)
}

pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let screen = find(NAME, &document, "div#pantallaCompleta")?;
    let img_selector = selector("img")?;
    screen
        .select(&img_selector)
        .map(|img| Ok(ChapterImage::new(quote_url(attr(NAME, img, "src")?.trim()))))
        .collect()
}

impl Site for ManhuaKo {
    fn name(&self) -> &str {
        NAME
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn supported_languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn client(&self) -> &HttpClient {
        &self.client
    }

    fn search(&self, query: &str, lang: Option<Language>) -> Items<'_, Manga> {
        if let Err(e) = resolve_language(NAME, LANGUAGES, lang) {
            return fail(e);
        }
        if query.trim().is_empty() {
            return Box::new(std::iter::empty());
        }
        let query = query.to_string();
        paged(
            move || {
                let url = format!("{}/home/search", BASE_URL);
                let page = self.client.get_with(&url, &[("mq", query.as_str())], HeaderMap::new())?;
                let next = second_search_page(&page.body)?;
                Ok((parse_search(&page.body)?, next.into_iter().collect()))
            },
            move |url: &str| parse_search(&self.client.get(url)?.body),
        )
    }

    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter> {
        let url = manga.url.clone();
        let base = url.trim_end_matches('/').to_string();
        paged(
            move || {
                let page = self.client.get(&url)?;
                let last = last_chapter_page(&page.body)?.unwrap_or(1).min(MAX_CHAPTER_PAGES);
                let pages = (2..=last).map(|n| format!("{}/page/{}", base, n)).collect();
                Ok((parse_chapters(&page.body)?, pages))
            },
            move |url: &str| {
                self.client.pause(PAGE_DELAY_MS);
                parse_chapters(&self.client.get(url)?.body)
            },
        )
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let url = chapter.url.clone();
        lazy(move || parse_images(&self.client.get(&url)?.body))
    }
}
