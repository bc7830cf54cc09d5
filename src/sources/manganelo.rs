use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::Result;
use crate::helpers::{attr, find, find_in, quote_url, selector, text};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "Manganelo";
const BASE_URL: &str = "https://ww5.manganelo.tv";
const LANGUAGES: &[Language] = &[Language::En];

pub struct Manganelo {
    client: Arc<HttpClient>,
}

impl Manganelo {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

/// Site paths are root-relative (`/manga/...`)
fn site_path(path: &str) -> String {
    format!("{}/{}", BASE_URL, path.trim().trim_start_matches('/'))
}

pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let card_selector = selector("div.search-story-item")?;

    let mut results = Vec::new();
    for card in document.select(&card_selector) {
        let anchor = find_in(NAME, card, "a")?;
        let img = find_in(NAME, card, "img")?;
        results.push(Manga::new(
            site_path(&attr(NAME, anchor, "href")?),
            attr(NAME, anchor, "title")?.trim(),
            Some(site_path(&attr(NAME, img, "src")?)),
        ));
    }
    Ok(results)
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let item_selector = selector("li.a-h")?;

    let mut chapters = Vec::new();
    for item in document.select(&item_selector) {
        let anchor = find_in(NAME, item, "a")?;
        chapters.push(Chapter::new(site_path(&attr(NAME, anchor, "href")?), text(anchor)));
    }
    Ok(chapters)
}

pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let reader = find(NAME, &document, "div.container-chapter-reader")?;
    let img_selector = selector("img")?;

    reader
        .select(&img_selector)
        .map(|img| Ok(ChapterImage::new(quote_url(attr(NAME, img, "data-src")?.trim()))))
        .collect()
}

impl Site for Manganelo {
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
        let url = format!("{}/search/{}", BASE_URL, urlencoding::encode(query));
        lazy(move || parse_search(&self.client.get(&url)?.body))
    }

    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter> {
        let url = manga.url.clone();
        lazy(move || parse_chapters(&self.client.get(&url)?.body))
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let url = chapter.url.clone();
        lazy(move || parse_images(&self.client.get(&url)?.body))
    }
}
