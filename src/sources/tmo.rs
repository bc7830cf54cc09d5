use reqwest::header::HeaderMap;
use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::{MangaError, Result};
use crate::helpers::{attr, find, find_in, quote_url, selector, text};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "TuMangaOnline";
const BASE_URL: &str = "https://lectortmo.com";
const LANGUAGES: &[Language] = &[Language::Es];

/// TuMangaOnline - images are only served with the chapter page as referer
pub struct TuMangaOnline {
    client: Arc<HttpClient>,
}

impl TuMangaOnline {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

/// Cover URL embedded in a card's inline `<style>` as `url('...')`
fn cover_from_style(style: &str) -> Option<String> {
    let start = style.find("url('")? + "url('".len();
    let end = style[start..].find("')")? + start;
    Some(style[start..end].trim().to_string())
}

pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let card_selector = selector("div.element")?;
    let style_selector = selector("style")?;

    let mut results = Vec::new();
    for card in document.select(&card_selector) {
        let heading = find_in(NAME, card, "div.thumbnail-title h4")?;
        let anchor = find_in(NAME, card, "a")?;
        let cover = card
            .select(&style_selector)
            .next()
            .and_then(|style| cover_from_style(&style.text().collect::<String>()));
        results.push(Manga::new(
            attr(NAME, anchor, "href")?.trim(),
            attr(NAME, heading, "title")?.trim(),
            cover,
        ));
    }
    Ok(results)
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "div#chapters")?;
    let item_selector = selector("li.list-group-item.upload-link")?;

    let mut chapters = Vec::new();
    for item in list.select(&item_selector) {
        let name = text(find_in(NAME, item, "a")?);
        let link = find_in(NAME, item, "a.btn.btn-default.btn-sm")?;
        chapters.push(Chapter::new(attr(NAME, link, "href")?.trim(), name));
    }
    Ok(chapters)
}

/// Link to the single-page ("cascade") reader, when the chapter opened in paged mode
pub fn cascade_link(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let cascade = selector("a[title=\"Cascada\"]")?;
    Ok(document
        .select(&cascade)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string()))
}

pub fn parse_images(html: &str, chapter_url: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let viewer = find(NAME, &document, "div.viewer-container.container")?;
    let img_selector = selector("img")?;

    viewer
        .select(&img_selector)
        .map(|img| {
            let src = attr(NAME, img, "data-src")?;
            Ok(ChapterImage::with_referer(quote_url(src.trim()), chapter_url))
        })
        .collect()
}

impl Site for TuMangaOnline {
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
        lazy(move || {
            let url = format!("{}/library", BASE_URL);
            let page = self
                .client
                .get_with(&url, &[("_pg", "1"), ("title", query.as_str())], HeaderMap::new())?;
            parse_search(&page.body)
        })
    }

    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter> {
        let url = manga.url.clone();
        lazy(move || parse_chapters(&self.client.get(&url)?.body))
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let chapter_url = chapter.url.clone();
        lazy(move || {
            let mut page = self.client.get(&chapter_url)?;
            if let Some(cascade) = cascade_link(&page.body)? {
                page = self.client.get(&cascade)?;
            }
            parse_images(&page.body, &chapter_url)
        })
    }

    fn download_image(&self, image: &ChapterImage) -> Result<Vec<u8>> {
        let referer = image
            .referer
            .as_deref()
            .ok_or_else(|| MangaError::upstream(NAME, format!("{} has no chapter referer", image.url)))?;
        self.client.get_bytes(&image.url, Some(referer))
    }
}
