use reqwest::header::HeaderMap;
use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::Result;
use crate::helpers::{attr, find, find_in, selector, text};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "Asura Scans";
const BASE_URL: &str = "https://www.asurascans.com";
const LANGUAGES: &[Language] = &[Language::En];

/// Asura Scans - WordPress reader theme
pub struct AsuraScans {
    client: Arc<HttpClient>,
}

impl AsuraScans {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "div.listupd")?;
    let card_selector = selector("div.bs")?;
    let img_selector = selector("img")?;

    let mut results = Vec::new();
    for card in list.select(&card_selector) {
        let anchor = find_in(NAME, card, "a")?;
        let cover = anchor
            .select(&img_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| src.trim().to_string());
        results.push(Manga::new(
            attr(NAME, anchor, "href")?.trim(),
            attr(NAME, anchor, "title")?.trim(),
            cover,
        ));
    }
    log::debug!("AsuraScans: Found {} manga", results.len());
    Ok(results)
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "div#chapterlist")?;
    let item_selector = selector("li")?;

    let mut chapters = Vec::new();
    for item in list.select(&item_selector) {
        let anchor = find_in(NAME, item, "a")?;
        let title = text(find_in(NAME, anchor, "span.chapternum")?);
        chapters.push(Chapter::new(attr(NAME, anchor, "href")?.trim(), title));
    }
    log::debug!("AsuraScans: Found {} chapters", chapters.len());
    Ok(chapters)
}

pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let reader = find(NAME, &document, "div#readerarea")?;
    let paragraph_selector = selector("p")?;
    let img_selector = selector("img")?;

    let mut images = Vec::new();
    for paragraph in reader.select(&paragraph_selector) {
        if let Some(img) = paragraph.select(&img_selector).next() {
            images.push(ChapterImage::new(attr(NAME, img, "src")?.trim()));
        }
    }
    Ok(images)
}

impl Site for AsuraScans {
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
            let page = self.client.get_with(BASE_URL, &[("s", query.as_str())], HeaderMap::new())?;
            parse_search(&page.body)
        })
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
