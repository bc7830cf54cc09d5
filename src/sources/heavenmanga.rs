use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use scraper::Html;
use serde::Deserialize;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::{MangaError, Result};
use crate::helpers::{attr, regex, selector};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "HeavenManga";
const BASE_URL: &str = "https://heavenmanga.com";
const LANGUAGES: &[Language] = &[Language::Es];

/// DataTables request the chapter table issues, newest first
const CHAPTER_TABLE_PARAMS: &str = "draw=1&columns[0][data]=number&columns[0][name]=number\
&columns[0][searchable]=true&columns[0][orderable]=true&columns[0][search][value]=\
&columns[0][search][regex]=false&columns[1][data]=created_at&columns[1][name]=created_at\
&columns[1][searchable]=false&columns[1][orderable]=true&columns[1][search][value]=\
&columns[1][search][regex]=false&order[0][column]=1&order[0][dir]=desc&start=0\
&search[value]=&search[regex]=false";

pub struct HeavenManga {
    client: Arc<HttpClient>,
}

impl HeavenManga {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ChapterTable {
    data: Vec<ChapterRow>,
}

#[derive(Debug, Deserialize)]
struct ChapterRow {
    slug: serde_json::Value,
    id: serde_json::Value,
}

/// Numbers and strings both show up in the table rows
fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let card_selector = selector("div.c-tabs-item")?;
    let anchor_selector = selector("a")?;
    let img_selector = selector("img")?;

    let mut results = Vec::new();
    for card in document.select(&card_selector) {
        let anchor = match card.select(&anchor_selector).next() {
            Some(anchor) => anchor,
            None => continue,
        };
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
    Ok(results)
}

pub fn parse_chapters(json: &str) -> Result<Vec<Chapter>> {
    let table: ChapterTable = serde_json::from_str(json)
        .map_err(|e| MangaError::upstream(NAME, format!("bad chapter table: {}", e)))?;
    Ok(table
        .data
        .iter()
        .map(|row| {
            Chapter::new(
                format!("{}/manga/leer/{}", BASE_URL, plain(&row.id)),
                format!("Capítulo {}", plain(&row.slug)),
            )
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(rename = "imgURL")]
    img_url: String,
}

/// Image URLs from the `pUrl` script array, in reading order.
/// The array is a JS literal, so it is read as JSON5.
pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let array = regex(r"(?m)var pUrl=(.*?);\s*(?:var\s|</script>|$)")?
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| MangaError::upstream(NAME, "missing `pUrl`"))?;
    let entries: Vec<PageEntry> = json5::from_str(array.as_str())
        .map_err(|e| MangaError::upstream(NAME, format!("bad `pUrl` literal: {}", e)))?;
    Ok(entries
        .into_iter()
        .map(|entry| ChapterImage::new(entry.img_url.trim()))
        .collect())
}

impl Site for HeavenManga {
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
            let url = format!("{}/buscar", BASE_URL);
            let page = self.client.get_with(&url, &[("query", query.as_str())], HeaderMap::new())?;
            parse_search(&page.body)
        })
    }

    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter> {
        let url = manga.url.clone();
        lazy(move || {
            let mut headers = HeaderMap::new();
            headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
            let referer = HeaderValue::from_str(&url)
                .map_err(|_| MangaError::InvalidArgument(format!("bad manga url {}", url)))?;
            headers.insert(REFERER, referer);
            let table_url = format!("{}?{}", url, CHAPTER_TABLE_PARAMS);
            let page = self.client.get_with(&table_url, &[], headers)?;
            parse_chapters(&page.body)
        })
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let url = chapter.url.clone();
        lazy(move || parse_images(&self.client.get(&url)?.body))
    }
}
