use reqwest::header::HeaderMap;
use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::{MangaError, Result};
use crate::helpers::{attr, find, find_in, regex, selector, text};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "MangaBuddy";
const BASE_URL: &str = "https://mangabuddy.com";
const IMAGE_CDN: &str = "https://s1.mbcdnv1.xyz/file/img-mbuddy/manga/";
const LANGUAGES: &[Language] = &[Language::En];

/// MangaBuddy serves images and covers only with its own referer
pub struct MangaBuddy {
    client: Arc<HttpClient>,
}

impl MangaBuddy {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Chapter list endpoint for a manga page URL
    pub fn chapters_api_url(manga_url: &str) -> String {
        let path = manga_url.strip_prefix(BASE_URL).unwrap_or(manga_url);
        format!("{}/api/manga{}/chapters?source=detail", BASE_URL, path)
    }
}

pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let card_selector = selector("div.book-item")?;
    let anchor_selector = selector("a")?;

    let mut results = Vec::new();
    for card in document.select(&card_selector) {
        let anchor = match card.select(&anchor_selector).next() {
            Some(anchor) => anchor,
            None => continue,
        };
        let img = find_in(NAME, card, "img")?;
        results.push(Manga::new(
            format!("{}{}", BASE_URL, attr(NAME, anchor, "href")?.trim()),
            attr(NAME, anchor, "title")?.trim(),
            Some(attr(NAME, img, "data-src")?.trim().to_string()),
        ));
    }
    Ok(results)
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "ul#chapter-list")?;
    let item_selector = selector("li")?;

    let mut chapters = Vec::new();
    for item in list.select(&item_selector) {
        let anchor = find_in(NAME, item, "a")?;
        let title = find_in(NAME, item, "strong.chapter-title")?;
        chapters.push(Chapter::new(
            format!("{}{}", BASE_URL, attr(NAME, anchor, "href")?.trim()),
            text(title),
        ));
    }
    Ok(chapters)
}

pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let pattern = regex(r"var chapImages = '(.*)'")?;
    let list = pattern
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| MangaError::upstream(NAME, "missing `chapImages`"))?;
    Ok(list
        .as_str()
        .split(',')
        .map(str::trim)
        .filter(|img| !img.is_empty())
        .map(|img| {
            if img.starts_with("https://") || img.starts_with("http://") {
                ChapterImage::new(img)
            } else {
                ChapterImage::new(format!("{}{}", IMAGE_CDN, img))
            }
        })
        .collect())
}

impl Site for MangaBuddy {
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
            let url = format!("{}/search", BASE_URL);
            let page = self.client.get_with(&url, &[("q", query.as_str())], HeaderMap::new())?;
            parse_search(&page.body)
        })
    }

    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter> {
        let url = Self::chapters_api_url(&manga.url);
        lazy(move || parse_chapters(&self.client.get(&url)?.body))
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let url = chapter.url.clone();
        lazy(move || parse_images(&self.client.get(&url)?.body))
    }

    fn download_image(&self, image: &ChapterImage) -> Result<Vec<u8>> {
        self.client.get_bytes(&image.url, Some(BASE_URL))
    }

    fn download_cover(&self, manga: &Manga) -> Result<Vec<u8>> {
        let cover = manga
            .cover
            .as_deref()
            .ok_or_else(|| MangaError::InvalidArgument(format!("{} has no cover", manga.url)))?;
        self.client.get_bytes(cover, Some(BASE_URL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapters_api_url() {
        assert_eq!(
            MangaBuddy::chapters_api_url("https://mangabuddy.com/the-beginning-after-the-end"),
            "https://mangabuddy.com/api/manga/the-beginning-after-the-end/chapters?source=detail"
        );
    }

    #[test]
    fn test_parse_search_skips_cards_without_link() {
        let html = r#"
            <div class="book-item"><img data-src="x.jpg"/></div>
            <div class="book-item">
              <a href="/tbate" title=" TBATE "><img data-src=" https://thumb.mbcdn/tbate.png "/></a>
            </div>"#;
        let mangas = parse_search(html).unwrap();
        assert_eq!(mangas.len(), 1);
        assert_eq!(mangas[0].url, "https://mangabuddy.com/tbate");
        assert_eq!(mangas[0].name, "TBATE");
        assert_eq!(mangas[0].cover.as_deref(), Some("https://thumb.mbcdn/tbate.png"));
    }

    #[test]
    fn test_parse_chapters() {
        let html = r#"
            <ul id="chapter-list">
              <li><a href="/tbate/chapter-175"><div><strong class="chapter-title">Chapter 175</strong></div></a></li>
            </ul>"#;
        let chapters = parse_chapters(html).unwrap();
        assert_eq!(chapters[0].url, "https://mangabuddy.com/tbate/chapter-175");
        assert_eq!(chapters[0].name, "Chapter 175");
    }

    #[test]
    fn test_parse_images_prefixes_relative_entries() {
        let html = "<script>var chapImages = 'tbate/175/01.jpg,https://cdn.example/02.jpg'</script>";
        let urls: Vec<String> = parse_images(html).unwrap().into_iter().map(|i| i.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://s1.mbcdnv1.xyz/file/img-mbuddy/manga/tbate/175/01.jpg",
                "https://cdn.example/02.jpg"
            ]
        );
        assert!(parse_images("<html></html>").is_err());
    }
}
