use scraper::Html;
use serde::Deserialize;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::{MangaError, Result};
use crate::helpers::{attr, find, quote_url, selector, text};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "Manga Tigre";
const BASE_URL: &str = "https://www.mangatigre.net";
const COVER_CDN: &str = "https://i2.mtcdn.xyz/mangas";
const LANGUAGES: &[Language] = &[Language::Es];

/// Manga Tigre guards search and chapter listing behind CSRF tokens
pub struct MangaTigre {
    client: Arc<HttpClient>,
}

impl MangaTigre {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    slug: String,
    name: String,
    image: String,
}

pub fn search_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let input = find(NAME, &document, "div.input-group input")?;
    attr(NAME, input, "data-csrf")
}

pub fn parse_search(json: &str) -> Result<Vec<Manga>> {
    let response: SearchResponse = serde_json::from_str(json)
        .map_err(|e| MangaError::upstream(NAME, format!("bad search response: {}", e)))?;
    Ok(response
        .result
        .into_iter()
        .map(|entry| {
            Manga::new(
                format!("{}/manga/{}", BASE_URL, entry.slug),
                entry.name,
                Some(format!("{}/{}", COVER_CDN, entry.image)),
            )
        })
        .collect())
}

pub fn chapters_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let button = find(NAME, &document, "button.btn-load-more-chapters")?;
    attr(NAME, button, "data-token")
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "ul.list-unstyled")?;
    let anchor_selector = selector("li a")?;
    list.select(&anchor_selector)
        .map(|a| Ok(Chapter::new(attr(NAME, a, "href")?.trim(), text(a))))
        .collect()
}

/// Token of the "all pages" reading mode button, present while the chapter
/// is shown one page at a time
pub fn read_type_token(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let button = selector(r#"button[data-read-type="2"]"#)?;
    match document.select(&button).next() {
        Some(el) => Ok(Some(attr(NAME, el, "data-token")?)),
        None => Ok(None),
    }
}

pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let zone = find(NAME, &document, "div.display-zone")?;
    let img_selector = selector("img")?;
    zone.select(&img_selector)
        .map(|img| {
            let src = match img.value().attr("data-src") {
                Some(src) if !src.trim().is_empty() => src.trim().to_string(),
                _ => attr(NAME, img, "src")?.trim().to_string(),
            };
            Ok(ChapterImage::new(quote_url(&format!("https:{}", src))))
        })
        .collect()
}

impl Site for MangaTigre {
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
            let token = search_token(&self.client.get(BASE_URL)?.body)?;
            let url = format!("{}/mangas/search", BASE_URL);
            let response = self
                .client
                .post_form(&url, &[("query", query.as_str()), ("_token", token.as_str())])?;
            parse_search(&response.body)
        })
    }

    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter> {
        let url = manga.url.clone();
        lazy(move || {
            let token = chapters_token(&self.client.get(&url)?.body)?;
            let page = self.client.post_form(&url, &[("_token", token.as_str())])?;
            parse_chapters(&page.body)
        })
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let url = chapter.url.clone();
        lazy(move || {
            let mut page = self.client.get(&url)?;
            if let Some(token) = read_type_token(&page.body)? {
                let read_type_url = format!("{}/read-type", page.url);
                page = self.client.post_form(
                    &read_type_url,
                    &[("_method", "patch"), ("_token", token.as_str()), ("read_type", "2")],
                )?;
            }
            parse_images(&page.body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_token_and_results() {
        let home = r#"<div class="input-group"><input type="text" data-csrf="tok123"/></div>"#;
        assert_eq!(search_token(home).unwrap(), "tok123");

        let json = r#"{"result":[{"slug":"one-piece","name":"One Piece","image":"one-piece.jpg","type":"manga"}]}"#;
        let mangas = parse_search(json).unwrap();
        assert_eq!(mangas[0].url, "https://www.mangatigre.net/manga/one-piece");
        assert_eq!(mangas[0].cover.as_deref(), Some("https://i2.mtcdn.xyz/mangas/one-piece.jpg"));
        assert!(parse_search("<html>").is_err());
    }

    #[test]
    fn test_chapters() {
        let detail = r#"<button class="btn btn-load-more-chapters" data-token="abc">Más</button>"#;
        assert_eq!(chapters_token(detail).unwrap(), "abc");

        let html = r#"
            <ul class="list-unstyled">
              <li><a href="https://www.mangatigre.net/manga/one-piece/1001"> One Piece 1001 </a></li>
              <li><a href="https://www.mangatigre.net/manga/one-piece/1000">One Piece 1000</a></li>
            </ul>"#;
        let chapters = parse_chapters(html).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].name, "One Piece 1001");
    }

    #[test]
    fn test_read_type_button() {
        let paged = r#"<button data-read-type="2" data-token="xyz">Cascada</button>"#;
        assert_eq!(read_type_token(paged).unwrap().as_deref(), Some("xyz"));
        assert_eq!(read_type_token("<div></div>").unwrap(), None);
    }

    #[test]
    fn test_parse_images_prefers_data_src() {
        let html = r#"
            <div class="display-zone">
              <img data-src="//i2.mtcdn.xyz/ch/1 a.jpg" src="//placeholder.gif"/>
              <img src="//i2.mtcdn.xyz/ch/2.jpg"/>
            </div>"#;
        let urls: Vec<String> = parse_images(html).unwrap().into_iter().map(|i| i.url).collect();
        assert_eq!(urls, vec!["https://i2.mtcdn.xyz/ch/1%20a.jpg", "https://i2.mtcdn.xyz/ch/2.jpg"]);
    }
}
