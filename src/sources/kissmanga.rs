use reqwest::header::HeaderMap;
use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::{MangaError, Result};
use crate::helpers::{attr, find, find_in, selector};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "KissManga";
const BASE_URL: &str = "http://kissmanga.nl";
const LANGUAGES: &[Language] = &[Language::En];

pub struct KissManga {
    client: Arc<HttpClient>,
}

impl KissManga {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let card_selector = selector("div.mainpage-manga")?;

    let mut results = Vec::new();
    for card in document.select(&card_selector) {
        let anchor = find_in(NAME, card, "div.media-body a")?;
        let img = find_in(NAME, card, "img")?;
        results.push(Manga::new(
            attr(NAME, anchor, "href")?.trim(),
            attr(NAME, anchor, "title")?.trim(),
            Some(attr(NAME, img, "src")?.trim().to_string()),
        ));
    }
    Ok(results)
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    // the first list is the "latest" teaser, the full list comes second
    let list_selector = selector("div.chapter-list")?;
    let list = document
        .select(&list_selector)
        .nth(1)
        .ok_or_else(|| MangaError::upstream(NAME, "missing second `div.chapter-list`"))?;
    let heading_selector = selector("h4")?;

    let mut chapters = Vec::new();
    for heading in list.select(&heading_selector) {
        let anchor = find_in(NAME, heading, "a")?;
        chapters.push(Chapter::new(
            attr(NAME, anchor, "href")?.trim(),
            attr(NAME, anchor, "title")?.trim(),
        ));
    }
    Ok(chapters)
}

pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let data = find(NAME, &document, "p#arraydata")?;
    Ok(data
        .text()
        .collect::<String>()
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(ChapterImage::new)
        .collect())
}

impl Site for KissManga {
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
        let url = manga.url.clone();
        lazy(move || parse_chapters(&self.client.get(&url)?.body))
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let url = chapter.url.clone();
        lazy(move || parse_images(&self.client.get(&url)?.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let html = r#"
            <div class="mainpage-manga">
              <div class="media-left"><img src="http://kissmanga.nl/covers/berserk.jpg"/></div>
              <div class="media-body"><a href="http://kissmanga.nl/manga/berserk" title="Berserk">Berserk</a></div>
            </div>"#;
        let mangas = parse_search(html).unwrap();
        assert_eq!(
            mangas,
            vec![Manga::new(
                "http://kissmanga.nl/manga/berserk",
                "Berserk",
                Some("http://kissmanga.nl/covers/berserk.jpg".into())
            )]
        );
    }

    #[test]
    fn test_parse_chapters_uses_second_list() {
        let html = r#"
            <div class="chapter-list"><h4><a href="http://kissmanga.nl/latest" title="Latest">x</a></h4></div>
            <div class="chapter-list">
              <h4><a href="http://kissmanga.nl/berserk/2" title=" Berserk 2 ">2</a></h4>
              <h4><a href="http://kissmanga.nl/berserk/1" title="Berserk 1">1</a></h4>
            </div>"#;
        let chapters = parse_chapters(html).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].name, "Berserk 2");
        assert!(parse_chapters(r#"<div class="chapter-list"></div>"#).is_err());
    }

    #[test]
    fn test_parse_images_keeps_array_order() {
        let html = r#"<p id="arraydata" style="display:none">https://i/3.jpg,https://i/1.jpg, https://i/2.jpg,</p>"#;
        let urls: Vec<String> = parse_images(html).unwrap().into_iter().map(|i| i.url).collect();
        assert_eq!(urls, vec!["https://i/3.jpg", "https://i/1.jpg", "https://i/2.jpg"]);
    }
}
