use reqwest::header::HeaderMap;
use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, resolve_language, Items, Site};
use crate::error::Result;
use crate::helpers::{attr, find, find_in, selector};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "WieManga";
const BASE_URL: &str = "https://wiemanga.com";
const LANGUAGES: &[Language] = &[Language::De];

/// Each listed image is a reader page; the picture itself is `img#comicpic`
pub struct WieManga {
    client: Arc<HttpClient>,
}

impl WieManga {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

pub fn parse_search(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    let results = find(NAME, &document, "div.searchresult")?;
    let anchor_selector = selector("a.resultimg")?;

    let mut mangas = Vec::new();
    for anchor in results.select(&anchor_selector) {
        let img = find_in(NAME, anchor, "img")?;
        mangas.push(Manga::new(
            attr(NAME, anchor, "href")?.trim(),
            attr(NAME, img, "alt")?.trim(),
            Some(attr(NAME, img, "src")?.trim().to_string()),
        ));
    }
    Ok(mangas)
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "div.chapterlist")?;
    let cell_selector = selector("td")?;
    let anchor_selector = selector("a")?;

    let mut chapters = Vec::new();
    for cell in list.select(&cell_selector) {
        if let Some(anchor) = cell.select(&anchor_selector).next() {
            chapters.push(Chapter::new(
                attr(NAME, anchor, "href")?.trim(),
                attr(NAME, anchor, "title")?.trim(),
            ));
        }
    }
    Ok(chapters)
}

pub fn parse_images(html: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let select = find(NAME, &document, "select#page")?;
    let option_selector = selector("option")?;
    select
        .select(&option_selector)
        .map(|opt| Ok(ChapterImage::new(attr(NAME, opt, "value")?.trim())))
        .collect()
}

pub fn parse_page_image(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let img = find(NAME, &document, "img#comicpic")?;
    Ok(attr(NAME, img, "src")?.trim().to_string())
}

impl Site for WieManga {
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
            let page = self.client.get_with(&url, &[("wd", query.as_str())], HeaderMap::new())?;
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

    fn download_image(&self, image: &ChapterImage) -> Result<Vec<u8>> {
        let page = self.client.get(&image.url)?;
        let src = parse_page_image(&page.body)?;
        self.client.get_bytes(&src, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let html = r#"
            <div class="searchresult">
              <a class="resultimg" href="https://wiemanga.com/manga/Berserk.html"><img alt="Berserk" src="https://img.wiemanga.com/berserk.jpg"/></a>
            </div>"#;
        let mangas = parse_search(html).unwrap();
        assert_eq!(
            mangas,
            vec![Manga::new(
                "https://wiemanga.com/manga/Berserk.html",
                "Berserk",
                Some("https://img.wiemanga.com/berserk.jpg".into())
            )]
        );
    }

    #[test]
    fn test_parse_chapters_and_pages() {
        let html = r#"
            <div class="chapterlist"><table>
              <tr><td><a href="https://wiemanga.com/chapter/Berserk/2/" title=" Berserk 2 ">2</a></td><td>2021</td></tr>
            </table></div>"#;
        let chapters = parse_chapters(html).unwrap();
        assert_eq!(chapters, vec![Chapter::new("https://wiemanga.com/chapter/Berserk/2/", "Berserk 2")]);

        let html = r#"<select id="page"><option value="https://wiemanga.com/chapter/Berserk/2-1.html">1</option></select>"#;
        assert_eq!(parse_images(html).unwrap()[0].url, "https://wiemanga.com/chapter/Berserk/2-1.html");

        let html = r#"<img id="comicpic" src="https://img.wiemanga.com/p/1.jpg"/>"#;
        assert_eq!(parse_page_image(html).unwrap(), "https://img.wiemanga.com/p/1.jpg");
    }
}
