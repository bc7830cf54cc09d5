use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use scraper::Html;
use std::sync::Arc;

use super::{fail, lazy, paged, resolve_language, Items, Site, MAX_SEARCH_PAGES};
use crate::error::Result;
use crate::helpers::{self, attr, find, find_in, selector, text};
use crate::http_client::HttpClient;
use crate::models::{Chapter, ChapterImage, Language, Manga};

const NAME: &str = "Nine Manga";
const BASE_URL: &str = "https://ninemanga.com";
const LANGUAGES: &[Language] = &[
    Language::De,
    Language::En,
    Language::Es,
    Language::Fr,
    Language::It,
    Language::Pt,
    Language::Ru,
];

/// Nine Manga - one subdomain per language, Portuguese lives on `br.`
pub struct NineManga {
    client: Arc<HttpClient>,
}

impl NineManga {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub fn language_url(lang: Language) -> String {
        let subdomain = match lang {
            Language::Pt => "br",
            other => other.code(),
        };
        format!("https://{}.ninemanga.com", subdomain)
    }
}

/// One search result page plus the links to its following pages
pub fn parse_search_page(html: &str) -> Result<(Vec<Manga>, Vec<String>)> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "ul.direlist")?;
    let mangas = parse_cards(list)?;

    let page_link_selector = selector("ul.pagelist a")?;
    let links: Vec<String> = document
        .select(&page_link_selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect();
    // first and last links are "previous" / "next"
    let pages = if links.len() > 2 {
        links[1..links.len() - 1].iter().take(MAX_SEARCH_PAGES).cloned().collect()
    } else {
        Vec::new()
    };
    Ok((mangas, pages))
}

fn parse_cards(list: scraper::ElementRef<'_>) -> Result<Vec<Manga>> {
    let card_selector = selector("dl.bookinfo")?;
    let img_selector = selector("img")?;
    let mut mangas = Vec::new();
    for card in list.select(&card_selector) {
        let anchor = find_in(NAME, card, "a.bookname")?;
        let cover = card
            .select(&img_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| src.trim().to_string());
        mangas.push(Manga::new(attr(NAME, anchor, "href")?.trim(), text(anchor), cover));
    }
    Ok(mangas)
}

pub fn parse_search_results(html: &str) -> Result<Vec<Manga>> {
    let document = Html::parse_document(html);
    parse_cards(find(NAME, &document, "ul.direlist")?)
}

/// Adult titles show a warning page linking to the real chapter list
pub fn warning_link(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let link = selector("div.warning a")?;
    Ok(document
        .select(&link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string()))
}

pub fn parse_chapters(html: &str) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);
    let list = find(NAME, &document, "div.silde")?;
    let anchor_selector = selector("a.chapter_list_a")?;
    list.select(&anchor_selector)
        .map(|a| Ok(Chapter::new(attr(NAME, a, "href")?.trim(), attr(NAME, a, "title")?.trim())))
        .collect()
}

/// Page URLs from the page selector; each one is an HTML page holding one image
pub fn parse_images(html: &str, chapter_url: &str) -> Result<Vec<ChapterImage>> {
    let document = Html::parse_document(html);
    let select = find(NAME, &document, "select#page")?;
    let option_selector = selector("option")?;
    let origin = helpers::origin(chapter_url)?;
    select
        .select(&option_selector)
        .map(|opt| Ok(ChapterImage::new(format!("{}{}", origin, attr(NAME, opt, "value")?.trim()))))
        .collect()
}

pub fn parse_page_image(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let img = find(NAME, &document, "img.manga_pic")?;
    Ok(attr(NAME, img, "src")?.trim().to_string())
}

impl Site for NineManga {
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
        let lang = match resolve_language(NAME, LANGUAGES, lang) {
            Ok(lang) => lang,
            Err(e) => return fail(e),
        };
        if query.trim().is_empty() {
            return Box::new(std::iter::empty());
        }
        let query = query.to_string();
        let search_url = format!("{}/search/", Self::language_url(lang));
        paged(
            move || {
                let page = self
                    .client
                    .get_with(&search_url, &[("wd", query.as_str())], HeaderMap::new())?;
                parse_search_page(&page.body)
            },
            move |url: &str| parse_search_results(&self.client.get(url)?.body),
        )
    }

    fn list_chapters(&self, manga: &Manga) -> Items<'_, Chapter> {
        let url = manga.url.clone();
        lazy(move || {
            let mut page = self.client.get(&url)?;
            if let Some(link) = warning_link(&page.body)? {
                page = self.client.get(&link)?;
            }
            parse_chapters(&page.body)
        })
    }

    fn list_images(&self, chapter: &Chapter) -> Items<'_, ChapterImage> {
        let url = chapter.url.clone();
        lazy(move || parse_images(&self.client.get(&url)?.body, &url))
    }

    fn download_image(&self, image: &ChapterImage) -> Result<Vec<u8>> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        let page = self.client.get_with(&image.url, &[], headers)?;
        let src = parse_page_image(&page.body)?;
        self.client.get_bytes(&src, None)
    }

    fn owns_url(&self, url: &str) -> bool {
        helpers::is_under(BASE_URL, url)
            || LANGUAGES
                .iter()
                .any(|lang| helpers::is_under(&Self::language_url(*lang), url))
    }
}
