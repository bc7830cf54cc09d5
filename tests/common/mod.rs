//! Offline stand-ins for sites and conversion, shared by the integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rust_manga_reader::cache::CacheLayer;
use rust_manga_reader::config::Config;
use rust_manga_reader::convert::{ConvertedImage, ImageConverter};
use rust_manga_reader::error::{MangaError, Result};
use rust_manga_reader::http_client::HttpClient;
use rust_manga_reader::prefs::MemoryPreferences;
use rust_manga_reader::render::UponRenderer;
use rust_manga_reader::sources::{fail, lazy, Items};
use rust_manga_reader::{Chapter, ChapterImage, Language, Manga, Pipeline, Site, SiteRegistry};

pub const MIB: usize = 1024 * 1024;
pub const BASE: &str = "https://stub.example";

/// Site serving canned data and counting every network-equivalent call
pub struct StubSite {
    pub client: HttpClient,
    pub calls: Arc<AtomicUsize>,
    pub mangas: Vec<Manga>,
    pub chapters: Vec<Chapter>,
    pub blobs: HashMap<String, Vec<u8>>,
    pub broken: bool,
}

impl StubSite {
    pub fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            client: HttpClient::new().unwrap(),
            calls,
            mangas: vec![Manga::new(
                format!("{}/manga/naruto", BASE),
                "Naruto",
                Some(format!("{}/covers/naruto.jpg", BASE)),
            )],
            chapters: vec![
                Chapter::new(format!("{}/chapter/2", BASE), "Chapter 2"),
                Chapter::new(format!("{}/chapter/1", BASE), "Chapter 1"),
            ],
            blobs: HashMap::new(),
            broken: false,
        }
    }

    /// Pages of the given sizes for `chapter/1`, in order
    pub fn with_pages(mut self, sizes: &[usize]) -> Self {
        for (i, size) in sizes.iter().enumerate() {
            self.blobs.insert(page_url(i), vec![i as u8; *size]);
        }
        self
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn page_url(index: usize) -> String {
    format!("{}/img/{:03}.jpg", BASE, index)
}

impl Site for StubSite {
    fn name(&self) -> &str {
        "Stub"
    }

    fn base_url(&self) -> &str {
        BASE
    }

    fn supported_languages(&self) -> &[Language] {
        &[Language::En]
    }

    fn client(&self) -> &HttpClient {
        &self.client
    }

    fn search(&self, query: &str, _lang: Option<Language>) -> Items<'_, Manga> {
        if query.trim().is_empty() {
            return Box::new(std::iter::empty());
        }
        lazy(move || {
            self.hit();
            Ok(self.mangas.clone())
        })
    }

    fn list_chapters(&self, _manga: &Manga) -> Items<'_, Chapter> {
        lazy(move || {
            self.hit();
            Ok(self.chapters.clone())
        })
    }

    fn list_images(&self, _chapter: &Chapter) -> Items<'_, ChapterImage> {
        if self.broken {
            self.hit();
            return fail(MangaError::upstream("Stub", "missing `div.reader`"));
        }
        let mut urls: Vec<&String> = self.blobs.keys().filter(|url| url.contains("/img/")).collect();
        urls.sort();
        let images: Vec<ChapterImage> = urls.into_iter().map(ChapterImage::new).collect();
        lazy(move || {
            self.hit();
            Ok(images)
        })
    }

    fn download_image(&self, image: &ChapterImage) -> Result<Vec<u8>> {
        self.hit();
        self.blobs
            .get(&image.url)
            .cloned()
            .ok_or_else(|| MangaError::upstream("Stub", format!("no page {}", image.url)))
    }

    fn download_cover(&self, _manga: &Manga) -> Result<Vec<u8>> {
        self.hit();
        Ok(b"cover".to_vec())
    }
}

/// Keeps bytes as they are so batch sizes are the page sizes
pub struct PassthroughConverter;

impl ImageConverter for PassthroughConverter {
    fn convert_image(&self, bytes: &[u8]) -> Result<ConvertedImage> {
        Ok(ConvertedImage {
            bytes: bytes.to_vec(),
            width: 1,
            height: 1,
        })
    }

    fn images_to_pdf(&self, images: &[ConvertedImage], title: &str) -> Result<Vec<u8>> {
        Ok(format!("PDF {} pages={}", title, images.len()).into_bytes())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.download.image_delay_ms = 0;
    config.bot.bot_addr = "bot@example.org".to_string();
    config
}

pub fn pipeline(site: StubSite) -> (Pipeline, Arc<MemoryPreferences>) {
    let prefs = Arc::new(MemoryPreferences::new());
    let config = test_config();
    let pipeline = Pipeline::new(
        SiteRegistry::new(vec![Box::new(site)]),
        CacheLayer::in_memory(&config.cache),
        Box::new(PassthroughConverter),
        Box::new(UponRenderer::new().unwrap()),
        prefs.clone(),
        config,
    );
    (pipeline, prefs)
}
