//! Command handlers: search, info, download and read.
//!
//! Each handler resolves the owning site, answers from the cache where it
//! can, falls back to the site adapter on a miss and repopulates the cache.
//! Every handler is its own failure boundary: nothing escapes to the caller,
//! errors become a text reply.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use std::sync::Arc;

use crate::cache::{keys, CacheLayer};
use crate::config::Config;
use crate::convert::{ConvertedImage, ImageConverter, JpegPdfConverter};
use crate::error::{MangaError, Result};
use crate::metrics::{track_request, CacheTier, MetricsTracker};
use crate::models::{Chapter, ChapterImage, Language, Manga, Reply};
use crate::prefs::{self, PreferenceStore};
use crate::registry::SiteRegistry;
use crate::render::{Renderer, UponRenderer, CHAPTER_LIST, MANGA_LIST, SITE_LIST};
use crate::sources::Site;

pub const WRONG_USAGE: &str = "❌ Wrong usage";
pub const FAILURE: &str = "❌ Error, please try again later";
pub const NO_IMAGES: &str = "❌ No images found";

/// Where replies are delivered; download parts are sent as soon as they are flushed
pub trait Replies {
    fn add(&mut self, reply: Reply);
}

impl Replies for Vec<Reply> {
    fn add(&mut self, reply: Reply) {
        self.push(reply);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One `chapter.pdf` attachment per part
    Pdf,
    /// One self-contained HTML page per part
    Html,
}

/// Images of one output unit. `part` is 0 when the chapter fit in a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub images: Vec<ConvertedImage>,
    pub part: usize,
}

/// Size-bounded partitioning of a chapter's converted images.
///
/// The size check happens before an image is added: once the running total
/// has reached `max_size`, the current batch is flushed and the image opens
/// the next one. A batch therefore always holds at least one image, and an
/// image larger than `max_size` still goes out on its own.
#[derive(Debug)]
pub struct Batcher {
    max_size: u64,
    images: Vec<ConvertedImage>,
    size: u64,
    part: usize,
}

impl Batcher {
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            images: Vec::new(),
            size: 0,
            part: 0,
        }
    }

    /// Add an image, returning the batch that had to be flushed first, if any
    pub fn push(&mut self, image: ConvertedImage) -> Option<Batch> {
        let flushed = if self.size >= self.max_size && !self.images.is_empty() {
            self.part += 1;
            self.size = 0;
            Some(Batch {
                images: std::mem::take(&mut self.images),
                part: self.part,
            })
        } else {
            None
        };
        self.size += image.len() as u64;
        self.images.push(image);
        flushed
    }

    /// The remaining images; numbered only when earlier parts were flushed
    pub fn finish(self) -> Option<Batch> {
        if self.images.is_empty() {
            return None;
        }
        let part = if self.part > 0 { self.part + 1 } else { 0 };
        Some(Batch {
            images: self.images,
            part,
        })
    }
}

pub struct Pipeline {
    registry: SiteRegistry,
    cache: CacheLayer,
    converter: Box<dyn ImageConverter>,
    renderer: Box<dyn Renderer>,
    prefs: Arc<dyn PreferenceStore>,
    config: Config,
    metrics: MetricsTracker,
}

impl Pipeline {
    pub fn new(
        registry: SiteRegistry,
        cache: CacheLayer,
        converter: Box<dyn ImageConverter>,
        renderer: Box<dyn Renderer>,
        prefs: Arc<dyn PreferenceStore>,
        config: Config,
    ) -> Self {
        // register the plugin-wide defaults so they show up as preferences
        prefs::get_or_init_default(
            prefs.as_ref(),
            prefs::PDF_MAX_SIZE,
            &config.download.pdf_max_size.to_string(),
        );
        prefs::get_or_init_default(
            prefs.as_ref(),
            prefs::HTML_MAX_SIZE,
            &config.download.html_max_size.to_string(),
        );
        Self {
            registry,
            cache,
            converter,
            renderer,
            prefs,
            config,
            metrics: MetricsTracker::new(),
        }
    }

    /// Built-in sites, filesystem caches and the default converter and renderer
    pub fn from_config(config: Config, prefs: Arc<dyn PreferenceStore>) -> Result<Self> {
        let client = Arc::new(config.http.create_http_client()?);
        let registry = SiteRegistry::with_default_sites(client);
        let cache = CacheLayer::from_config(&config.cache)?;
        Ok(Self::new(
            registry,
            cache,
            Box::new(JpegPdfConverter::new()),
            Box::new(UponRenderer::new()?),
            prefs,
            config,
        ))
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    /// Answer free text with the menu of sites to search it at
    pub fn site_menu(&self, text: &str, replies: &mut dyn Replies) {
        let query = text.trim();
        if query.is_empty() {
            return;
        }
        let result = self.site_list_html(query).map(|html| {
            replies.add(Reply::text("🔍 Select a site to search").with_html(html));
        });
        self.conclude("menu", text, result, replies);
    }

    /// `<lang> <site-url> <query>`
    pub fn search(&self, payload: &str, replies: &mut dyn Replies) {
        let result = self.try_search(payload, replies);
        self.conclude("search", payload, result, replies);
    }

    /// `<manga-url>`: chapter list and cover
    pub fn info(&self, payload: &str, replies: &mut dyn Replies) {
        let result = self.try_info(payload, replies);
        self.conclude("info", payload, result, replies);
    }

    /// `<chapter-url>` as PDF parts, sized by the sender's `pdf_max_size`
    pub fn download(&self, payload: &str, sender: Option<&str>, replies: &mut dyn Replies) {
        let result = prefs::resolve_size(
            self.prefs.as_ref(),
            prefs::PDF_MAX_SIZE,
            sender,
            self.config.download.pdf_max_size,
        )
        .and_then(|max_size| self.try_download(payload, OutputFormat::Pdf, max_size, replies));
        self.conclude("download", payload, result, replies);
    }

    /// `<chapter-url>` as HTML parts, sized by the sender's `html_max_size`
    pub fn read(&self, payload: &str, sender: Option<&str>, replies: &mut dyn Replies) {
        let result = prefs::resolve_size(
            self.prefs.as_ref(),
            prefs::HTML_MAX_SIZE,
            sender,
            self.config.download.html_max_size,
        )
        .and_then(|max_size| self.try_download(payload, OutputFormat::Html, max_size, replies));
        self.conclude("read", payload, result, replies);
    }

    fn conclude(&self, command: &str, payload: &str, result: Result<()>, replies: &mut dyn Replies) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_usage() => {
                log::debug!("{} {:?}: {}", command, payload, e);
                replies.add(Reply::text(WRONG_USAGE));
            }
            Err(e) => {
                log::error!("{} {:?} failed: {}", command, payload, e);
                replies.add(Reply::text(FAILURE));
            }
        }
    }

    fn site_list_html(&self, query: &str) -> Result<String> {
        let languages: Vec<_> = self
            .registry
            .languages_index()
            .into_iter()
            .map(|(lang, sites)| {
                json!({
                    "code": lang.code(),
                    "label": lang.label(),
                    "sites": sites
                        .iter()
                        .map(|site| json!({"name": site.name(), "url": site.base_url()}))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        self.renderer.render(
            SITE_LIST,
            &json!({
                "bot_addr": self.config.bot.bot_addr,
                "query": query,
                "languages": languages,
            }),
        )
    }

    fn try_search(&self, payload: &str, replies: &mut dyn Replies) -> Result<()> {
        let (lang, url, query) = parse_search_payload(payload)?;
        let site = self.registry.get_by_url(url)?;
        if !site.supported_languages().contains(&lang) {
            return Err(MangaError::InvalidArgument(format!(
                "{} does not support {}",
                site.name(),
                lang
            )));
        }

        let mangas = self.search_results(site, lang, query)?;
        if mangas.is_empty() {
            replies.add(Reply::text(format!("❌ No matches found at {}", site.name())));
            return Ok(());
        }
        let html = self.renderer.render(
            MANGA_LIST,
            &json!({
                "bot_addr": self.config.bot.bot_addr,
                "site_name": site.name(),
                "mangas": mangas,
            }),
        )?;
        replies.add(Reply::text(format!("{} Search Results", site.name())).with_html(html));
        Ok(())
    }

    fn try_info(&self, payload: &str, replies: &mut dyn Replies) -> Result<()> {
        let url = single_url(payload)?;
        let site = self.registry.get_by_url(url)?;
        let manga = self.cached(self.cache.metadata.manga(url)).unwrap_or_else(|| Manga::placeholder(url));

        let chapters = self.chapters(site, &manga)?;
        let mut text = String::new();
        if !manga.is_placeholder() {
            text.push_str(&manga.name);
            text.push('\n');
        }
        text.push_str(&format!("{}\n\n({} chapters)", manga.url, chapters.len()));
        let mut reply = Reply::text(text);

        if !chapters.is_empty() {
            reply = reply.with_html(self.renderer.render(
                CHAPTER_LIST,
                &json!({
                    "bot_addr": self.config.bot.bot_addr,
                    "manga_name": manga.title(),
                    "chapters": chapters,
                }),
            )?);
        }
        if let Some(cover) = self.cover(site, &manga) {
            reply = reply.with_attachment("cover.jpg", cover.bytes);
        }
        replies.add(reply);
        Ok(())
    }

    fn try_download(
        &self,
        payload: &str,
        format: OutputFormat,
        max_size: u64,
        replies: &mut dyn Replies,
    ) -> Result<()> {
        let url = single_url(payload)?;
        let site = self.registry.get_by_url(url)?;
        let chapter = self
            .cached(self.cache.metadata.chapter(url))
            .unwrap_or_else(|| Chapter::placeholder(url));

        let images = self.images(site, &chapter)?;
        if images.is_empty() {
            replies.add(Reply::text(NO_IMAGES));
            return Ok(());
        }

        let mut batcher = Batcher::new(max_size);
        for bytes in self.image_blobs(site, &images) {
            let converted = self.converter.convert_image(&bytes?)?;
            if let Some(batch) = batcher.push(converted) {
                self.send_part(format, &batch, &chapter, replies)?;
            }
        }
        if let Some(batch) = batcher.finish() {
            self.send_part(format, &batch, &chapter, replies)?;
        }
        Ok(())
    }

    fn send_part(&self, format: OutputFormat, batch: &Batch, chapter: &Chapter, replies: &mut dyn Replies) -> Result<()> {
        let title = if batch.part > 0 {
            format!("{} (Part {})", chapter.title(), batch.part)
        } else {
            chapter.title().to_string()
        };
        let text = format!("{}\n{}", title, chapter.url);
        log::info!("Sending {} ({} images)", title, batch.images.len());
        let reply = match format {
            OutputFormat::Pdf => {
                let pdf = self.converter.images_to_pdf(&batch.images, &title)?;
                Reply::text(text).with_attachment("chapter.pdf", pdf)
            }
            OutputFormat::Html => Reply::text(text).with_html(html_page(&batch.images)),
        };
        replies.add(reply);
        Ok(())
    }

    fn cached<T>(&self, value: Option<T>) -> Option<T> {
        self.metrics.record_cache(CacheTier::Metadata, value.is_some());
        value
    }

    fn search_results(&self, site: &dyn Site, lang: Language, query: &str) -> Result<Vec<Manga>> {
        let key = keys::search_key(lang, site.base_url(), query);
        if let Some(mangas) = self.cached(self.cache.metadata.search_results(&key)) {
            return Ok(mangas);
        }
        let mangas = track_request(&self.metrics, site.name(), || {
            site.search(query, Some(lang)).collect::<Result<Vec<_>>>()
        })?;
        self.cache.metadata.put_search_results(&key, &mangas);
        Ok(mangas)
    }

    fn chapters(&self, site: &dyn Site, manga: &Manga) -> Result<Vec<Chapter>> {
        if let Some(chapters) = self.cached(self.cache.metadata.chapters(&manga.url)) {
            return Ok(chapters);
        }
        let chapters = track_request(&self.metrics, site.name(), || {
            site.list_chapters(manga).collect::<Result<Vec<_>>>()
        })?;
        self.cache.metadata.put_chapters(&manga.url, &chapters);
        Ok(chapters)
    }

    fn images(&self, site: &dyn Site, chapter: &Chapter) -> Result<Vec<ChapterImage>> {
        if let Some(images) = self.cached(self.cache.metadata.images(&chapter.url)) {
            return Ok(images);
        }
        let images = track_request(&self.metrics, site.name(), || {
            site.list_images(chapter).collect::<Result<Vec<_>>>()
        })?;
        self.cache.metadata.put_images(&chapter.url, &images);
        Ok(images)
    }

    /// Raw page bytes in reading order, downloaded only when pulled
    fn image_blobs<'a>(
        &'a self,
        site: &'a dyn Site,
        images: &'a [ChapterImage],
    ) -> impl Iterator<Item = Result<Vec<u8>>> + 'a {
        images.iter().map(move |image| {
            if let Some(bytes) = self.blob(&image.url) {
                return Ok(bytes);
            }
            let bytes = track_request(&self.metrics, site.name(), || site.download_image(image))?;
            self.cache.blobs.set(&image.url, &bytes);
            site.client().pause(self.config.download.image_delay_ms);
            Ok(bytes)
        })
    }

    fn blob(&self, url: &str) -> Option<Vec<u8>> {
        let bytes = self.cache.blobs.get(url);
        self.metrics.record_cache(CacheTier::Blobs, bytes.is_some());
        bytes
    }

    /// Cover converted to JPEG; failures only cost the attachment
    fn cover(&self, site: &dyn Site, manga: &Manga) -> Option<ConvertedImage> {
        let url = manga.cover.as_deref()?;
        let bytes = match self.blob(url) {
            Some(bytes) => bytes,
            None => match track_request(&self.metrics, site.name(), || site.download_cover(manga)) {
                Ok(bytes) => {
                    self.cache.blobs.set(url, &bytes);
                    bytes
                }
                Err(e) => {
                    log::warn!("Cover {} unavailable: {}", url, e);
                    return None;
                }
            },
        };
        match self.converter.convert_image(&bytes) {
            Ok(converted) => Some(converted),
            Err(e) => {
                log::warn!("Cover {} not convertible: {}", url, e);
                None
            }
        }
    }
}

/// Split `<lang> <site-url> <query>`; the query may be empty
fn parse_search_payload(payload: &str) -> Result<(Language, &str, &str)> {
    let usage = || MangaError::InvalidArgument(format!("expected `<lang> <site-url> <query>`, got {:?}", payload));
    let (lang, rest) = split_word(payload).ok_or_else(usage)?;
    let (url, query) = match split_word(rest) {
        Some((url, query)) => (url, query),
        None if !rest.trim().is_empty() => (rest.trim(), ""),
        None => return Err(usage()),
    };
    Ok((lang.parse()?, url, query.trim()))
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let idx = s.find(char::is_whitespace)?;
    Some((&s[..idx], s[idx..].trim_start()))
}

fn single_url(payload: &str) -> Result<&str> {
    let url = payload.trim();
    if url.is_empty() || url.contains(char::is_whitespace) {
        return Err(MangaError::InvalidArgument(format!("expected a single URL, got {:?}", payload)));
    }
    Ok(url)
}

/// Standalone reader page with every image embedded as a data URI
pub fn html_page(images: &[ConvertedImage]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
         <style>html,body{padding:0;margin:0;}img{width:100%;height:auto;}</style>\
         </head><body>",
    );
    for image in images {
        html.push_str("<img src=\"data:image/jpeg;base64,");
        html.push_str(&BASE64.encode(&image.bytes));
        html.push_str("\"/>");
    }
    html.push_str("</body></html>");
    html
}
