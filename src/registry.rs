//! Fixed, ordered list of site adapters built once at startup.

use std::sync::Arc;

use crate::error::{MangaError, Result};
use crate::http_client::HttpClient;
use crate::models::Language;
use crate::sources::{
    asurascans::AsuraScans, heavenmanga::HeavenManga, kissmanga::KissManga, mangabuddy::MangaBuddy,
    manganelo::Manganelo, mangatigre::MangaTigre, manhuako::ManhuaKo, ninemanga::NineManga,
    tmo::TuMangaOnline, wiemanga::WieManga, Site,
};

pub struct SiteRegistry {
    sites: Vec<Box<dyn Site>>,
    /// Indexes into `sites`, per language in `Language::ALL` order
    languages: Vec<(Language, Vec<usize>)>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<Box<dyn Site>>) -> Self {
        let languages = Language::ALL
            .iter()
            .map(|lang| {
                let supporting = sites
                    .iter()
                    .enumerate()
                    .filter(|(_, site)| site.supported_languages().contains(lang))
                    .map(|(idx, _)| idx)
                    .collect::<Vec<_>>();
                (*lang, supporting)
            })
            .filter(|(_, supporting)| !supporting.is_empty())
            .collect();
        log::info!("Registered {} sites", sites.len());
        Self { sites, languages }
    }

    /// Every built-in adapter sharing one HTTP session, in resolution order
    pub fn with_default_sites(client: Arc<HttpClient>) -> Self {
        Self::new(vec![
            Box::new(AsuraScans::new(client.clone())),
            Box::new(TuMangaOnline::new(client.clone())),
            Box::new(Manganelo::new(client.clone())),
            Box::new(NineManga::new(client.clone())),
            Box::new(KissManga::new(client.clone())),
            Box::new(MangaTigre::new(client.clone())),
            Box::new(ManhuaKo::new(client.clone())),
            Box::new(MangaBuddy::new(client.clone())),
            Box::new(HeavenManga::new(client.clone())),
            Box::new(WieManga::new(client)),
        ])
    }

    /// First site, in declaration order, whose base URL is `url` or that owns `url`
    pub fn resolve(&self, url: &str) -> Option<&dyn Site> {
        let url = url.trim();
        self.sites
            .iter()
            .find(|site| site.base_url().trim_end_matches('/') == url.trim_end_matches('/') || site.owns_url(url))
            .map(|site| site.as_ref())
    }

    /// Like [`resolve`](Self::resolve), but an unknown URL is a usage error
    pub fn get_by_url(&self, url: &str) -> Result<&dyn Site> {
        self.resolve(url)
            .ok_or_else(|| MangaError::InvalidArgument(format!("no site handles {}", url)))
    }

    pub fn sites(&self) -> impl Iterator<Item = &dyn Site> {
        self.sites.iter().map(|site| site.as_ref())
    }

    /// Languages that at least one site serves, each with its sites
    pub fn languages_index(&self) -> Vec<(Language, Vec<&dyn Site>)> {
        self.languages
            .iter()
            .map(|(lang, idxs)| (*lang, idxs.iter().map(|&i| self.sites[i].as_ref()).collect()))
            .collect()
    }
}
