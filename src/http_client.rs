use rand::Rng;
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::error::Result;

/// User agents to pick from when the configuration does not pin one
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:104.0) Gecko/20100101 Firefox/104.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Configuration for the shared HTTP session
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub enable_cookies: bool,
    pub enable_gzip: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            enable_cookies: true,
            enable_gzip: true,
        }
    }
}

/// A fetched document together with the URL it was finally served from
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: String,
}

/// Blocking HTTP session shared by every site adapter.
///
/// Requests are never retried: a failure is reported once and the user
/// reissues the command. Timeouts and non-2xx statuses surface as
/// [`MangaError::Network`](crate::error::MangaError::Network).
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> std::result::Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> std::result::Result<Self, reqwest::Error> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| Self::random_user_agent().to_string());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(header::DNT, HeaderValue::from_static("1"));

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .cookie_store(config.enable_cookies)
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .default_headers(headers)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get a random user agent from the pool
    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        let index = rng.gen_range(0..USER_AGENTS.len());
        USER_AGENTS[index]
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Fetch a URL and return its body
    pub fn get(&self, url: &str) -> Result<Page> {
        log::debug!("GET {}", url);
        Self::finish(self.client.get(url))
    }

    /// Fetch a URL with query parameters and extra headers
    pub fn get_with(&self, url: &str, query: &[(&str, &str)], headers: HeaderMap) -> Result<Page> {
        log::debug!("GET {} {:?}", url, query);
        Self::finish(self.client.get(url).query(query).headers(headers))
    }

    /// Submit a form and return the response body
    pub fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Page> {
        log::debug!("POST {}", url);
        Self::finish(self.client.post(url).form(form))
    }

    /// Download raw bytes, optionally sending a referer
    pub fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>> {
        log::debug!("GET (binary) {}", url);
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }
        let response = request.send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }

    fn finish(request: RequestBuilder) -> Result<Page> {
        let response = request.send()?.error_for_status()?;
        let url = response.url().to_string();
        let body = response.text()?;
        Ok(Page { url, body })
    }

    /// Get the underlying reqwest client for direct access
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sleep between requests to avoid bursting a site
    pub fn pause(&self, delay_ms: u64) {
        if delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(delay_ms));
        }
    }
}
