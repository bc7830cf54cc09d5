use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MangaError;

/// Languages a site can serve, in menu order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    En,
    Es,
    Fr,
    It,
    Pt,
    Ru,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::De,
        Language::En,
        Language::Es,
        Language::Fr,
        Language::It,
        Language::Pt,
        Language::Ru,
    ];

    /// Two letter code used in command payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Language::De => "de",
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::It => "it",
            Language::Pt => "pt",
            Language::Ru => "ru",
        }
    }

    /// Display label shown in the site menu.
    pub fn label(&self) -> &'static str {
        match self {
            Language::De => "🇩🇪 Deutsch",
            Language::En => "🇬🇧 English",
            Language::Es => "🇪🇸 Español",
            Language::Fr => "🇫🇷 Français",
            Language::It => "🇮🇹 Italiano",
            Language::Pt => "🇵🇹 Português",
            Language::Ru => "🇷🇺 Pусский",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = MangaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == s)
            .ok_or_else(|| MangaError::InvalidArgument(format!("unknown language code: {}", s)))
    }
}

/// A series on one site, identified by its canonical URL.
///
/// An empty `name` marks a placeholder built from a bare URL when no cached
/// metadata was available.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Manga {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cover: Option<String>,
}

impl Manga {
    pub fn new(url: impl Into<String>, name: impl Into<String>, cover: Option<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            cover,
        }
    }

    pub fn placeholder(url: impl Into<String>) -> Self {
        Self::new(url, String::new(), None)
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }

    /// Name for display, falling back to the URL for placeholders.
    pub fn title(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub url: String,
    #[serde(default)]
    pub name: String,
}

impl Chapter {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }

    pub fn placeholder(url: impl Into<String>) -> Self {
        Self::new(url, String::new())
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }

    pub fn title(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

/// One page of a chapter.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChapterImage {
    pub url: String,
    /// Referer some sites demand when the image is downloaded.
    #[serde(default)]
    pub referer: Option<String>,
}

impl ChapterImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
        }
    }

    pub fn with_referer(url: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: Some(referer.into()),
        }
    }
}

/// A file attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Payload handed back to the bot framework.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachment: Option<Attachment>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_attachment(mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.attachment = Some(Attachment {
            filename: filename.into(),
            bytes,
        });
        self
    }
}
