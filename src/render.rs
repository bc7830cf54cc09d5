//! HTML reply bodies.
//!
//! Every link points back at the bot as a `mailto:` with the command in the
//! body, so tapping a result issues the next command.

use upon::Engine;

use crate::error::{MangaError, Result};

pub const SITE_LIST: &str = "site_list";
pub const MANGA_LIST: &str = "manga_list";
pub const CHAPTER_LIST: &str = "chapter_list";

const HEAD: &str = r#"<!DOCTYPE html><html><head><meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0"><style>body{font-family:sans-serif;}a{display:block;padding:0.4em 0;}</style></head>"#;

const SITE_LIST_TEMPLATE: &str = r#"{% for lang in languages %}<h3>{{ lang.label }}</h3><ul>{% for site in lang.sites %}<li><a href="mailto:{{ bot_addr }}?body=/search%20{{ lang.code }}%20{{ site.url | quote }}%20{{ query | quote }}">{{ site.name }}</a></li>{% endfor %}</ul>{% endfor %}"#;

const MANGA_LIST_TEMPLATE: &str = r#"<h3>{{ site_name }}</h3><ul>{% for manga in mangas %}<li><a href="mailto:{{ bot_addr }}?body=/info%20{{ manga.url | quote }}">{{ manga.name }}</a></li>{% endfor %}</ul>"#;

const CHAPTER_LIST_TEMPLATE: &str = r#"<h3>{{ manga_name }}</h3><ul>{% for chapter in chapters %}<li>{{ chapter.name }} <a href="mailto:{{ bot_addr }}?body=/download%20{{ chapter.url | quote }}">PDF</a> <a href="mailto:{{ bot_addr }}?body=/read%20{{ chapter.url | quote }}">HTML</a></li>{% endfor %}</ul>"#;

/// Turns a named template plus plain data into an HTML string
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String>;
}

/// [`Renderer`] backed by `upon`, with HTML escaping on every expression
pub struct UponRenderer {
    engine: Engine<'static>,
}

impl UponRenderer {
    /// Compile the built-in templates; syntax errors surface here, not at render time
    pub fn new() -> Result<Self> {
        let mut engine = Engine::new();
        engine.add_function("quote", |value: &str| urlencoding::encode(value).into_owned());
        for (name, source) in [
            (SITE_LIST, SITE_LIST_TEMPLATE),
            (MANGA_LIST, MANGA_LIST_TEMPLATE),
            (CHAPTER_LIST, CHAPTER_LIST_TEMPLATE),
        ] {
            engine.add_template(name, format!("{}<body>{}</body></html>", HEAD, source))?;
        }
        Ok(Self { engine })
    }
}

impl Renderer for UponRenderer {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String> {
        let template = self
            .engine
            .get_template(template)
            .ok_or_else(|| MangaError::Config(format!("unknown template {}", template)))?;
        Ok(template.render(context).to_string()?)
    }
}
