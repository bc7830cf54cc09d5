// Library interface for rust_manga_reader
// The bot host feeds commands into `pipeline::Pipeline` and delivers its replies

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod helpers;
pub mod http_client;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod prefs;
pub mod registry;
pub mod render;
pub mod sources;

pub use error::{MangaError, Result};
pub use models::{Chapter, ChapterImage, Language, Manga, Reply};
pub use pipeline::{Pipeline, Replies};
pub use registry::SiteRegistry;
pub use sources::Site;
