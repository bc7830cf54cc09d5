//! log4rs initialisation for hosts embedding the reader

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

use crate::error::{MangaError, Result};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

/// Load the log4rs YAML file at `path`, or log to the console at `info`
/// when the file does not exist.
pub fn init_logging(path: &Path) -> Result<()> {
    if path.exists() {
        return log4rs::init_file(path, Default::default()).map_err(|e| MangaError::Config(e.to_string()));
    }
    log4rs::init_config(console_config(LevelFilter::Info)?)
        .map(|_| ())
        .map_err(|e| MangaError::Config(e.to_string()))
}

fn console_config(level: LevelFilter) -> Result<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| MangaError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_config_builds() {
        assert!(console_config(LevelFilter::Debug).is_ok());
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let missing = Path::new("definitely-missing-log4rs.yml");
        let first = init_logging(missing);
        let second = init_logging(missing);
        // whichever call lost the race for the global logger reports an error
        assert!(first.is_err() || second.is_err());
    }
}
