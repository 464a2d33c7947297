//! Where cassettes live on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the cassette directory.
pub const DIR_ENV: &str = "RPCTAPE_CASSETTE_DIR";
/// Environment variable naming the cassette file extension.
pub const EXT_ENV: &str = "RPCTAPE_CASSETTE_EXT";

const DEFAULT_DIR: &str = "tests/cassettes";
const DEFAULT_EXTENSION: &str = "json";

/// Cassette store location. Each cassette is stored at
/// `<cassette_dir>/<name>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one file per cassette.
    pub cassette_dir: PathBuf,
    /// File extension, without the leading dot.
    pub extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cassette_dir: PathBuf::from(DEFAULT_DIR),
            extension: DEFAULT_EXTENSION.into(),
        }
    }
}

impl StoreConfig {
    /// Config rooted at `dir` with the default `json` extension.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            cassette_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Builds a config from `RPCTAPE_CASSETTE_DIR` / `RPCTAPE_CASSETTE_EXT`,
    /// loading a `.env` file first if one is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the `.env` file is unreadable or the
    /// resulting extension is invalid.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("failed to load .env: {e}"))),
        }
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(DIR_ENV) {
            config.cassette_dir = PathBuf::from(dir);
        }
        if let Ok(ext) = std::env::var(EXT_ENV) {
            config.extension = ext;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML config document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the YAML is malformed or the extension is invalid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            let path = path.display();
            Error::Config(format!("failed to read config file {path}: {e}"))
        })?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        let ext = &self.extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(Error::Config(format!("invalid cassette extension {ext:?}")));
        }
        Ok(())
    }
}
