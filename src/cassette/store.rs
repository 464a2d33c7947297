//! Persistence of cassettes as one JSON document per name.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use uuid::Uuid;

use super::config::StoreConfig;
use super::format::{Cassette, CassetteFile, CASSETTE_VERSION};
use crate::error::{Error, Result};

/// Reads and writes cassette files under a configured directory.
#[derive(Debug, Clone)]
pub struct CassetteStore {
    config: StoreConfig,
}

impl CassetteStore {
    /// Creates a store over the given location.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// The store's configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path of the file backing `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` is empty, starts with a dot,
    /// or contains a path separator. Dot-prefixed files are reserved for
    /// in-progress writes.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(Error::InvalidName(name.to_string()));
        }
        let file = format!("{name}.{}", self.config.extension);
        Ok(self.config.cassette_dir.join(file))
    }

    /// Whether a cassette file exists for `name`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|path| path.is_file())
    }

    /// Loads the cassette stored under `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no file exists
    /// - [`Error::UnsupportedVersion`] if the file's `version` is not supported
    /// - [`Error::Parse`] if the document is malformed
    pub fn load(&self, name: &str) -> Result<Cassette> {
        let path = self.path_for(name)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    name: name.to_string(),
                    path,
                });
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        let parse_err = |reason: String| Error::Parse {
            path: path.clone(),
            reason,
        };
        let parse = |e: serde_json::Error| parse_err(e.to_string());
        let document: Value = serde_json::from_str(&content).map_err(parse)?;
        let Some(version) = document.get("version") else {
            return Err(parse_err("missing \"version\" field".into()));
        };
        if version.as_u64() != Some(u64::from(CASSETTE_VERSION)) {
            return Err(Error::UnsupportedVersion {
                found: version.clone(),
                expected: CASSETTE_VERSION,
            });
        }
        let file: CassetteFile = serde_json::from_value(document).map_err(parse)?;

        tracing::debug!(
            cassette = name,
            pairs = file.reqs.len(),
            path = %path.display(),
            "loaded cassette"
        );
        Ok(Cassette::from_pairs(name, file.reqs))
    }

    /// Writes `cassette` in full, replacing any previous file atomically.
    ///
    /// The document is written to a temp file in the same directory, synced,
    /// and renamed over the target, so a crash never leaves a partial file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or file cannot be written, or
    /// [`Error::InvalidName`] for an unusable cassette name.
    pub fn save(&self, cassette: &Cassette) -> Result<PathBuf> {
        let path = self.path_for(cassette.name())?;
        let dir = &self.config.cassette_dir;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let mut json = serde_json::to_string_pretty(&cassette.to_file())
            .map_err(|e| Error::Encoding(e.to_string()))?;
        json.push('\n');

        let tmp_name = format!(".{}.{}.tmp", cassette.name(), Uuid::new_v4());
        let tmp = dir.join(tmp_name);
        if let Err(e) = write_synced(&tmp, json.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::io(&tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::io(&path, e));
        }

        tracing::debug!(
            cassette = cassette.name(),
            pairs = cassette.len(),
            path = %path.display(),
            "saved cassette"
        );
        Ok(path)
    }

    /// Names of all stored cassettes, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the cassette directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let files = self.cassette_files()?;
        let mut names: Vec<String> = files.iter().filter_map(|p| stem(p)).collect();
        names.sort();
        Ok(names)
    }

    /// Deletes every stored cassette and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a file cannot be removed.
    pub fn delete_all(&self) -> Result<usize> {
        let files = self.cassette_files()?;
        for path in &files {
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
        }
        tracing::info!(
            deleted = files.len(),
            dir = %self.config.cassette_dir.display(),
            "deleted all cassettes"
        );
        Ok(files.len())
    }

    fn cassette_files(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.cassette_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(dir, e)),
        };
        let extension = self.config.extension.as_str();
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(dir, e))?.path();
            let matches_ext = path.extension().is_some_and(|ext| ext == extension);
            if matches_ext && path.is_file() && stem(&path).is_some() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Cassette name for a stored file; temp files (dot-prefixed) have none.
fn stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    (!stem.starts_with('.')).then(|| stem.to_string())
}
