use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::export::ExportFormat;
use crate::search::SEARCH_URL;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings read from `parlquest.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub search_url: String,
    pub documents_per_page: u32,
    pub first_legislature: u8,
    pub last_legislature: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_url: SEARCH_URL.to_string(),
            documents_per_page: 100,
            first_legislature: 7,
            last_legislature: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Unset means requests may wait forever.
    pub timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub export_format: ExportFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            export_format: ExportFormat::Store,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text)?;
        config.validate()
    }

    /// Falls back to defaults when the file is missing; a malformed file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::warn!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Config::load(path)
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        let search = &self.search;
        if search.documents_per_page == 0 {
            return Err(ConfigError::Invalid(
                "search.documents_per_page must be greater than 0".to_string(),
            ));
        }
        if search.first_legislature == 0 || search.first_legislature > search.last_legislature {
            return Err(ConfigError::Invalid(format!(
                "legislature range {}..={} is empty",
                search.first_legislature, search.last_legislature
            )));
        }
        if url::Url::parse(&search.search_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "search.search_url is not a URL: {}",
                search.search_url
            )));
        }
        if self.http.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default().validate().expect("defaults are valid");
        assert_eq!(config.search.first_legislature, 7);
        assert_eq!(config.search.last_legislature, 16);
        assert_eq!(config.search.documents_per_page, 100);
        assert_eq!(config.http.timeout_secs, None);
        assert_eq!(config.storage.export_format, ExportFormat::Store);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[search]\ndocuments_per_page = 25\n\n[storage]\nexport_format = \"json\"\n"
        )
        .unwrap();

        let config = Config::load(file.path()).expect("valid config");
        assert_eq!(config.search.documents_per_page, 25);
        assert_eq!(config.search.search_url, SEARCH_URL);
        assert_eq!(config.storage.export_format, ExportFormat::Json);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.search.last_legislature, 16);
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nfirst_legislature = 16\nlast_legislature = 7\n").unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
