//! Configuration management.
//!
//! [`HarvestConfig`] is built once at startup (file, then environment
//! overrides) and handed to each component's constructor.

use crate::io::Format;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable holding the source bearer token.
pub const BEARER_TOKEN_ENV: &str = "HARVEST_BEARER_TOKEN";

/// Legacy bearer token variable, read when [`BEARER_TOKEN_ENV`] is unset.
pub const LEGACY_BEARER_TOKEN_ENV: &str = "BEARER_TOKEN";

/// Environment variable pointing at a config file.
pub const CONFIG_PATH_ENV: &str = "HARVEST_CONFIG_PATH";

/// Main configuration.
#[derive(Debug, Clone, Default)]
pub struct HarvestConfig {
    /// Timeline source settings.
    pub source: SourceConfig,
    /// Record store settings.
    pub store: StoreConfig,
    /// Dataset export settings.
    pub export: ExportConfig,
    /// Category (language) to entity handles.
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Timeline source settings.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// API base URL.
    pub base_url: String,
    /// Bearer token for the API.
    pub bearer_token: Option<SecretString>,
    /// Maximum records fetched per entity and run.
    pub max_results: usize,
    /// Records requested per page.
    pub page_size: usize,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com/2".to_string(),
            bearer_token: None,
            max_results: 3200,
            page_size: 100,
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `SQLite` database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/harvest.db"),
        }
    }
}

/// Dataset export settings.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Root directory for per-category split files.
    pub output_dir: PathBuf,
    /// Entities with fewer stored records are left out entirely.
    pub min_records: Option<usize>,
    /// Shuffle seed.
    pub seed: u64,
    /// Fraction of rows assigned to validation.
    pub validation_ratio: f64,
    /// Preserve label proportions in both splits.
    pub stratify: bool,
    /// Output file format.
    pub format: Format,
    /// Directory for raw per-entity JSON snapshots written during sync.
    pub raw_snapshot_dir: Option<PathBuf>,
    /// Root of the label-partitioned Parquet feature dataset.
    pub feature_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/datasets"),
            min_records: None,
            seed: 42,
            validation_ratio: 0.2,
            stratify: true,
            format: Format::Jsonl,
            raw_snapshot_dir: None,
            feature_dir: PathBuf::from("data/feature"),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Source section.
    pub source: Option<ConfigFileSource>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Export section.
    pub export: Option<ConfigFileExport>,
    /// Category mapping.
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Source section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSource {
    /// API base URL.
    pub base_url: Option<String>,
    /// Bearer token.
    pub bearer_token: Option<String>,
    /// Per-entity fetch bound.
    pub max_results: Option<usize>,
    /// Page request size.
    pub page_size: Option<usize>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// Database path.
    pub path: Option<String>,
}

/// Export section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileExport {
    /// Output directory.
    pub output_dir: Option<String>,
    /// Per-entity threshold.
    pub min_records: Option<usize>,
    /// Shuffle seed.
    pub seed: Option<u64>,
    /// Validation fraction.
    pub validation_ratio: Option<f64>,
    /// Stratify by label.
    pub stratify: Option<bool>,
    /// Output format name.
    pub format: Option<String>,
    /// Raw snapshot directory.
    pub raw_snapshot_dir: Option<String>,
    /// Feature dataset root.
    pub feature_dir: Option<String>,
}

impl HarvestConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("invalid config file: {e}")))?;
        let config = Self::from_config_file(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`timeline-harvest/config.toml`) and
    /// returns defaults if nothing is found.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but is invalid.
    pub fn load_default() -> Result<Self> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let platform_config = base_dirs
            .config_dir()
            .join("timeline-harvest")
            .join("config.toml");
        if platform_config.exists() {
            return Self::load_from_file(&platform_config);
        }

        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    ///
    /// Only the bearer token is taken from the environment.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        let token = std::env::var(BEARER_TOKEN_ENV)
            .or_else(|_| std::env::var(LEGACY_BEARER_TOKEN_ENV))
            .ok()
            .filter(|t| !t.trim().is_empty());
        if let Some(token) = token {
            self.source.bearer_token = Some(SecretString::from(token));
        }
        self
    }

    /// Validates numeric settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.source.max_results == 0 {
            return Err(Error::InvalidInput(
                "source.max_results must be positive".to_string(),
            ));
        }
        if !(5..=100).contains(&self.source.page_size) {
            return Err(Error::InvalidInput(format!(
                "source.page_size must be within 5..=100, got {}",
                self.source.page_size
            )));
        }
        let ratio = self.export.validation_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(Error::InvalidInput(format!(
                "export.validation_ratio must be within (0, 1), got {ratio}"
            )));
        }
        Ok(())
    }

    /// Returns the entity handles of one category.
    #[must_use]
    pub fn entities(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    /// Returns every configured handle once, in category order.
    #[must_use]
    pub fn all_entities(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.categories
            .values()
            .flatten()
            .filter(|handle| seen.insert(handle.as_str()))
            .cloned()
            .collect()
    }

    /// Sets the store path.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    /// Sets the export output directory.
    #[must_use]
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.export.output_dir = path.into();
        self
    }

    /// Adds a category.
    #[must_use]
    pub fn with_category<I, S>(mut self, category: impl Into<String>, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.insert(
            category.into(),
            entities.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Converts a `ConfigFile` to `HarvestConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(source) = file.source {
            if let Some(base_url) = source.base_url {
                config.source.base_url = base_url.trim_end_matches('/').to_string();
            }
            config.source.bearer_token = source.bearer_token.map(SecretString::from);
            if let Some(v) = source.max_results {
                config.source.max_results = v;
            }
            if let Some(v) = source.page_size {
                config.source.page_size = v;
            }
            if let Some(v) = source.timeout_ms {
                config.source.timeout_ms = v;
            }
            if let Some(v) = source.connect_timeout_ms {
                config.source.connect_timeout_ms = v;
            }
        }
        if let Some(path) = file.store.and_then(|store| store.path) {
            config.store.path = PathBuf::from(path);
        }
        if let Some(export) = file.export {
            if let Some(dir) = export.output_dir {
                config.export.output_dir = PathBuf::from(dir);
            }
            config.export.min_records = export.min_records;
            if let Some(v) = export.seed {
                config.export.seed = v;
            }
            if let Some(v) = export.validation_ratio {
                config.export.validation_ratio = v;
            }
            if let Some(v) = export.stratify {
                config.export.stratify = v;
            }
            if let Some(format) = export.format {
                config.export.format = format.parse()?;
            }
            config.export.raw_snapshot_dir = export.raw_snapshot_dir.map(PathBuf::from);
            if let Some(dir) = export.feature_dir {
                config.export.feature_dir = PathBuf::from(dir);
            }
        }
        config.categories = file.categories;

        Ok(config)
    }
}
