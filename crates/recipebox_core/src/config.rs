//! On-disk configuration for RecipeBox.
//!
//! # Responsibility
//! - Resolve the data directory and derived store paths.
//! - Load optional overrides from `config.toml`.
//!
//! # Invariants
//! - A missing config file yields defaults, never an error.
//! - Relative paths in the file are resolved against `data_dir`.
//! - `data_dir` and every derived path are absolute.

use crate::image::DEFAULT_MAX_IMAGE_KB;
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "recipebox";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DATABASE_FILE: &str = "recipebox.sqlite3";
const DEFAULT_FALLBACK_DIR: &str = "fallback";
const DEFAULT_LOG_DIR: &str = "logs";

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    /// No platform data directory and no explicit `data_dir`.
    NoDataDir,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::NoDataDir => write!(f, "could not determine a data directory"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::NoDataDir => None,
        }
    }
}

/// Raw file shape; every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    log_level: Option<String>,
    log_dir: Option<PathBuf>,
    database_file: Option<PathBuf>,
    fallback_dir: Option<PathBuf>,
    image_max_kb: Option<u64>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub database_path: PathBuf,
    pub fallback_dir: PathBuf,
    pub image_max_kb: u64,
}

impl CoreConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            log_level: default_log_level().to_string(),
            log_dir: data_dir.join(DEFAULT_LOG_DIR),
            database_path: data_dir.join(DEFAULT_DATABASE_FILE),
            fallback_dir: data_dir.join(DEFAULT_FALLBACK_DIR),
            image_max_kb: DEFAULT_MAX_IMAGE_KB,
            data_dir,
        }
    }

    /// Loads `<platform data dir>/recipebox/config.toml`, or defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        let data_dir = default_data_dir().ok_or(ConfigError::NoDataDir)?;
        Self::load_from(data_dir.join(CONFIG_FILE_NAME), Some(data_dir))
    }

    /// Loads a specific config file.
    ///
    /// `fallback_data_dir` is used when the file does not set `data_dir`;
    /// otherwise the file's parent directory is used.
    pub fn load_from(
        path: impl AsRef<Path>,
        fallback_data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = match fs::read_to_string(path) {
            Ok(text) => toml::from_str::<ConfigFile>(&text).map_err(|source| {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => ConfigFile::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let data_dir = file
            .data_dir
            .clone()
            .or(fallback_data_dir)
            .or_else(|| path.parent().map(Path::to_path_buf))
            .ok_or(ConfigError::NoDataDir)?;
        let data_dir = absolute(data_dir)?;
        Ok(Self::from_file(file, data_dir))
    }

    fn from_file(file: ConfigFile, data_dir: PathBuf) -> Self {
        let mut config = Self::with_data_dir(data_dir);
        if let Some(level) = file.log_level {
            config.log_level = level;
        }
        if let Some(dir) = file.log_dir {
            config.log_dir = resolve(&config.data_dir, dir);
        }
        if let Some(db) = file.database_file {
            config.database_path = resolve(&config.data_dir, db);
        }
        if let Some(dir) = file.fallback_dir {
            config.fallback_dir = resolve(&config.data_dir, dir);
        }
        if let Some(max_kb) = file.image_max_kb {
            config.image_max_kb = max_kb;
        }
        config
    }
}

/// Platform data directory joined with `recipebox`.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME))
}

fn absolute(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(cwd.join(path))
}

fn resolve(base: &Path, value: PathBuf) -> PathBuf {
    if value.is_absolute() {
        value
    } else {
        base.join(value)
    }
}
