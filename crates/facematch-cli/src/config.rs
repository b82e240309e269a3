use facematch_core::{ServiceConfig, DEFAULT_MATCH_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("match threshold must be a finite non-negative number, got {0}")]
    InvalidThreshold(f64),
}

/// CLI configuration: defaults, then an optional TOML file, then
/// `FACEMATCH_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory enrolled source images are copied into.
    pub upload_dir: PathBuf,
    /// Euclidean distance below which a face counts as a match.
    pub match_threshold: f64,
    /// Accepted image file extensions, lowercase.
    pub allowed_extensions: Vec<String>,
}

/// On-disk TOML layout. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    db_path: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
    match_threshold: Option<f64>,
    allowed_extensions: Option<Vec<String>>,
}

impl Config {
    /// Load from the process environment. `file` overrides `FACEMATCH_CONFIG`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Build a config using `env` for variable lookup.
    pub fn resolve(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let data_dir = env("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facematch");

        let mut config = Self {
            db_path: data_dir.join("faces.db"),
            upload_dir: data_dir.join("uploads"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        };

        let file = file
            .map(Path::to_path_buf)
            .or_else(|| env("FACEMATCH_CONFIG").map(PathBuf::from));
        if let Some(path) = file {
            config.apply_file(&path)?;
        }

        if let Some(v) = env("FACEMATCH_DB_PATH") {
            config.db_path = PathBuf::from(v);
        }
        if let Some(v) = env("FACEMATCH_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = env("FACEMATCH_MATCH_THRESHOLD") {
            config.match_threshold = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "FACEMATCH_MATCH_THRESHOLD",
                value: v.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");

        if let Some(v) = file.db_path {
            self.db_path = v;
        }
        if let Some(v) = file.upload_dir {
            self.upload_dir = v;
        }
        if let Some(v) = file.match_threshold {
            self.match_threshold = v;
        }
        if let Some(v) = file.allowed_extensions {
            self.allowed_extensions = v
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect();
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.match_threshold.is_finite() || self.match_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.match_threshold));
        }
        Ok(())
    }

    /// Matching parameters for the service.
    pub fn service(&self) -> ServiceConfig {
        ServiceConfig {
            match_threshold: self.match_threshold,
        }
    }
}
