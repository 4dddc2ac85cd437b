//! Configuration loading and data folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the caller logs a warning and
//! continues with defaults. A TOML file that exists but cannot be parsed is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "PCHIST_DATA_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "PCHIST_CONFIG";

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "pocketcasts.db";

/// Marker file present inside Docker containers
pub const DOCKER_MARKER: &str = "/.dockerenv";

/// Data folder used when running inside a container
pub const DOCKER_DATA_FOLDER: &str = "/app/data";

/// Default Pocket Casts API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.pocketcasts.com";

/// Default Pocket Casts podcast catalogue endpoint
pub const DEFAULT_PODCAST_API_BASE_URL: &str = "https://podcast-api.pocketcasts.com";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
    pub api_base_url: String,
    pub podcast_api_base_url: String,
    pub request_timeout_secs: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            data_folder: default_data_folder(),
            log_level: "info".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            podcast_api_base_url: DEFAULT_PODCAST_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    // ~/.local/share/pchist, ~/Library/Application Support/pchist, %LOCALAPPDATA%\pchist
    dirs::data_local_dir()
        .map(|d| d.join("pchist"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the SQLite database
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Retention configuration
///
/// `max_records` unset means the history grows without bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default)]
    pub max_records: Option<usize>,
}

/// Remote API configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub podcast_base_url: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Credentials stored in the TOML file (lowest priority source)
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl TomlConfig {
    /// Load and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the config file if one was located, otherwise defaults
    ///
    /// Returns the path actually loaded so the caller can report it.
    pub fn load_or_default(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        match path {
            Some(path) if path.exists() => Ok((Self::load(&path)?, Some(path))),
            _ => Ok((Self::default(), None)),
        }
    }
}

/// Locate the config file
///
/// Priority: CLI argument, `PCHIST_CONFIG`, `~/.config/pchist/config.toml`,
/// `/etc/pchist/config.toml`. Returns `None` when nothing is found.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("pchist").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/pchist/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Data folder resolution
///
/// Priority: CLI argument, `PCHIST_DATA_FOLDER`, TOML `data_folder`,
/// `/app/data` inside Docker, OS default.
#[derive(Debug, Clone)]
pub struct DataFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_folder: Option<PathBuf>,
    docker_marker: PathBuf,
}

impl DataFolderResolver {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml_folder: None,
            docker_marker: PathBuf::from(DOCKER_MARKER),
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml_folder(mut self, toml_folder: Option<PathBuf>) -> Self {
        self.toml_folder = toml_folder;
        self
    }

    /// Override the container marker path (tests)
    pub fn with_docker_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.docker_marker = marker.into();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_folder {
            return path.clone();
        }

        // Priority 4: container layout
        if self.docker_marker.exists() {
            return PathBuf::from(DOCKER_DATA_FOLDER);
        }

        // Priority 5: OS-dependent compiled default
        CompiledDefaults::for_current_platform().data_folder
    }
}

impl Default for DataFolderResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepares the resolved data folder for use
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// Create the folder if missing and verify it is writable
    ///
    /// Writes and removes a probe file; a permission failure is reported as
    /// a configuration error naming the folder.
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_folder).map_err(|e| {
            Error::Config(format!(
                "Cannot create data folder {}: {}",
                self.data_folder.display(),
                e
            ))
        })?;

        let probe = self.data_folder.join(".pchist_write_test");
        std::fs::write(&probe, b"test")
            .and_then(|_| std::fs::remove_file(&probe))
            .map_err(|e| {
                tracing::error!(
                    "Permission denied when trying to write to {}",
                    self.data_folder.display()
                );
                Error::Config(format!(
                    "Data folder {} is not writable: {}",
                    self.data_folder.display(),
                    e
                ))
            })?;

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE_NAME)
    }
}
