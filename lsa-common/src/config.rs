//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file; everything in it has a
//! compiled default so a missing file never prevents startup.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LSA_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder`)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "LSA_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "lsa.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and logs
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path (defaults to `<root_folder>/lsa.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Product-name classification collaborator used by deduplication
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// HTTP endpoint; when absent the local similarity classifier is used
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound for one classification call
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

/// Screenshot metrics extraction collaborator used when finishing a session
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_extractor_timeout_ms")]
    pub timeout_ms: u64,
}

/// Reporting behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    /// Offset from UTC used to place day boundaries for named periods
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_classifier_timeout_ms() -> u64 {
    15_000
}

fn default_extractor_timeout_ms() -> u64 {
    30_000
}

fn default_page_size() -> i64 {
    20
}

fn default_max_page_size() -> i64 {
    100
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            classifier: ClassifierConfig::default(),
            extractor: ExtractorConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: default_extractor_timeout_ms(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, or the platform default location
    ///
    /// A missing default file yields compiled defaults. A missing explicit
    /// file is an error, since the operator asked for it by name.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Read config {} failed: {}", path.display(), e))
            })?;
            info!("Loaded configuration from {}", path.display());
            return Self::from_toml_str(&content);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&content)
            }
            _ => {
                warn!("No configuration file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.reporting.default_page_size < 1 {
            return Err(Error::Config(
                "reporting.default_page_size must be at least 1".to_string(),
            ));
        }
        if self.reporting.max_page_size < self.reporting.default_page_size {
            return Err(Error::Config(
                "reporting.max_page_size must not be smaller than default_page_size".to_string(),
            ));
        }
        if self.reporting.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(Error::Config(format!(
                "reporting.utc_offset_minutes out of range: {}",
                self.reporting.utc_offset_minutes
            )));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(Error::Config("classifier.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Database path, defaulting to the root folder's database file
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME))
    }
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lsa").join("lsa.toml"))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/lsa (or /var/lib/lsa for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("lsa"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lsa"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("lsa"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lsa"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("lsa"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lsa"))
    } else {
        PathBuf::from("./lsa_data")
    }
}
