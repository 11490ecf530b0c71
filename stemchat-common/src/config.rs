//! Bootstrap configuration loading and root folder resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (and their `STEMCHAT_*` environment fallbacks)
//! 2. TOML configuration file
//! 3. Compiled defaults
//!
//! A missing TOML file is not an error unless it was named explicitly; the
//! service starts with defaults and logs a warning.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Subdirectory of the root folder holding uploaded source files
pub const INBOX_DIR_NAME: &str = "uploaded_files";

/// Subdirectory of the root folder holding separation results
pub const OUTBOX_DIR_NAME: &str = "processed_files";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; absent sections fall back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the inbox and outbox directories
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Bind address (default 127.0.0.1)
    #[serde(default)]
    pub host: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External separation command
    #[serde(default)]
    pub separation: SeparationConfig,

    /// Song lookup service
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Interactive session behaviour
    #[serde(default)]
    pub session: SessionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External separation process invocation
///
/// The runner executes `<program> <args...> -o <outbox> <input file>`.
/// The default filename format keeps stems flat in the outbox, named
/// `<source stem>_<instrument>.<codec>`, so downloads can see them.
#[derive(Debug, Clone, Deserialize)]
pub struct SeparationConfig {
    #[serde(default = "default_separation_program")]
    pub program: String,

    #[serde(default = "default_separation_args")]
    pub args: Vec<String>,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            program: default_separation_program(),
            args: default_separation_args(),
        }
    }
}

/// Remote song catalog settings
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    /// Catalog base URL; the client appends `/api/songs/`
    #[serde(default = "default_lookup_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: default_lookup_base_url(),
            timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Interactive session settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Pause between the "complete" and "downloading" notifications
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Check the inbox for the announced file before dispatching a job.
    /// `false` trusts the client's `uploaded:` message as-is.
    #[serde(default = "default_verify_uploads")]
    pub verify_uploads: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            verify_uploads: default_verify_uploads(),
        }
    }
}

impl SessionConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_separation_program() -> String {
    "spleeter".to_string()
}

fn default_separation_args() -> Vec<String> {
    vec![
        "separate".to_string(),
        "-p".to_string(),
        "spleeter:2stems".to_string(),
        "-f".to_string(),
        "{filename}_{instrument}.{codec}".to_string(),
    ]
}

fn default_lookup_base_url() -> String {
    "https://vocadb.net".to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    30
}

fn default_pacing_ms() -> u64 {
    2000
}

fn default_verify_uploads() -> bool {
    true
}

impl TomlConfig {
    /// Load configuration
    ///
    /// An explicit path must exist and parse. Without one, the platform
    /// config locations are searched and defaults are used if none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) => Self::from_file(&path),
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.separation.program.trim().is_empty() {
            return Err(Error::Config(
                "separation.program must not be empty".to_string(),
            ));
        }
        if self.lookup.base_url.trim().is_empty() {
            return Err(Error::Config("lookup.base_url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Search the platform config locations for `stemchat/config.toml`
///
/// Linux checks the user config dir, then `/etc/stemchat/config.toml`.
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("stemchat").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/stemchat/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder
///
/// CLI argument (clap already folds in `STEMCHAT_ROOT_FOLDER`), then TOML,
/// then the OS default.
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/stemchat
        dirs::data_local_dir()
            .map(|d| d.join("stemchat"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/stemchat"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/stemchat
        dirs::data_dir()
            .map(|d| d.join("stemchat"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/stemchat"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\stemchat
        dirs::data_local_dir()
            .map(|d| d.join("stemchat"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\stemchat"))
    } else {
        PathBuf::from("./stemchat_data")
    }
}

/// Inbox and outbox locations under a root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub inbox: PathBuf,
    pub outbox: PathBuf,
}

impl StoragePaths {
    pub fn under(root_folder: &Path) -> Self {
        Self {
            inbox: root_folder.join(INBOX_DIR_NAME),
            outbox: root_folder.join(OUTBOX_DIR_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn test_default_root_folder() {
        let folder = get_default_root_folder();
        assert!(!folder.as_os_str().is_empty());
    }

    #[test]
    fn test_storage_paths_layout() {
        let paths = StoragePaths::under(Path::new("/srv/stemchat"));
        assert_eq!(paths.inbox, PathBuf::from("/srv/stemchat/uploaded_files"));
        assert_eq!(paths.outbox, PathBuf::from("/srv/stemchat/processed_files"));
    }

    #[test]
    fn test_session_pacing_default_is_two_seconds() {
        assert_eq!(SessionConfig::default().pacing(), Duration::from_secs(2));
    }
}
