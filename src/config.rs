use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::plan::{ExcludePatterns, SyncPolicy};

/// Main configuration structure for repoclone
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Default local root that organization repositories are mirrored into
    pub base_directory: String,

    /// GitHub authentication and discovery settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Guard rails in front of destructive actions
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Pull request report settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Protocol of the clone URL handed to git
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    /// git@github.com:org/repo.git
    #[default]
    Ssh,
    /// https://github.com/org/repo.git
    Https,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "token", "gh_cli", "none"

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// API base URL override (GitHub Enterprise)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Page size for listing requests
    #[serde(default = "default_per_page")]
    pub per_page: u8,

    /// Which clone URL to use
    #[serde(default)]
    pub clone_protocol: CloneProtocol,

    /// Repositories that are never cloned, updated or deleted
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Clone repositories that are missing locally
    #[serde(default = "default_true")]
    pub clone: bool,

    /// Pull repositories that are already present
    #[serde(default = "default_true")]
    pub update: bool,

    /// Delete local directories whose repository no longer exists
    #[serde(default)]
    pub remove: bool,

    /// Maximum parallel actions
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Timeout for git operations in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Fast-forward only pulls
    #[serde(default)]
    pub fast_forward_only: bool,

    /// git executable
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
}

/// Deletion gate configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SafetyConfig {
    /// Refuse a run that would delete more than this share of local directories
    #[serde(default = "default_max_delete_percent")]
    pub max_delete_percent: u8,

    /// Allow deletions when the organization reports no repositories at all
    #[serde(default)]
    pub allow_empty_remote: bool,
}

/// Pull request report configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReportConfig {
    /// Pull requests older than this many days are highlighted as a warning
    #[serde(default = "default_warn_after_days")]
    pub warn_after_days: i64,

    /// Pull requests older than this many days are highlighted as an error
    #[serde(default = "default_error_after_days")]
    pub error_after_days: i64,

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_per_page() -> u8 {
    100
}
fn default_true() -> bool {
    true
}
fn default_max_parallel() -> usize {
    1
}
fn default_timeout() -> u64 {
    300
}
fn default_git_binary() -> String {
    "git".to_string()
}
fn default_max_delete_percent() -> u8 {
    50
}
fn default_warn_after_days() -> i64 {
    3
}
fn default_error_after_days() -> i64 {
    7
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            token_env: default_token_env(),
            api_url: None,
            per_page: default_per_page(),
            clone_protocol: CloneProtocol::default(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            clone: default_true(),
            update: default_true(),
            remove: false,
            max_parallel: default_max_parallel(),
            timeout: default_timeout(),
            fast_forward_only: false,
            git_binary: default_git_binary(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_delete_percent: default_max_delete_percent(),
            allow_empty_remote: false,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            warn_after_days: default_warn_after_days(),
            error_after_days: default_error_after_days(),
            color: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;
            config.expand_paths()?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repoclone").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.base_directory = shellexpand::full(&self.base_directory)
            .context("Failed to expand base_directory path")?
            .into_owned();

        Ok(())
    }

    /// Reconciliation policy configured as the default for `sync`
    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            clone: self.sync.clone,
            update: self.sync.update,
            remove: self.sync.remove,
        }
    }

    /// Compiled exclusion patterns
    pub fn exclude_patterns(&self) -> ExcludePatterns {
        ExcludePatterns::new(&self.github.exclude_patterns)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_directory: "${HOME}/src".to_string(),
            github: GitHubConfig::default(),
            sync: SyncConfig::default(),
            safety: SafetyConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
