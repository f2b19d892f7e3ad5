use crate::{ChangeKind, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for cxxcompat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompatConfig {
    /// Compatibility policy applied by the classifier
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Which parts of a declaration tree become the surface
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compatibility policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Lowest tier that makes a comparison fail
    #[serde(default = "default_fail_on")]
    pub fail_on: Tier,

    /// Whether the exception specification is part of the calling
    /// convention on the target ABI. When false, tightening `noexcept`
    /// defaults to Neutral.
    #[serde(default = "default_true")]
    pub noexcept_affects_abi: bool,

    /// Report Neutral findings
    #[serde(default = "default_true")]
    pub report_neutral: bool,

    /// Per change-kind tier overrides, keyed by the snake_case kind tag
    /// (e.g. `noexcept_tightened = "neutral"`)
    #[serde(default)]
    pub overrides: BTreeMap<String, Tier>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            fail_on: default_fail_on(),
            noexcept_affects_abi: true,
            report_neutral: true,
            overrides: BTreeMap::new(),
        }
    }
}

impl PolicyConfig {
    /// Tier for a finding of `kind` whose rule proposes `default`.
    /// Unverifiable kinds always stay Unknown.
    pub fn resolve(&self, kind: ChangeKind, default: Tier) -> Tier {
        if kind.is_unverifiable() {
            return Tier::Unknown;
        }
        if let Some(tier) = self.overrides.get(&kind.as_str()) {
            return *tier;
        }
        if kind == ChangeKind::NoexceptTightened && !self.noexcept_affects_abi {
            return Tier::Neutral;
        }
        default
    }
}

/// Extraction scope
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractConfig {
    /// Qualified namespace names to extract; empty means everything
    #[serde(default)]
    pub roots: Vec<String>,

    /// Namespaces skipped wherever they appear, matched on their last
    /// component (e.g. "detail")
    #[serde(default)]
    pub exclude_namespaces: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_fail_on() -> Tier {
    Tier::SourceBreak
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const LOCAL_CONFIG: &str = ".cxxcompat.toml";

/// Configuration manager with file discovery and environment overrides
pub struct ConfigManager {
    config: CompatConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (./.cxxcompat.toml, then ~/.cxxcompat/config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();
        let (config, config_path) = Self::discover_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load an explicit config file, still applying environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::load_dotenv();
        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    fn finish(config: CompatConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_overrides_from(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!("Config file: {}", path.display()),
            None => info!("No config file found, using defaults"),
        }
        info!(
            "Policy: fail_on={}, noexcept_affects_abi={}, {} override(s)",
            config.policy.fail_on,
            config.policy.noexcept_affects_abi,
            config.policy.overrides.len()
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
        }
    }

    /// Search order:
    /// 1. ./.cxxcompat.toml
    /// 2. ~/.cxxcompat/config.toml
    /// 3. defaults
    fn discover_config_file() -> Result<(CompatConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(LOCAL_CONFIG);
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cxxcompat").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((CompatConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<CompatConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<CompatConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply overrides from an environment lookup. Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides_from<F>(mut config: CompatConfig, lookup: F) -> CompatConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CXXCOMPAT_FAIL_ON") {
            match value.parse::<Tier>() {
                Ok(tier) => config.policy.fail_on = tier,
                Err(e) => warn!("Ignoring CXXCOMPAT_FAIL_ON: {}", e),
            }
        }
        if let Some(value) = lookup("CXXCOMPAT_NOEXCEPT_AFFECTS_ABI") {
            config.policy.noexcept_affects_abi = value.to_lowercase() == "true" || value == "1";
        }
        if let Some(value) = lookup("CXXCOMPAT_ROOTS") {
            config.extract.roots = split_list(&value);
        }
        if let Some(value) = lookup("CXXCOMPAT_EXCLUDE_NAMESPACES") {
            config.extract.exclude_namespaces = split_list(&value);
        }
        if let Some(format) = lookup("CXXCOMPAT_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }
        config
    }

    pub fn validate_config(config: &CompatConfig) -> Result<(), ConfigError> {
        for (key, tier) in &config.policy.overrides {
            let kind: ChangeKind = serde_json::from_value(serde_json::Value::String(key.clone()))
                .map_err(|_| {
                    ConfigError::ValidationError(format!("Unknown change kind in overrides: {}", key))
                })?;
            if kind.is_unverifiable() && *tier != Tier::Unknown {
                return Err(ConfigError::ValidationError(format!(
                    "{} reports a verdict that could not be verified and cannot be lowered to {}",
                    key, tier
                )));
            }
        }

        // RUST_LOG may carry full directives; only bare levels are checked.
        let level = config.logging.level.as_str();
        if !level.contains('=') && !level.contains(',') {
            match level {
                "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error, off",
                        other
                    )))
                }
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact",
                    other
                )))
            }
        }

        for root in &config.extract.roots {
            if root.trim().is_empty() || root.ends_with("::") {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid extraction root: `{}`",
                    root
                )));
            }
        }

        Ok(())
    }

    pub fn from_config(config: CompatConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    pub fn config(&self) -> &CompatConfig {
        &self.config
    }

    pub fn into_config(self) -> CompatConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Write a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = CompatConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
