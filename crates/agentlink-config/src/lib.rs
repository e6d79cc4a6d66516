//! Multi-tier TOML configuration for AgentLink.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > global config file > defaults

use agentlink_types::{ConfigError, PermissionMode, ToolsSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long the peer has to answer an approval request, in milliseconds.
pub const DEFAULT_APPROVAL_TIMEOUT_MS: u64 = 55_000;

/// Resolved configuration for an AgentLink process.
#[derive(Debug, Clone)]
pub struct AgentLinkConfig {
    pub approval_timeout_ms: u64,
    /// Used when a dispatch does not name a permission mode.
    pub permission_mode: PermissionMode,
    /// Fallback working directory when a dispatch names neither `cwd` nor `projectPath`.
    pub default_cwd: Option<PathBuf>,
    pub model: Option<String>,
    /// Used when a dispatch carries no `toolsSettings`.
    pub default_tools: ToolsSettings,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub approval: ApprovalSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub tools: ToolsSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalSettings {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    pub permission_mode: Option<PermissionMode>,
    pub cwd: Option<PathBuf>,
    pub model: Option<String>,
}

/// Default tool policy section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub disallowed: Vec<String>,
    #[serde(default)]
    pub skip_permissions: bool,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub approval_timeout_ms: Option<u64>,
    pub permission_mode: Option<PermissionMode>,
    pub model: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl AgentLinkConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Global config (~/.agentlink/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));
        Self::resolve(settings, |key| std::env::var(key).ok(), overrides, config_dir)
    }

    /// Resolve from already-read sources. `env` looks up environment variables.
    pub fn resolve(
        settings: SettingsFile,
        env: impl Fn(&str) -> Option<String>,
        overrides: CliOverrides,
        config_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        let env_timeout = env("AGENTLINK_APPROVAL_TIMEOUT_MS")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "AGENTLINK_APPROVAL_TIMEOUT_MS".into(),
                        message: e.to_string(),
                    })
            })
            .transpose()?;

        let approval_timeout_ms = overrides
            .approval_timeout_ms
            .or(env_timeout)
            .or(settings.approval.timeout_ms)
            .unwrap_or(DEFAULT_APPROVAL_TIMEOUT_MS);
        if approval_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "approval.timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        let env_mode = env("AGENTLINK_PERMISSION_MODE")
            .map(|raw| {
                raw.trim()
                    .parse::<PermissionMode>()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: "AGENTLINK_PERMISSION_MODE".into(),
                        message,
                    })
            })
            .transpose()?;

        let permission_mode = overrides
            .permission_mode
            .or(env_mode)
            .or(settings.session.permission_mode)
            .unwrap_or_default();

        let model = overrides
            .model
            .or_else(|| env("AGENTLINK_MODEL"))
            .or(settings.session.model);

        let default_cwd = overrides.cwd.or(settings.session.cwd);

        Ok(AgentLinkConfig {
            approval_timeout_ms,
            permission_mode,
            default_cwd,
            model,
            default_tools: ToolsSettings {
                allowed_tools: settings.tools.allowed,
                disallowed_tools: settings.tools.disallowed,
                skip_permissions: settings.tools.skip_permissions,
            },
            config_dir,
        })
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }
}

impl Default for AgentLinkConfig {
    fn default() -> Self {
        Self {
            approval_timeout_ms: DEFAULT_APPROVAL_TIMEOUT_MS,
            permission_mode: PermissionMode::Default,
            default_cwd: None,
            model: None,
            default_tools: ToolsSettings::default(),
            config_dir: config_dir(),
        }
    }
}

/// Get the AgentLink config directory path (~/.agentlink/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTLINK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentlink")
}

/// Load and parse a TOML settings file, returning defaults on any error.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}
