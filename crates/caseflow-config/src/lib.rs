use caseflow_domain::{Actor, ActorRole, SortMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_CASEFLOW_CONFIG: &str = "CASEFLOW_CONFIG";
pub const ENV_CASEFLOW_API_TOKEN: &str = "CASEFLOW_API_TOKEN";

const DEFAULT_BACKEND_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_ACTOR_ROLE: ActorRole = ActorRole::Lawyer;
const DEFAULT_PRESENCE_VISIBLE_INTERVAL_MS: u64 = 2_500;
const DEFAULT_PRESENCE_HIDDEN_INTERVAL_MS: u64 = 8_000;
const DEFAULT_PRESENCE_MAX_BACKOFF_MS: u64 = 30_000;
const DEFAULT_PRESENCE_DEGRADED_AFTER_FAILURES: u32 = 3;
const DEFAULT_TYPING_HEARTBEAT_INTERVAL_MS: u64 = 2_500;
const DEFAULT_BOARD_LIMIT: u32 = 400;
const MAX_BOARD_LIMIT: u32 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// On-disk configuration. The API token is deliberately absent: it is read from
/// `CASEFLOW_API_TOKEN` and never written back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CaseflowConfig {
    #[serde(default)]
    pub backend: BackendConfigToml,
    #[serde(default)]
    pub actor: ActorConfigToml,
    #[serde(default)]
    pub presence: PresenceConfigToml,
    #[serde(default)]
    pub typing: TypingConfigToml,
    #[serde(default)]
    pub board: BoardConfigToml,
    #[serde(default)]
    pub logging: LoggingConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfigToml {
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfigToml {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorConfigToml {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_actor_role")]
    pub role: String,
}

impl Default for ActorConfigToml {
    fn default() -> Self {
        Self {
            id: String::new(),
            role: default_actor_role(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceConfigToml {
    #[serde(default = "default_presence_visible_interval_ms")]
    pub visible_interval_ms: u64,
    #[serde(default = "default_presence_hidden_interval_ms")]
    pub hidden_interval_ms: u64,
    #[serde(default = "default_presence_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_presence_degraded_after_failures")]
    pub degraded_after_failures: u32,
}

impl Default for PresenceConfigToml {
    fn default() -> Self {
        Self {
            visible_interval_ms: default_presence_visible_interval_ms(),
            hidden_interval_ms: default_presence_hidden_interval_ms(),
            max_backoff_ms: default_presence_max_backoff_ms(),
            degraded_after_failures: default_presence_degraded_after_failures(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingConfigToml {
    #[serde(default = "default_typing_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

impl Default for TypingConfigToml {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_typing_heartbeat_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardConfigToml {
    #[serde(default = "default_board_limit")]
    pub default_limit: u32,
    #[serde(default = "default_board_sort_mode")]
    pub sort_mode: String,
}

impl Default for BoardConfigToml {
    fn default() -> Self {
        Self {
            default_limit: default_board_limit(),
            sort_mode: default_board_sort_mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoggingConfigToml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRuntimeConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceRuntimeConfig {
    pub visible_interval: Duration,
    pub hidden_interval: Duration,
    pub max_backoff: Duration,
    pub degraded_after_failures: u32,
    pub typing_heartbeat: Duration,
}

impl CaseflowConfig {
    pub fn backend_runtime(&self) -> BackendRuntimeConfig {
        BackendRuntimeConfig {
            base_url: self.backend.base_url.clone(),
            request_timeout: Duration::from_secs(self.backend.request_timeout_secs),
            api_token: api_token_from_env(),
        }
    }

    pub fn presence_runtime(&self) -> PresenceRuntimeConfig {
        PresenceRuntimeConfig {
            visible_interval: Duration::from_millis(self.presence.visible_interval_ms),
            hidden_interval: Duration::from_millis(self.presence.hidden_interval_ms),
            max_backoff: Duration::from_millis(self.presence.max_backoff_ms),
            degraded_after_failures: self.presence.degraded_after_failures,
            typing_heartbeat: Duration::from_millis(self.typing.heartbeat_interval_ms),
        }
    }

    pub fn board_sort_mode(&self) -> SortMode {
        SortMode::from_key(&self.board.sort_mode).unwrap_or_default()
    }

    /// Acting user. An id has to be configured; the role falls back to LAWYER.
    pub fn actor(&self) -> Result<Actor, ConfigError> {
        let id = self.actor.id.trim();
        if id.is_empty() {
            return Err(ConfigError::configuration(
                "[actor] id is not set in CASEFLOW_CONFIG",
            ));
        }
        let role = ActorRole::from_key(&self.actor.role).unwrap_or(DEFAULT_ACTOR_ROLE);
        Ok(Actor::new(id, role))
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging
            .file
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }
}

pub fn load_from_env() -> Result<CaseflowConfig, ConfigError> {
    let path = config_path_from_env()?;
    load_from_path(path)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<CaseflowConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("caseflow").join("config.toml"))
}

pub fn api_token_from_env() -> Option<String> {
    std::env::var(ENV_CASEFLOW_API_TOKEN)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_CASEFLOW_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "CASEFLOW_CONFIG contained invalid UTF-8",
        )),
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn default_backend_base_url() -> String {
    DEFAULT_BACKEND_BASE_URL.to_owned()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_actor_role() -> String {
    DEFAULT_ACTOR_ROLE.as_key().to_owned()
}

fn default_presence_visible_interval_ms() -> u64 {
    DEFAULT_PRESENCE_VISIBLE_INTERVAL_MS
}

fn default_presence_hidden_interval_ms() -> u64 {
    DEFAULT_PRESENCE_HIDDEN_INTERVAL_MS
}

fn default_presence_max_backoff_ms() -> u64 {
    DEFAULT_PRESENCE_MAX_BACKOFF_MS
}

fn default_presence_degraded_after_failures() -> u32 {
    DEFAULT_PRESENCE_DEGRADED_AFTER_FAILURES
}

fn default_typing_heartbeat_interval_ms() -> u64 {
    DEFAULT_TYPING_HEARTBEAT_INTERVAL_MS
}

fn default_board_limit() -> u32 {
    DEFAULT_BOARD_LIMIT
}

fn default_board_sort_mode() -> String {
    SortMode::default().as_key().to_owned()
}

fn persist_config(path: &Path, config: &CaseflowConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize CASEFLOW_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write CASEFLOW_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<CaseflowConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for CASEFLOW_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = CaseflowConfig::default();
            persist_config(path, &default_config)?;
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read CASEFLOW_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: CaseflowConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse CASEFLOW_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    if normalize_config(&mut config) {
        persist_config(path, &config)?;
    }

    Ok(config)
}

/// Repairs out-of-range values in place. Returns whether anything changed.
pub fn normalize_config(config: &mut CaseflowConfig) -> bool {
    let mut changed = false;

    changed |= normalize_backend_config(&mut config.backend);
    changed |= normalize_actor_config(&mut config.actor);
    changed |= normalize_presence_config(&mut config.presence);
    changed |= clamp_or_default(
        &mut config.typing.heartbeat_interval_ms,
        500,
        30_000,
        DEFAULT_TYPING_HEARTBEAT_INTERVAL_MS,
    );
    changed |= normalize_board_config(&mut config.board);

    if config
        .logging
        .file
        .as_deref()
        .is_some_and(|path| path.trim().is_empty())
    {
        config.logging.file = None;
        changed = true;
    }

    changed
}

pub fn normalize_backend_config(config: &mut BackendConfigToml) -> bool {
    let mut changed = false;

    let trimmed = config.base_url.trim().trim_end_matches('/');
    let normalized_base_url = if trimmed.is_empty() {
        default_backend_base_url()
    } else {
        trimmed.to_owned()
    };
    if normalized_base_url != config.base_url {
        config.base_url = normalized_base_url;
        changed = true;
    }

    changed |= clamp_or_default(
        &mut config.request_timeout_secs,
        1,
        300,
        DEFAULT_REQUEST_TIMEOUT_SECS,
    );

    changed
}

pub fn normalize_actor_config(config: &mut ActorConfigToml) -> bool {
    let mut changed = false;

    let trimmed_id = config.id.trim();
    if trimmed_id != config.id {
        config.id = trimmed_id.to_owned();
        changed = true;
    }

    let normalized_role = ActorRole::from_key(&config.role)
        .unwrap_or(DEFAULT_ACTOR_ROLE)
        .as_key();
    if normalized_role != config.role {
        config.role = normalized_role.to_owned();
        changed = true;
    }

    changed
}

pub fn normalize_presence_config(config: &mut PresenceConfigToml) -> bool {
    let mut changed = false;

    changed |= clamp_or_default(
        &mut config.visible_interval_ms,
        250,
        60_000,
        DEFAULT_PRESENCE_VISIBLE_INTERVAL_MS,
    );
    changed |= clamp_or_default(
        &mut config.hidden_interval_ms,
        1_000,
        300_000,
        DEFAULT_PRESENCE_HIDDEN_INTERVAL_MS,
    );
    let floor = config.visible_interval_ms;
    changed |= clamp_or_default(
        &mut config.max_backoff_ms,
        floor,
        600_000,
        DEFAULT_PRESENCE_MAX_BACKOFF_MS.max(floor),
    );

    let normalized_failures = if config.degraded_after_failures == 0 {
        DEFAULT_PRESENCE_DEGRADED_AFTER_FAILURES
    } else {
        config.degraded_after_failures.clamp(1, 20)
    };
    if normalized_failures != config.degraded_after_failures {
        config.degraded_after_failures = normalized_failures;
        changed = true;
    }

    changed
}

pub fn normalize_board_config(config: &mut BoardConfigToml) -> bool {
    let mut changed = false;

    let normalized_limit = if config.default_limit == 0 {
        DEFAULT_BOARD_LIMIT
    } else {
        config.default_limit.min(MAX_BOARD_LIMIT)
    };
    if normalized_limit != config.default_limit {
        config.default_limit = normalized_limit;
        changed = true;
    }

    let normalized_sort_mode = SortMode::from_key(&config.sort_mode)
        .unwrap_or_default()
        .as_key();
    if normalized_sort_mode != config.sort_mode {
        config.sort_mode = normalized_sort_mode.to_owned();
        changed = true;
    }

    changed
}

fn clamp_or_default(value: &mut u64, min: u64, max: u64, default: u64) -> bool {
    let normalized = if *value == 0 {
        default
    } else {
        (*value).clamp(min, max)
    };
    if normalized != *value {
        *value = normalized;
        return true;
    }
    false
}
