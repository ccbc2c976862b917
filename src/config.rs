use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_SCHEMA_VERSION: u32 = 2;
const DEFAULT_TICK_MILLIS: u64 = 1_000;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Configured shift length. The target cycle time is this divided by the
/// daily target.
pub const DEFAULT_WORKDAY_SECONDS: u32 = 28_880;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub schema_version: u32,
    pub backend_url: String,
    /// Operator identity; normally set once after first login against the
    /// backend. Overridable per invocation with --user or
    /// FLOORTRACK_USER_ID.
    pub user_id: Option<String>,
    pub workday_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub tick_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            user_id: None,
            workday_seconds: DEFAULT_WORKDAY_SECONDS,
        }
    }
}

impl ConsoleConfig {
    pub fn load_or_init() -> Result<Self> {
        let cfg_path = config_path();
        if let Some(parent) = cfg_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        if cfg_path.exists() {
            let raw = fs::read_to_string(&cfg_path)
                .with_context(|| format!("failed to read {}", cfg_path.display()))?;
            let mut parsed: ConsoleConfig = serde_json::from_str(&raw)
                .with_context(|| format!("invalid JSON in {}", cfg_path.display()))?;
            if parsed.normalize_and_migrate() {
                parsed.save()?;
            }
            Ok(parsed)
        } else {
            let cfg = ConsoleConfig::default();
            cfg.save()?;
            Ok(cfg)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn effective_backend_url(&self) -> String {
        let from_env = env::var("FLOORTRACK_BACKEND_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        from_env.unwrap_or_else(|| self.backend_url.trim().to_string())
    }

    /// Operator id resolution: CLI flag, then environment, then config.
    pub fn effective_user_id(&self, cli_override: Option<&str>) -> Option<String> {
        if let Some(value) = cli_override {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }

        let from_env = env::var("FLOORTRACK_USER_ID")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if from_env.is_some() {
            return from_env;
        }

        self.user_id
            .as_ref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn normalize_and_migrate(&mut self) -> bool {
        let mut changed = false;

        if self.schema_version < CONFIG_SCHEMA_VERSION {
            self.schema_version = CONFIG_SCHEMA_VERSION;
            changed = true;
        }

        let trimmed_url = self.backend_url.trim();
        if trimmed_url.is_empty() {
            self.backend_url = DEFAULT_BACKEND_URL.to_string();
            changed = true;
        } else if trimmed_url != self.backend_url {
            self.backend_url = trimmed_url.to_string();
            changed = true;
        }

        if self
            .user_id
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            self.user_id = None;
            changed = true;
        }

        if self.workday_seconds == 0 {
            self.workday_seconds = DEFAULT_WORKDAY_SECONDS;
            changed = true;
        }

        changed
    }
}

pub fn runtime_settings() -> RuntimeSettings {
    RuntimeSettings {
        tick_interval: Duration::from_millis(env_u64(
            "FLOORTRACK_TICK_MILLIS",
            DEFAULT_TICK_MILLIS,
        )),
        request_timeout: Duration::from_secs(env_u64(
            "FLOORTRACK_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )),
    }
}

pub fn floortrack_home() -> PathBuf {
    if let Ok(custom) = env::var("FLOORTRACK_HOME") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".floortrack")
}

pub fn config_path() -> PathBuf {
    floortrack_home().join("config.json")
}

pub fn lock_path() -> PathBuf {
    floortrack_home().join("floortrack.lock")
}

pub fn instance_meta_path() -> PathBuf {
    floortrack_home().join("floortrack.instance.json")
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
