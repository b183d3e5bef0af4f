use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use board_sync::{RetryPolicy, SyncSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub thread: String,
    pub poll_interval_ms: u64,
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            thread: "all".into(),
            poll_interval_ms: 1000,
            retry_attempts: 1,
            retry_delay_ms: 250,
        }
    }
}

impl Settings {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                delay: Duration::from_millis(self.retry_delay_ms),
            },
        }
    }
}

/// Defaults, then `config_path` if it exists, then environment overrides.
pub fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if config_path.exists() {
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config '{}'", config_path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config '{}'", config_path.display()))?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    for (key, value) in file_cfg {
        let value = match value {
            toml::Value::String(s) => s,
            other => other.to_string(),
        };
        apply_key(settings, &key, &value)?;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("PLANNER_SERVER_URL") {
        settings.server_url = v;
    }
    for (env_key, key) in [
        ("APP__SERVER_URL", "server_url"),
        ("APP__THREAD", "thread"),
        ("APP__POLL_INTERVAL_MS", "poll_interval_ms"),
        ("APP__RETRY_ATTEMPTS", "retry_attempts"),
        ("APP__RETRY_DELAY_MS", "retry_delay_ms"),
    ] {
        if let Some(v) = lookup(env_key) {
            apply_key(settings, key, &v).with_context(|| format!("invalid {env_key}"))?;
        }
    }
    Ok(())
}

fn apply_key(settings: &mut Settings, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "server_url" => settings.server_url = value.trim().to_string(),
        "thread" => settings.thread = value.trim().to_string(),
        "poll_interval_ms" => settings.poll_interval_ms = parse_number(key, value)?,
        "retry_attempts" => settings.retry_attempts = parse_number(key, value)?,
        "retry_delay_ms" => settings.retry_delay_ms = parse_number(key, value)?,
        other => tracing::warn!(key = other, "config: ignoring unknown key"),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| anyhow!("{key} must be a non-negative integer, got '{value}'"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
