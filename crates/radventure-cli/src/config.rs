// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use radventure_edge::{
    DEFAULT_LISTEN, DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_MAX_EXTRACTED_BYTES, EdgeConfig,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_FETCH_TIMEOUT: &str = "30s";
const DEFAULT_NOTIFICATION_DURATION: &str = "5s";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub edge: Edge,
    #[serde(default)]
    pub notifications: Notifications,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            edge: Edge::default(),
            notifications: Notifications::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge {
    pub listen: Option<String>,
    pub max_archive_bytes: Option<i64>,
    pub max_extracted_bytes: Option<i64>,
    pub fetch_timeout: Option<String>,
}

impl Default for Edge {
    fn default() -> Self {
        Self {
            listen: Some(DEFAULT_LISTEN.to_owned()),
            max_archive_bytes: Some(DEFAULT_MAX_ARCHIVE_BYTES as i64),
            max_extracted_bytes: Some(DEFAULT_MAX_EXTRACTED_BYTES as i64),
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notifications {
    pub default_duration: Option<String>,
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            default_duration: Some(DEFAULT_NOTIFICATION_DURATION.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            filter: Some(DEFAULT_LOG_FILTER.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("RADVENTURE_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set RADVENTURE_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(radventure_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and keep values under [storage], [edge], [notifications], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            radventure_db::validate_db_path(db_path)?;
        }

        if let Some(listen) = &self.edge.listen
            && listen.trim().is_empty()
        {
            bail!("edge.listen in {} must not be empty", path.display());
        }

        for (key, value) in [
            ("edge.max_archive_bytes", self.edge.max_archive_bytes),
            ("edge.max_extracted_bytes", self.edge.max_extracted_bytes),
        ] {
            if let Some(bytes) = value
                && bytes <= 0
            {
                bail!(
                    "{key} in {} must be positive, got {bytes}",
                    path.display()
                );
            }
        }

        for (key, value) in [
            ("edge.fetch_timeout", &self.edge.fetch_timeout),
            (
                "notifications.default_duration",
                &self.notifications.default_duration,
            ),
        ] {
            if let Some(raw) = value {
                let parsed = parse_duration(raw)?;
                if parsed <= Duration::ZERO {
                    bail!("{key} in {} must be positive, got {raw}", path.display());
                }
            }
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => radventure_db::default_db_path(),
        }
    }

    pub fn edge_config(&self) -> Result<EdgeConfig> {
        Ok(EdgeConfig {
            listen: self
                .edge
                .listen
                .clone()
                .unwrap_or_else(|| DEFAULT_LISTEN.to_owned()),
            max_archive_bytes: positive_bytes(
                self.edge.max_archive_bytes,
                DEFAULT_MAX_ARCHIVE_BYTES,
            ),
            max_extracted_bytes: positive_bytes(
                self.edge.max_extracted_bytes,
                DEFAULT_MAX_EXTRACTED_BYTES,
            ),
            fetch_timeout: parse_duration(
                self.edge
                    .fetch_timeout
                    .as_deref()
                    .unwrap_or(DEFAULT_FETCH_TIMEOUT),
            )?,
        })
    }

    pub fn notification_duration(&self) -> Result<Duration> {
        parse_duration(
            self.notifications
                .default_duration
                .as_deref()
                .unwrap_or(DEFAULT_NOTIFICATION_DURATION),
        )
    }

    pub fn log_filter(&self) -> &str {
        self.log.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# radventure config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/radventure/radventure.db)\n# db_path = \"/absolute/path/to/radventure.db\"\n\n[edge]\nlisten = \"{}\"\nmax_archive_bytes = {}\nmax_extracted_bytes = {}\nfetch_timeout = \"{}\"\n\n[notifications]\ndefault_duration = \"{}\"\n\n[log]\n# RADVENTURE_LOG overrides this filter\nfilter = \"{}\"\n",
            path.display(),
            DEFAULT_LISTEN,
            DEFAULT_MAX_ARCHIVE_BYTES,
            DEFAULT_MAX_EXTRACTED_BYTES,
            DEFAULT_FETCH_TIMEOUT,
            DEFAULT_NOTIFICATION_DURATION,
            DEFAULT_LOG_FILTER,
        )
    }
}

fn positive_bytes(value: Option<i64>, default: u64) -> u64 {
    value
        .and_then(|bytes| u64::try_from(bytes).ok())
        .filter(|bytes| *bytes > 0)
        .unwrap_or(default)
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
