use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::models::{Leaning, TimeRange, WatchlistItem};
use crate::registry::normalize_domain;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rasad: RasadConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub exa: ExaConfig,
    #[serde(default)]
    pub source: Vec<SourceConfig>,
    #[serde(default)]
    pub watchlist: Vec<WatchlistConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RasadConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RasadConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    /// Falls back to the GEMINI_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub translation_model: String,
    #[serde(default = "default_gemini_model")]
    pub analysis_model: String,
    #[serde(default = "default_gemini_timeout")]
    pub timeout: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            translation_model: default_gemini_model(),
            analysis_model: default_gemini_model(),
            timeout: default_gemini_timeout(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-3-pro-preview".to_string()
}
fn default_gemini_timeout() -> String {
    "120s".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExaConfig {
    /// Falls back to the EXA_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_num_results")]
    pub num_results: u32,
    #[serde(default = "default_exa_timeout")]
    pub timeout: String,
}

impl Default for ExaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            num_results: default_num_results(),
            timeout: default_exa_timeout(),
        }
    }
}

fn default_num_results() -> u32 {
    5
}
fn default_exa_timeout() -> String {
    "30s".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub domain: String,
    pub name: String,
    pub leaning: Leaning,
    #[serde(default = "default_active")]
    pub active: bool,
    pub description: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistConfig {
    pub topic: String,
    #[serde(default)]
    pub description: String,
    /// Pre-optimized Persian query; the translation stage is skipped when set.
    pub query: Option<String>,
    /// Relative lookback window, e.g. "24h" or "7d".
    pub window: Option<String>,
    /// Explicit publication-date bounds; both required when either is set.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Config {
    /// Gemini API key from config, falling back to the environment.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.gemini
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    /// Exa API key from config, falling back to the environment.
    pub fn exa_api_key(&self) -> Option<String> {
        self.exa
            .api_key
            .clone()
            .or_else(|| std::env::var("EXA_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    /// Materialize watchlist items with fresh IDs and resolved time ranges.
    /// Assumes the config has been validated.
    pub fn watchlist_items(&self) -> Vec<WatchlistItem> {
        self.watchlist
            .iter()
            .map(|w| {
                let range = match (&w.window, w.start, w.end) {
                    (Some(window), _, _) => humantime::parse_duration(window).ok().map(TimeRange::Window),
                    (None, Some(start), Some(end)) => Some(TimeRange::Between { start, end }),
                    _ => None,
                };
                WatchlistItem {
                    id: Uuid::new_v4().to_string(),
                    topic: w.topic.clone(),
                    description: w.description.clone(),
                    query: w.query.clone(),
                    range,
                }
            })
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(ConfigError::ReadFile)
        .context("reading config file")?;
    let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    // Validate adapter settings
    if config.exa.num_results < 1 || config.exa.num_results > 20 {
        return Err(ConfigError::Validation(format!(
            "exa num_results {} out of range (1..=20)",
            config.exa.num_results
        ))
        .into());
    }
    humantime::parse_duration(&config.exa.timeout)
        .map_err(|e| ConfigError::Validation(format!("exa timeout '{}': {}", config.exa.timeout, e)))?;
    humantime::parse_duration(&config.gemini.timeout)
        .map_err(|e| ConfigError::Validation(format!("gemini timeout '{}': {}", config.gemini.timeout, e)))?;

    // Validate sources: non-empty fields, unique normalized domains
    let mut domains = HashSet::new();
    for source in &config.source {
        if source.domain.trim().is_empty() {
            return Err(ConfigError::Validation(format!("source '{}': empty domain", source.name)).into());
        }
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!("source '{}': empty name", source.domain)).into());
        }
        let normalized = normalize_domain(&source.domain);
        if !domains.insert(normalized.clone()) {
            return Err(ConfigError::Validation(format!("duplicate source domain: '{normalized}'")).into());
        }
    }

    // Validate watchlist entries
    for item in &config.watchlist {
        if item.topic.trim().is_empty() {
            return Err(ConfigError::Validation("watchlist entry with empty topic".to_string()).into());
        }
        if let Some(ref window) = item.window {
            humantime::parse_duration(window).map_err(|e| {
                ConfigError::Validation(format!("watchlist '{}': invalid window '{}': {}", item.topic, window, e))
            })?;
            if item.start.is_some() || item.end.is_some() {
                return Err(ConfigError::Validation(format!(
                    "watchlist '{}': 'window' and explicit 'start'/'end' are mutually exclusive",
                    item.topic
                ))
                .into());
            }
        }
        match (item.start, item.end) {
            (Some(start), Some(end)) => {
                if start >= end {
                    return Err(ConfigError::Validation(format!(
                        "watchlist '{}': 'start' must be before 'end'",
                        item.topic
                    ))
                    .into());
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::Validation(format!(
                    "watchlist '{}': 'start' and 'end' must be set together",
                    item.topic
                ))
                .into());
            }
            (None, None) => {}
        }
    }

    Ok(())
}
