// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

// --- env defaults & names ---
pub const DEFAULT_BASE_URL: &str = "https://api.newsdeck.dev";
pub const DEFAULT_CONFIG_PATH: &str = "config/newsdeck.toml";
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 5.0;

pub const ENV_CONFIG_PATH: &str = "NEWSDECK_CONFIG_PATH";
pub const ENV_BASE_URL: &str = "NEWSDECK_BASE_URL";
pub const ENV_RELEVANCE_THRESHOLD: &str = "NEWSDECK_RELEVANCE_THRESHOLD";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_categories() -> Vec<String> {
    [
        "all",
        "relevant",
        "business",
        "world",
        "politics",
        "technology",
        "weather",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_all_capacity() -> usize {
    1000
}

fn default_category_capacity() -> usize {
    500
}

fn default_threshold() -> f64 {
    DEFAULT_RELEVANCE_THRESHOLD
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Feed columns, synthetic tags included. Order is presentation order.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    /// The "all" feed holds more history than any single category column.
    #[serde(default = "default_all_capacity")]
    pub all_feed_capacity: usize,
    #[serde(default = "default_category_capacity")]
    pub category_feed_capacity: usize,
    #[serde(default = "default_threshold")]
    pub relevance_threshold: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            categories: default_categories(),
            all_feed_capacity: default_all_capacity(),
            category_feed_capacity: default_category_capacity(),
            relevance_threshold: default_threshold(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ClientConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Resolution order:
    /// 1) $NEWSDECK_CONFIG_PATH
    /// 2) config/newsdeck.toml
    /// 3) built-in defaults
    /// Env overrides for base URL and threshold apply on top in every case.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            anyhow::bail!("{ENV_CONFIG_PATH} points to a non-existent path");
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            let url = url.trim();
            if !url.is_empty() {
                self.base_url = url.trim_end_matches('/').to_string();
            }
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_RELEVANCE_THRESHOLD).ok()) {
            self.relevance_threshold = t;
        }
    }
}

// parse optional float env and clamp to the documented 0..=10 score range
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 10.0))
}
