//! User configuration, `~/.overcode/config.yaml`. Loaded by the daemon/CLI
//! crates via `serde_yaml`; this crate only defines the shape and sane
//! defaults. Cost pricing constants must be configured, never guessed
//! into the source.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::stats::TokenPrices;

/// USD per *million* tokens, the unit humans actually configure; converted
/// to per-token prices where [`TokenPrices`] is needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub input_price_per_mtok: f64,
    pub output_price_per_mtok: f64,
    pub cache_write_price_per_mtok: f64,
    pub cache_read_price_per_mtok: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        // Placeholder defaults only, not a guess at the vendor's real
        // pricing. Operators are expected to override these from their
        // own billing page.
        PricingConfig {
            input_price_per_mtok: 3.0,
            output_price_per_mtok: 15.0,
            cache_write_price_per_mtok: 3.75,
            cache_read_price_per_mtok: 0.30,
        }
    }
}

impl PricingConfig {
    pub fn to_token_prices(self) -> TokenPrices {
        TokenPrices {
            input_usd_per_token: self.input_price_per_mtok / 1_000_000.0,
            output_usd_per_token: self.output_price_per_mtok / 1_000_000.0,
            cache_write_usd_per_token: self.cache_write_price_per_mtok / 1_000_000.0,
            cache_read_usd_per_token: self.cache_read_price_per_mtok / 1_000_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SisterConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub allow_control: bool,
}

fn default_web_bind() -> String {
    "127.0.0.1:8420".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig { bind: default_web_bind(), api_key: None, allow_control: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_capture_lines")]
    pub capture_lines: u32,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_auto_archive_after_loops")]
    pub auto_archive_after_loops: u64,
}

fn default_interval_seconds() -> u64 {
    10
}
fn default_capture_lines() -> u32 {
    50
}
fn default_worker_pool_size() -> usize {
    8
}
fn default_auto_archive_after_loops() -> u64 {
    6
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            interval_seconds: default_interval_seconds(),
            capture_lines: default_capture_lines(),
            worker_pool_size: default_worker_pool_size(),
            auto_archive_after_loops: default_auto_archive_after_loops(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub sisters: Vec<SisterConfig>,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Named standing-instruction templates, selectable by
    /// `standing_instructions_preset`.
    #[serde(default)]
    pub instruction_presets: HashMap<String, String>,
    #[serde(default)]
    pub default_instructions: String,
}

impl Config {
    pub fn from_yaml_str(s: &str) -> Result<Config, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
