//! Daemon configuration.
//!
//! Compiled defaults ← `config.toml` in the data directory ← CLI/env
//! overrides applied in `main`. A missing config file is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 8700;
const DEFAULT_MAX_CONCURRENT: usize = 2;
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_DELAY_MS: u64 = 1000;
const DEFAULT_WEBDRIVER_URL: &str = "http://127.0.0.1:4444";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/// Data directory fallback when neither `--data-dir` nor the env var is set.
pub fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| Path::new(&home).join(".callwatch"))
        .unwrap_or_else(|| PathBuf::from(".callwatch"))
}

// ─── PortalConfig ─────────────────────────────────────────────────────────────

/// Reporting-portal endpoints (`[portal]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Login page of the portal. Must be set before scraping can work.
    pub base_url: String,
    /// Path of the detailed agent-report view, relative to `base_url`.
    pub report_path: String,
    /// WebDriver endpoint the scraper connects to (chromedriver/geckodriver).
    pub webdriver_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            report_path: "/public/agent_report/".to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
        }
    }
}

// ─── ScrapeConfig ─────────────────────────────────────────────────────────────

/// Scrape execution tuning (`[scrape]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Maximum scrape sessions running at once (worker-pool size).
    pub max_concurrent: usize,
    /// Per-step timeout for browser interactions, in seconds.
    pub step_timeout_secs: u64,
    /// Settle delay after login submits and pagination clicks, milliseconds.
    pub page_delay_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// REST API port.
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Data directory holding config.toml and the SQLite database.
    pub data_dir: PathBuf,
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
    /// `pretty` (compact human-readable) or `json`.
    pub log_format: String,
    pub portal: PortalConfig,
    pub scrape: ScrapeConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            portal: PortalConfig::default(),
            scrape: ScrapeConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load `config.toml` from the data directory. An unparseable file is
    /// logged and ignored rather than killing startup.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("config.toml");
        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<DaemonConfig>(&text) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded config file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config file unparseable — using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.data_dir = data_dir.to_path_buf();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = DaemonConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.scrape.max_concurrent, 2);
        assert_eq!(config.portal.report_path, "/public/agent_report/");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            port = 9100

            [portal]
            base_url = "http://portal.example:7080"

            [scrape]
            max_concurrent = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.portal.base_url, "http://portal.example:7080");
        assert_eq!(config.portal.webdriver_url, DEFAULT_WEBDRIVER_URL);
        assert_eq!(config.scrape.max_concurrent, 4);
        assert_eq!(config.scrape.step_timeout_secs, DEFAULT_STEP_TIMEOUT_SECS);
    }
}
