//! Configuration management for the Registration Service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::FlushSchedule;
use crate::serial::DEFAULT_SEED;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// In-memory store, local uploads and logged email instead of real services
    pub mock_mode: bool,

    /// Write composed HTML instead of launching Chromium
    pub passthrough_render: bool,

    /// Redis connection URL (when not in mock mode)
    pub redis_url: String,

    /// Templates, stylesheets and logos
    pub assets_dir: PathBuf,

    /// Scratch directory for rendered PDFs
    pub output_dir: PathBuf,

    /// Chromium binary; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,

    /// First serial issued is seed + 1
    pub serial_seed: u64,

    pub storage_endpoint: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_token: Option<String>,
    pub storage_public_url: String,
    pub storage_prefix: String,

    /// Where mock-mode uploads are copied; served under `/files`
    pub local_storage_dir: PathBuf,

    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,

    /// Recipient of the batch emails
    pub faculty_email: String,

    pub flush_schedule: FlushSchedule,

    /// Upper bound for every external call
    pub external_timeout: Duration,

    /// Target of `GET /`
    pub form_page_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_port: u16 = var("API_PORT", "8080")
            .parse()
            .context("Invalid API_PORT")?;

        let mock_mode: bool = var("MOCK_MODE", "true")
            .parse()
            .context("Invalid MOCK_MODE (expected true/false)")?;

        let passthrough_render = match lookup("PASSTHROUGH_RENDER") {
            Some(value) => value
                .parse()
                .context("Invalid PASSTHROUGH_RENDER (expected true/false)")?,
            None => mock_mode,
        };

        let config = Config {
            api_host: var("API_HOST", "0.0.0.0"),
            api_port,
            mock_mode,
            passthrough_render,

            redis_url: var("REDIS_URL", "redis://localhost:6379"),

            assets_dir: var("ASSETS_DIR", "./assets").into(),
            output_dir: var("OUTPUT_DIR", "/tmp/registrar").into(),
            chrome_executable: lookup("CHROME_EXECUTABLE").map(PathBuf::from),

            serial_seed: var("SERIAL_SEED", &DEFAULT_SEED.to_string())
                .parse()
                .context("Invalid SERIAL_SEED")?,

            storage_endpoint: lookup("STORAGE_ENDPOINT"),
            storage_bucket: lookup("STORAGE_BUCKET"),
            storage_token: lookup("STORAGE_TOKEN"),
            storage_public_url: var(
                "STORAGE_PUBLIC_URL",
                &format!("http://localhost:{}/files", api_port),
            ),
            storage_prefix: var("STORAGE_PREFIX", "registrations"),
            local_storage_dir: var("LOCAL_STORAGE_DIR", "./uploads").into(),

            mail_api_url: lookup("MAIL_API_URL"),
            mail_api_key: lookup("MAIL_API_KEY"),
            mail_from: var("MAIL_FROM", "registrations@localhost"),
            faculty_email: var("FACULTY_EMAIL", "faculty@localhost"),

            flush_schedule: FlushSchedule::parse(&var("FLUSH_TIMES", "09:00,18:00"))
                .context("Invalid FLUSH_TIMES")?,

            external_timeout: Duration::from_secs(
                var("EXTERNAL_TIMEOUT_SECS", "60")
                    .parse()
                    .context("Invalid EXTERNAL_TIMEOUT_SECS")?,
            ),

            form_page_url: var("FORM_PAGE_URL", "/application-form.html"),
        };

        // Validate configuration
        config.validate(&lookup)?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.external_timeout.is_zero() {
            anyhow::bail!("EXTERNAL_TIMEOUT_SECS must be greater than 0");
        }

        // Real services need their endpoints and credentials
        if !self.mock_mode {
            let required = [
                ("STORAGE_ENDPOINT", &self.storage_endpoint),
                ("STORAGE_BUCKET", &self.storage_bucket),
                ("STORAGE_TOKEN", &self.storage_token),
                ("MAIL_API_URL", &self.mail_api_url),
                ("MAIL_API_KEY", &self.mail_api_key),
            ];
            for (key, value) in required {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    anyhow::bail!("{} is required when MOCK_MODE=false", key);
                }
            }

            for key in ["STORAGE_PUBLIC_URL", "MAIL_FROM", "FACULTY_EMAIL"] {
                if lookup(key).is_none() {
                    anyhow::bail!("{} is required when MOCK_MODE=false", key);
                }
            }
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
