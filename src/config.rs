use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_PORT: u16 = 41184;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Runtime settings, sourced from the process environment.
///
/// The API token is the only required value; it comes from Joplin's
/// Tools > Options > Web Clipper screen.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables (after `dotenv` has had
    /// a chance to populate them from a `.env` file).
    pub fn from_env() -> Result<Self> {
        Self::from_parts(
            std::env::var("JOPLIN_TOKEN").ok(),
            std::env::var("JOPLIN_PORT").ok(),
            std::env::var("JOPLIN_TIMEOUT_SECONDS").ok(),
        )
    }

    fn from_parts(
        token: Option<String>,
        port: Option<String>,
        timeout_seconds: Option<String>,
    ) -> Result<Self> {
        let token = token
            .filter(|t| !t.is_empty())
            .context("JOPLIN_TOKEN is not set. Get your token from Joplin: Tools > Options > Web Clipper")?;

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("JOPLIN_PORT is not a valid port number: {}", p))?,
            None => DEFAULT_PORT,
        };

        let timeout_seconds = match timeout_seconds {
            Some(t) => t
                .parse::<u64>()
                .with_context(|| format!("JOPLIN_TIMEOUT_SECONDS is not a number: {}", t))?,
            None => DEFAULT_TIMEOUT_SECONDS,
        };

        Ok(Config {
            token,
            port,
            timeout: Duration::from_secs(timeout_seconds),
        })
    }

    /// Base URL of the local Web Clipper API.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}
