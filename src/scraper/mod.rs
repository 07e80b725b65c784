//! Portal scraping: the `ReportScraper` seam and its WebDriver implementation.

pub mod portal;

pub use portal::PortalScraper;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::report::model::RawReport;

/// Login credentials for the portal.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields present — the portal rejects empty submissions anyway,
    /// so incomplete credentials never reach a browser session.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

// Manual Debug so the password never lands in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("portal rejected the login credentials")]
    Authentication,

    #[error("portal navigation failed: {0}")]
    Navigation(String),

    #[error("scrape step '{step}' exceeded {secs}s")]
    Timeout { step: &'static str, secs: u64 },

    #[error("browser session error: {0}")]
    Session(String),
}

/// One isolated scrape run: login → report view → table extraction.
///
/// Implementations must tear the browser session down on every exit path
/// (success and error) and must not touch the report store.
#[async_trait]
pub trait ReportScraper: Send + Sync {
    async fn run(&self, credentials: &Credentials) -> Result<RawReport, ScrapeError>;
}
