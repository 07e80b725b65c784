//! WebDriver-backed portal scraper.
//!
//! Drives one isolated browser session per run: login form → detailed
//! agent-report view → table extraction across every pagination page. The
//! portal is an older server-rendered app, so the login form is probed with
//! a small set of selector candidates and pagination goes through the
//! page's own `ChangePage` callback.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{Credentials, ReportScraper, ScrapeError};
use crate::config::{PortalConfig, ScrapeConfig};
use crate::report::model::{RawReport, RawRow};

/// Login form selector candidates, in preference order.
const USERNAME_SELECTORS: &[&str] = &[
    "input[name=username]",
    "input[id=username]",
    "input[name=email]",
    "input[type=text]",
];
const PASSWORD_SELECTORS: &[&str] = &[
    "input[type=password]",
    "input[name=password]",
    "input[id=password]",
];
const SUBMIT_SELECTORS: &[&str] = &["button[type=submit]", "input[type=submit]"];

/// The report table and its row/pagination structure.
const REPORT_TABLE: &str = "table.blueTable";
const HEADER_CELLS: &str = "table.blueTable thead tr th";
const DATA_ROWS: &str = "table.blueTable tbody tr.edit_rows";
const PAGE_LINKS: &str = "table.blueTable tfoot a";

pub struct PortalScraper {
    portal: PortalConfig,
    scrape: ScrapeConfig,
}

impl PortalScraper {
    pub fn new(portal: PortalConfig, scrape: ScrapeConfig) -> Self {
        Self { portal, scrape }
    }

    /// Wrap one browser interaction in the configured step timeout.
    async fn step<T>(
        &self,
        name: &'static str,
        fut: impl Future<Output = Result<T, CmdError>>,
    ) -> Result<T, ScrapeError> {
        let secs = self.scrape.step_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ScrapeError::Navigation(format!("{name}: {e}"))),
            Err(_) => Err(ScrapeError::Timeout { step: name, secs }),
        }
    }

    async fn login(&self, client: &Client, credentials: &Credentials) -> Result<(), ScrapeError> {
        let username_field = self
            .step("find-login-form", first_present(client, USERNAME_SELECTORS))
            .await?
            .ok_or_else(|| ScrapeError::Navigation("login form: no username field".into()))?;
        let password_field = self
            .step("find-login-form", first_present(client, PASSWORD_SELECTORS))
            .await?
            .ok_or_else(|| ScrapeError::Navigation("login form: no password field".into()))?;

        self.step("fill-login-form", async {
            username_field.clear().await?;
            username_field.send_keys(&credentials.username).await?;
            password_field.clear().await?;
            password_field.send_keys(&credentials.password).await
        })
        .await?;

        let submit = self
            .step("find-login-form", first_present(client, SUBMIT_SELECTORS))
            .await?
            .ok_or_else(|| ScrapeError::Navigation("login form: no submit button".into()))?;
        self.step("submit-login", submit.click()).await?;

        // Give the redirect a moment to land, then verify: a login form that
        // is still showing a password field means the portal rejected us.
        tokio::time::sleep(Duration::from_millis(self.scrape.page_delay_ms)).await;
        let still_on_login = self
            .step("verify-login", first_present(client, PASSWORD_SELECTORS))
            .await?
            .is_some();
        if still_on_login {
            return Err(ScrapeError::Authentication);
        }

        debug!(username = %credentials.username, "portal login accepted");
        Ok(())
    }

    async fn open_report(&self, client: &Client) -> Result<(), ScrapeError> {
        let url = format!(
            "{}{}",
            self.portal.base_url.trim_end_matches('/'),
            self.portal.report_path
        );
        self.step("open-report", client.goto(&url)).await?;

        // The report table is the readiness signal; its absence means the
        // portal layout changed or navigation landed somewhere else.
        let wait = client
            .wait()
            .at_most(Duration::from_secs(self.scrape.step_timeout_secs))
            .for_element(Locator::Css(REPORT_TABLE))
            .await;
        match wait {
            Ok(_) => Ok(()),
            Err(e) => Err(ScrapeError::Navigation(format!(
                "agent report table not found: {e}"
            ))),
        }
    }

    async fn extract(&self, client: &Client) -> Result<RawReport, ScrapeError> {
        let headers = self
            .step("extract-headers", cell_texts(client, HEADER_CELLS))
            .await?;

        let page_links = self
            .step("count-pages", client.find_all(Locator::Css(PAGE_LINKS)))
            .await?;
        let total_pages = (page_links.len() as u32).max(1);

        let mut rows = Vec::new();
        let mut page = 1;
        loop {
            rows.extend(self.extract_rows(client).await?);

            if page >= total_pages {
                break;
            }
            page += 1;
            self.step(
                "change-page",
                client.execute("ChangePage(arguments[0]);", vec![json!(page)]),
            )
            .await?;
            tokio::time::sleep(Duration::from_millis(self.scrape.page_delay_ms)).await;
        }

        let source_url = self
            .step("read-url", client.current_url())
            .await?
            .to_string();

        info!(
            rows = rows.len(),
            pages = page,
            "portal table extraction finished"
        );

        Ok(RawReport {
            headers,
            rows,
            scraped_at: Utc::now(),
            source_url,
            pages_processed: page,
        })
    }

    async fn extract_rows(&self, client: &Client) -> Result<Vec<RawRow>, ScrapeError> {
        self.step("extract-rows", async {
            let mut rows = Vec::new();
            for row in client.find_all(Locator::Css(DATA_ROWS)).await? {
                let mut cells = Vec::new();
                for cell in row.find_all(Locator::Css("td")).await? {
                    cells.push(cell.text().await?.trim().to_string());
                }
                rows.push(RawRow { cells });
            }
            Ok(rows)
        })
        .await
    }

    async fn drive(
        &self,
        client: &Client,
        credentials: &Credentials,
    ) -> Result<RawReport, ScrapeError> {
        self.step("open-portal", client.goto(&self.portal.base_url))
            .await?;
        self.login(client, credentials).await?;
        self.open_report(client).await?;
        self.extract(client).await
    }
}

#[async_trait]
impl ReportScraper for PortalScraper {
    async fn run(&self, credentials: &Credentials) -> Result<RawReport, ScrapeError> {
        let client = ClientBuilder::native()
            .connect(&self.portal.webdriver_url)
            .await
            .map_err(|e| ScrapeError::Session(format!("webdriver connect failed: {e}")))?;

        let result = self.drive(&client, credentials).await;

        // The session is torn down on every exit path before any error
        // propagates; a close failure is logged but never masks the result.
        if let Err(e) = client.close().await {
            warn!(error = %e, "browser session close failed");
        }

        result
    }
}

/// Find the first element matching any of the candidate selectors.
/// `NoSuchElement` moves on to the next candidate; other errors propagate.
async fn first_present(client: &Client, selectors: &[&str]) -> Result<Option<Element>, CmdError> {
    for &selector in selectors {
        match client.find(Locator::Css(selector)).await {
            Ok(element) => return Ok(Some(element)),
            Err(e) if e.is_no_such_element() => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Collect the trimmed text of every element matching `selector`.
async fn cell_texts(client: &Client, selector: &str) -> Result<Vec<String>, CmdError> {
    let mut texts = Vec::new();
    for element in client.find_all(Locator::Css(selector)).await? {
        texts.push(element.text().await?.trim().to_string());
    }
    Ok(texts)
}
