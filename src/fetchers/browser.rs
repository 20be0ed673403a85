use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::BrowserSettings;
use crate::error::FetchError;
use crate::fetchers::{FetcherKind, PageFetcher};

/// WebDriver-driven fetcher: the page's scripts run before the source is read.
///
/// Holds one browser session; callers must not share it across concurrent pages.
pub struct BrowserFetcher {
    client: Client,
    wait_for: Option<String>,
    wait_timeout: Duration,
}

impl BrowserFetcher {
    pub async fn connect(settings: &BrowserSettings) -> Result<Self, FetchError> {
        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": settings.args }),
        );

        info!(webdriver = %settings.webdriver_url, "Connecting to webdriver");
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(&settings.webdriver_url)
            .await
            .map_err(|e| FetchError::Lifecycle(format!("cannot start browser session: {}", e)))?;

        Ok(Self {
            client,
            wait_for: settings.wait_for.clone(),
            wait_timeout: Duration::from_secs(settings.wait_timeout_secs),
        })
    }
}

fn map_cmd_error(url: &str, e: CmdError) -> FetchError {
    let message = e.to_string();
    if matches!(e, CmdError::Lost(_)) || message.to_lowercase().contains("session") {
        FetchError::Lifecycle(format!("browser session lost: {}", message))
    } else {
        FetchError::Render {
            url: url.to_string(),
            message,
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.client
            .goto(url)
            .await
            .map_err(|e| map_cmd_error(url, e))?;

        if let Some(selector) = &self.wait_for {
            // A page without listings never shows the selector; read it anyway.
            if let Err(e) = self
                .client
                .wait()
                .at_most(self.wait_timeout)
                .for_element(Locator::Css(selector))
                .await
            {
                warn!(url, selector = %selector, error = %e, "Listing selector did not appear");
            }
        }

        self.client.source().await.map_err(|e| map_cmd_error(url, e))
    }

    async fn close(&self) -> Result<(), FetchError> {
        info!("Closing browser session");
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| FetchError::Lifecycle(format!("cannot close browser session: {}", e)))
    }

    fn kind(&self) -> FetcherKind {
        FetcherKind::Browser
    }
}
