use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{BrowserSettings, HttpSettings};
use crate::error::FetchError;

#[cfg(feature = "browser")]
mod browser;
mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use http::{create_client, fetch_with_retry, HttpFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    Http,
    Browser,
}

impl fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetcherKind::Http => write!(f, "http"),
            FetcherKind::Browser => write!(f, "browser"),
        }
    }
}

/// Turns a URL into rendered page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Release the underlying session. Called once when the batch ends.
    async fn close(&self) -> Result<(), FetchError> {
        Ok(())
    }

    fn kind(&self) -> FetcherKind;
}

/// Acquires fetchers for a batch run. Failing to open is a lifecycle failure.
#[async_trait]
pub trait FetcherOpener: Send + Sync {
    async fn open(&self, kind: FetcherKind) -> Result<Box<dyn PageFetcher>, FetchError>;
}

pub struct FetcherFactory {
    http: HttpSettings,
    browser: BrowserSettings,
}

impl FetcherFactory {
    pub fn new(http: HttpSettings, browser: BrowserSettings) -> Self {
        Self { http, browser }
    }
}

#[async_trait]
impl FetcherOpener for FetcherFactory {
    async fn open(&self, kind: FetcherKind) -> Result<Box<dyn PageFetcher>, FetchError> {
        match kind {
            FetcherKind::Http => Ok(Box::new(HttpFetcher::new(&self.http)?)),
            FetcherKind::Browser => open_browser(&self.browser).await,
        }
    }
}

#[cfg(feature = "browser")]
async fn open_browser(settings: &BrowserSettings) -> Result<Box<dyn PageFetcher>, FetchError> {
    Ok(Box::new(BrowserFetcher::connect(settings).await?))
}

#[cfg(not(feature = "browser"))]
async fn open_browser(_settings: &BrowserSettings) -> Result<Box<dyn PageFetcher>, FetchError> {
    Err(FetchError::Lifecycle(
        "browser fetcher not available: built without the `browser` feature".to_string(),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Script {
        pages: HashMap<String, Result<String, FetchError>>,
        delays: HashMap<String, Duration>,
        calls: Mutex<Vec<String>>,
        closed: AtomicUsize,
    }

    /// In-memory fetcher serving canned responses. Unknown URLs answer 404.
    #[derive(Clone, Default)]
    pub struct ScriptedFetcher {
        script: Arc<Script>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        fn script_mut(&mut self) -> &mut Script {
            Arc::get_mut(&mut self.script).expect("script is built before sharing")
        }

        pub fn page(mut self, url: &str, html: &str) -> Self {
            self.script_mut().pages.insert(url.to_string(), Ok(html.to_string()));
            self
        }

        pub fn fail(mut self, url: &str, error: FetchError) -> Self {
            self.script_mut().pages.insert(url.to_string(), Err(error));
            self
        }

        pub fn delay(mut self, url: &str, delay: Duration) -> Self {
            self.script_mut().delays.insert(url.to_string(), delay);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.script.calls.lock().unwrap().clone()
        }

        pub fn close_count(&self) -> usize {
            self.script.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.script.calls.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.script.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            self.script.pages.get(url).cloned().unwrap_or_else(|| {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            })
        }

        async fn close(&self) -> Result<(), FetchError> {
            self.script.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn kind(&self) -> FetcherKind {
            FetcherKind::Http
        }
    }

    /// Hands out clones of one scripted fetcher, or refuses to open at all.
    pub struct ScriptedOpener {
        pub fetcher: ScriptedFetcher,
        /// Opens allowed before every further open is refused.
        pub capacity: Option<usize>,
        pub opened: AtomicUsize,
    }

    impl ScriptedOpener {
        pub fn new(fetcher: ScriptedFetcher) -> Self {
            Self {
                fetcher,
                capacity: None,
                opened: AtomicUsize::new(0),
            }
        }

        pub fn refusing() -> Self {
            Self::new(ScriptedFetcher::new()).refusing_after(0)
        }

        pub fn refusing_after(mut self, opens: usize) -> Self {
            self.capacity = Some(opens);
            self
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FetcherOpener for ScriptedOpener {
        async fn open(&self, _kind: FetcherKind) -> Result<Box<dyn PageFetcher>, FetchError> {
            if self.capacity.map_or(false, |cap| self.opened() >= cap) {
                return Err(FetchError::Lifecycle("webdriver unreachable".to_string()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(self.fetcher.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn browser_without_feature_is_a_lifecycle_failure() {
        let factory = FetcherFactory::new(HttpSettings::default(), BrowserSettings::default());
        let err = factory.open(FetcherKind::Browser).await.err().unwrap();
        assert!(err.is_lifecycle());
    }

    #[tokio::test]
    async fn factory_opens_http_fetcher() {
        let factory = FetcherFactory::new(HttpSettings::default(), BrowserSettings::default());
        let fetcher = factory.open(FetcherKind::Http).await.unwrap();
        assert_eq!(fetcher.kind(), FetcherKind::Http);
        assert!(fetcher.close().await.is_ok());
    }

    #[test]
    fn kind_uses_lowercase_names() {
        let kind: FetcherKind = serde_json::from_str("\"browser\"").unwrap();
        assert_eq!(kind, FetcherKind::Browser);
        assert_eq!(FetcherKind::Http.to_string(), "http");
    }
}
