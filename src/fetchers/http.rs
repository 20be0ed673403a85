use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::HttpSettings;
use crate::error::FetchError;
use crate::fetchers::{FetcherKind, PageFetcher};

pub fn create_client(settings: &HttpSettings) -> Result<Client, FetchError> {
    ClientBuilder::new()
        .user_agent(&settings.user_agent)
        .timeout(Duration::from_secs(settings.timeout_secs))
        .pool_max_idle_per_host(6)
        .build()
        .map_err(|e| FetchError::Lifecycle(format!("cannot build HTTP client: {}", e)))
}

pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    max_retries: u32,
    base_delay: Duration,
) -> Result<Response, FetchError> {
    let max_retries = max_retries.max(1);
    let mut attempts = 0;
    let mut last_error = None;

    while attempts < max_retries {
        match client.get(url).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                }
                let status = response.status();
                warn!(url, status = status.as_u16(), "HTTP error");
                last_error = Some(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Err(e) => {
                error!(url, error = %e, "Request failed");
                last_error = Some(FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
        }

        attempts += 1;
        if attempts < max_retries {
            let delay = backoff_delay(base_delay, attempts);
            warn!(url, ?delay, attempt = attempts + 1, max_retries, "Retrying");
            sleep(delay).await;
        }
    }

    Err(last_error.unwrap_or_else(|| FetchError::Transport {
        url: url.to_string(),
        message: "max retries exceeded".to_string(),
    }))
}

/// `base * 2^attempt`, saturating instead of overflowing on long retry chains.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Plain GET fetcher; sees the markup the server sends, no scripts run.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_client(settings)?,
            max_retries: settings.max_retries,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response =
            fetch_with_retry(&self.client, url, self.max_retries, self.retry_base_delay).await?;
        response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn kind(&self) -> FetcherKind {
        FetcherKind::Http
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> HttpSettings {
        HttpSettings {
            max_retries: 2,
            retry_base_delay_ms: 1,
            ..HttpSettings::default()
        }
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[tokio::test]
    async fn returns_page_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appartements-a-louer"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<article>ok</article>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/appartements-a-louer", server.uri()))
            .await
            .unwrap();

        assert_eq!(body, "<article>ok</article>");
    }

    #[tokio::test]
    async fn retries_then_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert!(!err.is_lifecycle());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let fetcher = HttpFetcher::new(&HttpSettings {
            max_retries: 1,
            timeout_secs: 2,
            ..HttpSettings::default()
        })
        .unwrap();

        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
