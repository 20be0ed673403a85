use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SiteProfile;
use crate::error::{BatchError, PageError};
use crate::fetchers::{FetcherKind, FetcherOpener, PageFetcher};
use crate::models::{BatchResult, BatchStatus, PageResult};
use crate::scrapers::locator::ListingLocator;
use crate::scrapers::page::scrape_page;
use crate::scrapers::plan::CompiledPlan;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What to scrape: a site profile, how many pages, and with which fetcher.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub base_url: String,
    pub page_count: u32,
    pub profile: SiteProfile,
    pub fetcher_kind: FetcherKind,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub page_delay: Duration,
    /// 1 runs pages one at a time; more fetches HTTP pages concurrently.
    pub workers: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_secs(2),
            workers: 1,
        }
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

pub struct BatchScraper {
    settings: BatchSettings,
    clock: Clock,
}

/// A request checked and compiled while the batch is still idle.
struct Prepared {
    pages: Vec<(u32, String)>,
    locator: ListingLocator,
    plan: CompiledPlan,
}

impl Prepared {
    fn new(request: &BatchRequest) -> Result<Self, BatchError> {
        if request.page_count == 0 {
            return Err(BatchError::InvalidRequest(
                "page count must be at least 1".to_string(),
            ));
        }

        let pages = (1..=request.page_count)
            .map(|page| {
                request
                    .profile
                    .paging
                    .page_url(&request.base_url, page)
                    .map(|url| (page, url))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                BatchError::InvalidRequest(format!("bad base URL `{}`: {}", request.base_url, e))
            })?;

        Ok(Self {
            pages,
            locator: ListingLocator::new(&request.profile.container)?,
            plan: request.profile.plan.compile()?,
        })
    }
}

enum PageOutcome {
    Done(u32, Result<PageResult, PageError>),
    Cancelled,
    Skipped,
}

impl BatchScraper {
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            settings,
            clock: Arc::new(Local::now),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Local> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    fn timestamp(&self) -> String {
        (self.clock)().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Run one batch over pages `1..=page_count`.
    ///
    /// Only an invalid request is an error. Once running, the batch always
    /// returns a result: page failures land in the manifest, a lifecycle
    /// failure ends the run as `Aborted`, and cancellation as `Cancelled`.
    pub async fn run(
        &self,
        request: &BatchRequest,
        opener: &dyn FetcherOpener,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        let prepared = Prepared::new(request)?;

        let mut workers = self.settings.workers.clamp(1, prepared.pages.len());
        if workers > 1 && request.fetcher_kind == FetcherKind::Browser {
            warn!(workers, "Browser sessions are exclusive; scraping pages sequentially");
            workers = 1;
        }

        info!(
            site = %request.profile.name,
            base_url = %request.base_url,
            pages = request.page_count,
            fetcher = %request.fetcher_kind,
            workers,
            "Batch running"
        );

        let result = if workers == 1 {
            self.run_sequential(&prepared, request.fetcher_kind, opener, cancel)
                .await
        } else {
            self.run_concurrent(&prepared, request.fetcher_kind, workers, opener, cancel)
                .await
        };

        info!(
            status = %result.status,
            records = result.records.len(),
            failed_pages = result.page_errors.len(),
            failed_blocks = result.total_block_failures(),
            "Batch finished"
        );
        Ok(result)
    }

    async fn run_sequential(
        &self,
        prepared: &Prepared,
        kind: FetcherKind,
        opener: &dyn FetcherOpener,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let mut result = BatchResult::default();

        let fetcher = match opener.open(kind).await {
            Ok(fetcher) => fetcher,
            Err(e) => {
                error!(error = %e, "Could not acquire page fetcher");
                result.status = BatchStatus::Aborted {
                    page_index: prepared.pages[0].0,
                    reason: e.to_string(),
                };
                return result;
            }
        };

        for (position, (page_index, url)) in prepared.pages.iter().enumerate() {
            if cancel.is_cancelled() {
                result.status = BatchStatus::Cancelled;
                break;
            }
            if position > 0 && !self.settings.page_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        result.status = BatchStatus::Cancelled;
                        break;
                    }
                    _ = sleep(self.settings.page_delay) => {}
                }
            }

            let captured_at = self.timestamp();
            let outcome = scrape_page(
                fetcher.as_ref(),
                &prepared.locator,
                &prepared.plan,
                url,
                *page_index,
                &captured_at,
            )
            .await;

            if !absorb(&mut result, *page_index, outcome) {
                break;
            }
        }

        if result.status == BatchStatus::Cancelled {
            info!("Batch cancelled");
        }
        release(std::slice::from_ref(&fetcher)).await;
        result
    }

    async fn run_concurrent(
        &self,
        prepared: &Prepared,
        kind: FetcherKind,
        workers: usize,
        opener: &dyn FetcherOpener,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let mut result = BatchResult::default();

        let mut fetchers: Vec<Box<dyn PageFetcher>> = Vec::with_capacity(workers);
        for _ in 0..workers {
            match opener.open(kind).await {
                Ok(fetcher) => fetchers.push(fetcher),
                Err(e) => {
                    error!(error = %e, "Could not acquire page fetcher pool");
                    release(&fetchers).await;
                    result.status = BatchStatus::Aborted {
                        page_index: prepared.pages[0].0,
                        reason: e.to_string(),
                    };
                    return result;
                }
            }
        }

        let halted = AtomicBool::new(false);
        let outcomes: Vec<PageOutcome> = stream::iter(prepared.pages.iter().enumerate())
            .map(|(position, (page_index, url))| {
                // buffered() keeps a window of at most `workers` consecutive
                // pages in flight, so no two of them share a slot.
                let fetcher = fetchers[position % workers].as_ref();
                let halted = &halted;
                async move {
                    if cancel.is_cancelled() {
                        return PageOutcome::Cancelled;
                    }
                    if halted.load(Ordering::SeqCst) {
                        return PageOutcome::Skipped;
                    }
                    let captured_at = self.timestamp();
                    let outcome = scrape_page(
                        fetcher,
                        &prepared.locator,
                        &prepared.plan,
                        url,
                        *page_index,
                        &captured_at,
                    )
                    .await;
                    if matches!(&outcome, Err(e) if e.is_lifecycle()) {
                        halted.store(true, Ordering::SeqCst);
                    }
                    PageOutcome::Done(*page_index, outcome)
                }
            })
            .buffered(workers)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                PageOutcome::Done(page_index, outcome) => {
                    if !absorb(&mut result, page_index, outcome) {
                        break;
                    }
                }
                PageOutcome::Cancelled => {
                    info!("Batch cancelled");
                    result.status = BatchStatus::Cancelled;
                    break;
                }
                PageOutcome::Skipped => break,
            }
        }

        release(&fetchers).await;
        result
    }
}

/// Fold one page outcome into the result. Returns `false` when the batch must stop.
fn absorb(
    result: &mut BatchResult,
    page_index: u32,
    outcome: Result<PageResult, PageError>,
) -> bool {
    match outcome {
        Ok(page) => {
            info!(
                page = page_index,
                records = page.records.len(),
                failed_blocks = page.failed_count,
                "Page done"
            );
            result.push_page(page_index, page);
            true
        }
        Err(e) if e.is_lifecycle() => {
            error!(page = page_index, error = %e.cause, "Fetcher lost, aborting batch");
            result.status = BatchStatus::Aborted {
                page_index,
                reason: e.cause.to_string(),
            };
            result.push_failure(page_index, e.cause);
            false
        }
        Err(e) => {
            warn!(page = page_index, error = %e.cause, "Page skipped");
            result.push_failure(page_index, e.cause);
            true
        }
    }
}

async fn release(fetchers: &[Box<dyn PageFetcher>]) {
    for fetcher in fetchers {
        if let Err(e) = fetcher.close().await {
            warn!(fetcher = %fetcher.kind(), error = %e, "Failed to release page fetcher");
        }
    }
}
