use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use listing_scraper::config::Config;
use listing_scraper::fetchers::FetcherFactory;
use listing_scraper::models::{fields, BatchStatus};
use listing_scraper::scrapers::BatchScraper;
use listing_scraper::storage::open_store;
use listing_scraper::table::ListingTable;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("listing_scraper=info".parse()?),
        )
        .init();

    info!("Starting Listing Scraper");

    let config = Config::load()?;
    let request = config.batch_request()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current page");
                cancel.cancel();
            }
        });
    }

    let factory = FetcherFactory::new(config.http.clone(), config.browser.clone());
    let scraper = BatchScraper::new(config.batch_settings());
    let result = scraper.run(&request, &factory, &cancel).await?;

    for (page, cause) in &result.page_errors {
        error!(page, error = %cause, "Page failed");
    }
    for (page, count) in &result.block_failures {
        warn!(page, count, "Listings skipped");
    }
    info!(
        status = %result.status,
        records = result.records.len(),
        failed_pages = result.page_errors.len(),
        failed_blocks = result.total_block_failures(),
        "Batch finished"
    );

    let table = ListingTable::from_records(&result.records);
    match table.price_summary(fields::PRICE) {
        Some(summary) => info!(
            priced = summary.count,
            mean = summary.mean.round() as u64,
            min = summary.min,
            max = summary.max,
            "Price summary"
        ),
        None => info!("No usable prices in this batch"),
    }

    if table.is_empty() {
        info!("Nothing to save");
    } else {
        let store = open_store(&config.storage).await?;
        let id = store.save(&table).await?;
        info!(dataset = %id, rows = table.len(), "Saved dataset");
    }

    if let BatchStatus::Aborted { page_index, reason } = &result.status {
        anyhow::bail!("Batch aborted at page {}: {}", page_index, reason);
    }
    Ok(())
}
