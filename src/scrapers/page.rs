use tracing::{debug, info, warn};
use url::Url;

use crate::error::PageError;
use crate::fetchers::PageFetcher;
use crate::models::PageResult;
use crate::parsers::parse_document;
use crate::scrapers::extractor::{extract, BlockContext};
use crate::scrapers::locator::ListingLocator;
use crate::scrapers::plan::CompiledPlan;

/// Fetch one page and extract every listing block on it.
///
/// Fails only when the page never produced a document. Malformed blocks are
/// counted in [`PageResult::failed_count`] and skipped.
pub async fn scrape_page(
    fetcher: &dyn PageFetcher,
    locator: &ListingLocator,
    plan: &CompiledPlan,
    url: &str,
    page_index: u32,
    captured_at: &str,
) -> Result<PageResult, PageError> {
    info!(page = page_index, url, "Scraping page");

    let html = fetcher
        .fetch(url)
        .await
        .map_err(|e| PageError::new(page_index, e))?;

    extract_page(&html, locator, plan, url, page_index, captured_at)
}

/// Synchronous half of [`scrape_page`]; the parsed document never crosses an await.
pub fn extract_page(
    html: &str,
    locator: &ListingLocator,
    plan: &CompiledPlan,
    url: &str,
    page_index: u32,
    captured_at: &str,
) -> Result<PageResult, PageError> {
    let document = parse_document(html).map_err(|e| PageError::new(page_index, e))?;
    let blocks = locator.locate(&document);

    if blocks.is_empty() {
        warn!(page = page_index, container = locator.container(), "No listings found on page");
        return Ok(PageResult::default());
    }

    let page_url = Url::parse(url).ok();
    let mut result = PageResult::default();

    for (block_index, block) in blocks.into_iter().enumerate() {
        let ctx = BlockContext {
            block_index,
            page_index,
            captured_at,
            page_url: page_url.as_ref(),
        };
        match extract(block, plan, &ctx) {
            Ok(record) => result.records.push(record),
            Err(e) => {
                warn!(page = page_index, block = block_index, error = %e, "Skipping malformed listing");
                result.failed_count += 1;
            }
        }
    }

    debug!(
        page = page_index,
        records = result.records.len(),
        failed = result.failed_count,
        "Page extracted"
    );
    Ok(result)
}
