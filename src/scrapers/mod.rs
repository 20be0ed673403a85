mod batch;
mod extractor;
mod locator;
mod page;
mod paging;
mod plan;

pub use batch::{BatchRequest, BatchScraper, BatchSettings, Clock, TIMESTAMP_FORMAT};
pub use extractor::{extract, BlockContext};
pub use locator::ListingLocator;
pub use page::{extract_page, scrape_page};
pub use paging::PagingConvention;
pub use plan::{CompiledPlan, ExtractionPlan, FieldRule, SelectorCandidate};
