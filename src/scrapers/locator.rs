use scraper::{ElementRef, Html, Selector};

use crate::error::PlanError;
use crate::scrapers::plan::compile_selector;

/// Finds the repeated listing blocks on a page.
pub struct ListingLocator {
    selector: Selector,
    container: String,
}

impl ListingLocator {
    pub fn new(container: &str) -> Result<Self, PlanError> {
        if container.trim().is_empty() {
            return Err(PlanError::EmptyContainer);
        }
        Ok(Self {
            selector: compile_selector(container)?,
            container: container.to_string(),
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Blocks in document order. Empty when the page has no listings.
    pub fn locate<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&self.selector).collect()
    }
}
