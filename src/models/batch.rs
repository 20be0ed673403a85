use std::collections::BTreeMap;
use std::fmt;

use crate::error::PageFailure;
use crate::models::ListingRecord;

/// Records extracted from one page, in DOM order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    pub records: Vec<ListingRecord>,
    pub failed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    Completed,
    /// The fetcher became unusable; pages after `page_index` were never attempted.
    Aborted { page_index: u32, reason: String },
    Cancelled,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Aborted { page_index, reason } => {
                write!(f, "aborted at page {}: {}", page_index, reason)
            }
            BatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one batch run: the records plus a manifest of what failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub records: Vec<ListingRecord>,
    pub page_errors: BTreeMap<u32, PageFailure>,
    /// Pages with at least one malformed listing block, and how many.
    pub block_failures: BTreeMap<u32, usize>,
    pub status: BatchStatus,
}

impl Default for BatchResult {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            page_errors: BTreeMap::new(),
            block_failures: BTreeMap::new(),
            status: BatchStatus::Completed,
        }
    }
}

impl BatchResult {
    pub(crate) fn push_page(&mut self, page_index: u32, page: PageResult) {
        if page.failed_count > 0 {
            self.block_failures.insert(page_index, page.failed_count);
        }
        self.records.extend(page.records);
    }

    pub(crate) fn push_failure(&mut self, page_index: u32, cause: PageFailure) {
        self.page_errors.insert(page_index, cause);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_block_failures(&self) -> usize {
        self.block_failures.values().sum()
    }
}
