use thiserror::Error;

/// Failure to obtain rendered markup for a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP error {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("transport failure for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("render failure for {url}: {message}")]
    Render { url: String, message: String },

    /// The fetcher's underlying session is gone and cannot be re-established.
    #[error("fetcher lifecycle failure: {0}")]
    Lifecycle(String),
}

impl FetchError {
    /// Lifecycle failures end the whole batch; everything else only costs one page.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, FetchError::Lifecycle(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("document is empty")]
    EmptyDocument,

    #[error("document contains no markup")]
    NotMarkup,
}

/// Why a page produced no document at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("page {page_index} failed: {cause}")]
pub struct PageError {
    pub page_index: u32,
    pub cause: PageFailure,
}

impl PageError {
    pub fn new(page_index: u32, cause: impl Into<PageFailure>) -> Self {
        Self {
            page_index,
            cause: cause.into(),
        }
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(&self.cause, PageFailure::Fetch(e) if e.is_lifecycle())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionCause {
    #[error("required field `{field}` has no matching node")]
    MissingRequired { field: String },
}

/// One listing block could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("listing block {block_index}: {cause}")]
pub struct ExtractionError {
    pub block_index: usize,
    pub cause: ExtractionCause,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("container selector is empty")]
    EmptyContainer,

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("field `{0}` has no candidate selectors")]
    NoCandidates(String),

    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("field name `{0}` is reserved")]
    ReservedField(String),

    #[error("classification rule for `{0}` has no keywords")]
    EmptyRule(String),
}

/// Rejections raised before a batch starts running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("invalid batch request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}
