/// Outcome definitions for the per-item fetch-and-enrich step
use crate::storage::Record;
use std::fmt;

/// Why an item ended in the error ledger as a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Permanent HTTP error, malformed response, or retries exhausted
    Fetch,

    /// The extractor could not make sense of the fetched content
    Extract,

    /// Extraction succeeded but a required field is missing
    Incomplete,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Incomplete => "incomplete",
        }
    }
}

/// Result of processing one item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// The record is complete and goes into the merge store
    Ok(Record),

    /// Dropped by policy (e.g. no qualifying MP3); reported below error severity
    Skipped(String),

    /// Failed; the reason lands in the error ledger
    Err(FailureKind, String),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Err(..))
    }

    /// Ledger reason for skipped and failed outcomes
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Skipped(reason) | Self::Err(_, reason) => Some(reason),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::Skipped(_) => "skipped",
            Self::Err(..) => "err",
        }
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.label(), reason),
            None => write!(f, "{}", self.label()),
        }
    }
}
