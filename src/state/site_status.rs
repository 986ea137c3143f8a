/// Site status definitions for tracking indexing progress
use std::fmt;

/// Reason recorded on sites interrupted by a stop request
pub const STOPPED_BY_OPERATOR: &str = "stopped by operator";

/// Represents the indexing status of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteStatus {
    /// Site is being crawled and indexed
    Indexing,

    /// Crawl finished without a fatal error
    Indexed,

    /// Crawl aborted by an error or an operator stop
    Failed,
}

impl SiteStatus {
    /// Converts the status to its database representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Indexing => "INDEXING",
            Self::Indexed => "INDEXED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "INDEXING" => Some(Self::Indexing),
            "INDEXED" => Some(Self::Indexed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
