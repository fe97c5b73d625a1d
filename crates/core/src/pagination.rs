//! Limit/offset pagination.

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound applied when no configured maximum is given.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Requested page window, as received from a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageRequest {
    /// Effective limit: default when absent, clamped to `1..=max`.
    #[must_use]
    pub fn limit(&self, max: u32) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max.max(1))
    }

    /// Effective offset.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// `(limit, offset)` as `i64` for SQL binds.
    #[must_use]
    pub fn bounds(&self, max: u32) -> (i64, i64) {
        (i64::from(self.limit(max)), i64::from(self.offset()))
    }
}

/// A page of results plus the total count of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Convert each result.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
