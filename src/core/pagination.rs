//! Paginated query results and the name search shared by the listings.

use crate::errors::{Error, Result};
use sea_orm::sea_query::LikeExpr;
use serde::Serialize;

const LIKE_ESCAPE: char = '!';

/// One page of a filtered listing.
///
/// `total` is always counted over the same filter that produced `items`, not
/// over the whole table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// Number of rows matching the filter across all pages
    pub total: u64,
    /// Page size that was requested
    pub limit: u64,
    /// Rows skipped before this page
    pub offset: u64,
}

impl<T> Page<T> {
    /// Number of pages needed to show `total` rows.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            0
        } else {
            self.total.div_ceil(self.limit)
        }
    }

    /// Whether rows exist after this page.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.offset.saturating_add(self.limit) < self.total
    }

    /// Whether rows exist before this page.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.offset > 0
    }
}

/// Rejects a zero page size.
pub(crate) fn validate_limit(limit: u64) -> Result<()> {
    if limit == 0 {
        return Err(Error::Validation {
            message: "Limit must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// `LIKE` pattern matching names that contain `search` literally.
///
/// `%` and `_` in the search text are escaped so they only match themselves.
pub(crate) fn contains_pattern(search: &str) -> LikeExpr {
    let mut pattern = String::from("%");
    for c in search.trim().chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/// Slices an in-memory result set the same way `LIMIT`/`OFFSET` would.
pub(crate) fn paginate_vec<T>(rows: Vec<T>, limit: u64, offset: u64) -> Result<Page<T>> {
    validate_limit(limit)?;
    let total = u64::try_from(rows.len())?;
    let items = rows
        .into_iter()
        .skip(usize::try_from(offset)?)
        .take(usize::try_from(limit)?)
        .collect();
    Ok(Page {
        items,
        total,
        limit,
        offset,
    })
}
