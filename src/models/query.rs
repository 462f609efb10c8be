//! Pagination and filtering shared by list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size when `limit` is not given.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Flexible list query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Free-text search (case-insensitive substring)
    pub search: Option<String>,
    /// Limit results (default: 100)
    pub limit: Option<usize>,
    /// Offset for pagination
    pub offset: Option<usize>,
    /// Order by: "asc" or "desc" (default: desc)
    pub order: Option<String>,
}

impl ListQuery {
    /// Effective limit, clamped to `max` (and at least 1).
    pub fn limit(&self, max: usize) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max.max(1))
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    pub fn order_sql(&self) -> &'static str {
        match self.order.as_deref() {
            Some("asc") => "ASC",
            _ => "DESC",
        }
    }

    /// LIKE pattern for the search term, with wildcards escaped (`ESCAPE '\'`).
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}

/// Response wrapper with pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: usize,
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_clamped() {
        let q = ListQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(q.limit(500), 500);
        assert_eq!(ListQuery::default().limit(500), DEFAULT_PAGE_SIZE);

        let zero = ListQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.limit(500), 1);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let q = ListQuery {
            search: Some(" 50%_off ".into()),
            ..Default::default()
        };
        assert_eq!(q.search_pattern().unwrap(), "%50\\%\\_off%");

        let blank = ListQuery {
            search: Some("  ".into()),
            ..Default::default()
        };
        assert!(blank.search_pattern().is_none());
    }

    #[test]
    fn test_order_defaults_to_desc() {
        assert_eq!(ListQuery::default().order_sql(), "DESC");
        let asc = ListQuery {
            order: Some("asc".into()),
            ..Default::default()
        };
        assert_eq!(asc.order_sql(), "ASC");
    }
}
