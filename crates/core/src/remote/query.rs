//! Row selection queries.

use serde_json::Value;

/// Sort order of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    /// Column to sort on.
    pub column: &'static str,
    /// Ascending when `true`.
    pub ascending: bool,
}

impl Sort {
    /// Ascending order on `column`.
    #[must_use]
    pub const fn ascending(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    /// Descending order on `column`.
    #[must_use]
    pub const fn descending(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

/// A selection over one collection: equality filters, an optional sort and
/// an optional row limit.
///
/// ```
/// use amicale_core::remote::{Query, Sort};
///
/// let query = Query::new("events")
///     .eq("location", "Salle des fêtes")
///     .sort(Sort::ascending("starts_at"))
///     .limit(10);
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl Query {
    /// Select every row of `collection`.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            sort: None,
            limit: None,
        }
    }

    /// Keep rows whose `column` equals `value`.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Sort the selection.
    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Return at most `limit` rows.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `row` passes every filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|f| row.get(&f.column).is_some_and(|v| v == &f.value))
    }
}
