//! Client-controlled list parameters: `sort`, `page`, `page_size`.
//!
//! Sort fields are checked against a per-resource allow-list and resolved to a
//! static column name, so nothing the client sends reaches the SQL text.
//! Every list query orders by the chosen column and then by `id`.

use serde::{Deserialize, Serialize};

use crate::{
    config::PagingConfig,
    error::{AppError, ValidationErrors},
};

pub const MAX_PAGE: i64 = 10_000_000;

/// Wire name accepted in `sort`, and the column it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub name: &'static str,
    pub column: &'static str,
}

pub const fn field(name: &'static str, column: &'static str) -> SortField {
    SortField { name, column }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: &'static str,
    pub direction: SortDirection,
}

/// Raw query-string parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// A validated, bounded list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filters {
    pub sort: Sort,
    pub page: i64,
    pub page_size: i64,
}

impl Filters {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// `ORDER BY` clause with the `id` tie-break.
    pub fn order_by(&self) -> String {
        format!(
            "ORDER BY {} {}, id ASC",
            self.sort.column,
            self.sort.direction.as_sql()
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

/// A page of items with its metadata.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub metadata: Metadata,
}

pub fn validate_sort(sort: &str, allow_list: &[SortField]) -> Result<Sort, AppError> {
    let (name, direction) = match sort.strip_prefix('-') {
        Some(rest) => (rest, SortDirection::Desc),
        None => (sort, SortDirection::Asc),
    };
    allow_list
        .iter()
        .find(|f| f.name == name)
        .map(|f| Sort {
            column: f.column,
            direction,
        })
        .ok_or_else(|| AppError::InvalidSort(sort.to_owned()))
}

/// Checks `page`/`page_size` and caps the size at `max_page_size`.
pub fn plan(page: i64, page_size: i64, max_page_size: i64) -> Result<(i64, i64), AppError> {
    let mut v = ValidationErrors::new();
    v.check(page > 0, "page", "must be greater than zero");
    v.check(page <= MAX_PAGE, "page", "must be a maximum of 10 million");
    v.check(page_size > 0, "page_size", "must be greater than zero");
    v.into_result()?;
    Ok((page, page_size.min(max_page_size)))
}

pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records <= 0 || page_size <= 0 {
        return Metadata::default();
    }
    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}

/// Validates a raw query against `allow_list`. Sort defaults to `id` ascending.
pub fn build_filters(
    query: &ListQuery,
    allow_list: &[SortField],
    paging: &PagingConfig,
) -> Result<Filters, AppError> {
    let sort = validate_sort(query.sort.as_deref().unwrap_or("id"), allow_list)?;
    let (page, page_size) = plan(
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(paging.default_page_size),
        paging.max_page_size,
    )?;
    Ok(Filters {
        sort,
        page,
        page_size,
    })
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total_records: i64, filters: &Filters) -> Self {
        Self {
            data,
            metadata: calculate_metadata(total_records, filters.page, filters.page_size),
        }
    }
}
