//! List response envelope
//!
//! [`ResponseBuilder::build`] is a pure function of the request and the facts
//! of the returned page: total matching rows, rows returned and the ids of the
//! first and last row.
//!
//! # Example
//!
//! ```rust
//! use acton_query::{build_response, QueryRequest};
//!
//! let request = QueryRequest::new()
//!     .with_page(5)
//!     .with_page_size(20)
//!     .with_base_url("/api/items");
//! let result = build_response(Vec::<u32>::new(), &request, 95, 15, 0, 0);
//!
//! let pagination = result.pagination.offset().unwrap();
//! assert_eq!(pagination.total_pages, 5);
//! assert!(!pagination.has_next_page);
//! assert!(pagination.has_prev_page);
//! ```

#[cfg(feature = "http")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::cursor;
use crate::links::{self, Links};
use crate::model::{Filter, PaginationMode, QueryRequest, SortField};

/// Offset pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPagination {
    /// Current page (1-indexed)
    pub page: u32,
    /// Items per page
    pub page_size: u32,
    /// Rows matching the filters and search
    pub total_items: u64,
    /// Pages needed to show every matching row
    pub total_pages: u64,
    /// Whether a later page exists
    pub has_next_page: bool,
    /// Whether an earlier page exists
    pub has_prev_page: bool,
}

/// Cursor pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPagination {
    /// Items per page
    pub page_size: u32,
    /// Cursor of the first returned row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    /// Cursor of the last returned row; pass it as `cursor` for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
    /// A full page came back, so more rows may follow
    pub has_next_page: bool,
    /// The request continued from a cursor
    pub has_prev_page: bool,
    /// Rows returned
    pub count: u64,
    /// Rows matching the filters and search, when `include_total` was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

/// Pagination metadata; the shape depends on the request's mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaginationMeta {
    /// Page number based
    Offset(OffsetPagination),
    /// Cursor based
    Cursor(CursorPagination),
}

impl PaginationMeta {
    /// Offset metadata, if this is an offset page
    #[must_use]
    pub fn offset(&self) -> Option<&OffsetPagination> {
        match self {
            Self::Offset(meta) => Some(meta),
            Self::Cursor(_) => None,
        }
    }

    /// Cursor metadata, if this is a cursor page
    #[must_use]
    pub fn cursor(&self) -> Option<&CursorPagination> {
        match self {
            Self::Cursor(meta) => Some(meta),
            Self::Offset(_) => None,
        }
    }

    /// Whether a following page may exist
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        match self {
            Self::Offset(meta) => meta.has_next_page,
            Self::Cursor(meta) => meta.has_next_page,
        }
    }
}

/// Response envelope for list endpoints
///
/// `applied_filters` and `applied_sort` echo what the client asked for, even
/// where a whitelist kept a field out of the executed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult<T> {
    /// Always `true` for a built envelope
    pub success: bool,
    /// The returned rows
    pub data: Vec<T>,
    /// Mode-specific pagination metadata
    pub pagination: PaginationMeta,
    /// Navigation links
    pub links: Links,
    /// Filters as requested
    pub applied_filters: Vec<Filter>,
    /// Sort as requested
    pub applied_sort: Vec<SortField>,
}

impl<T> QueryResult<T> {
    /// Map each row to a new type, keeping the metadata
    pub fn map<U, F>(self, f: F) -> QueryResult<U>
    where
        F: FnMut(T) -> U,
    {
        QueryResult {
            success: self.success,
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
            links: self.links,
            applied_filters: self.applied_filters,
            applied_sort: self.applied_sort,
        }
    }
}

#[cfg(feature = "http")]
impl<T: Serialize> IntoResponse for QueryResult<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Assembles [`QueryResult`]s using a set of page-size limits
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    config: QueryConfig,
}

impl ResponseBuilder {
    /// Create a response builder
    #[must_use]
    pub fn new(config: QueryConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    /// Build the envelope for one page
    ///
    /// `total` is ignored in cursor mode unless the request set
    /// `include_total`. `first_id` and `last_id` are the ids of the returned
    /// rows; 0 omits the corresponding cursor.
    pub fn build<T>(
        &self,
        data: Vec<T>,
        request: &QueryRequest,
        total: u64,
        result_count: u64,
        first_id: i64,
        last_id: i64,
    ) -> QueryResult<T> {
        let page_size = self.config.effective_page_size(request.page_size);

        let (pagination, links) = match request.mode {
            PaginationMode::Offset => {
                let page = request.page_number();
                let total_pages = total.div_ceil(u64::from(page_size));
                let meta = OffsetPagination {
                    page,
                    page_size,
                    total_items: total,
                    total_pages,
                    has_next_page: u64::from(page) < total_pages,
                    has_prev_page: page > 1,
                };
                (
                    PaginationMeta::Offset(meta),
                    links::offset_links(request, page_size, total_pages),
                )
            }
            PaginationMode::Cursor => {
                let meta = CursorPagination {
                    page_size,
                    start_cursor: cursor::encode_id(first_id),
                    end_cursor: cursor::encode_id(last_id),
                    has_next_page: result_count >= u64::from(page_size),
                    has_prev_page: request.current_cursor().is_some(),
                    count: result_count,
                    total_items: request.include_total.then_some(total),
                };
                let links = links::cursor_links(
                    request,
                    page_size,
                    meta.end_cursor.as_deref(),
                    meta.has_next_page,
                );
                (PaginationMeta::Cursor(meta), links)
            }
        };

        QueryResult {
            success: true,
            data,
            pagination,
            links,
            applied_filters: request.filters.clone(),
            applied_sort: request.sort.clone(),
        }
    }
}

/// Build an envelope with the default limits
pub fn build_response<T>(
    data: Vec<T>,
    request: &QueryRequest,
    total: u64,
    result_count: u64,
    first_id: i64,
    last_id: i64,
) -> QueryResult<T> {
    ResponseBuilder::default().build(data, request, total, result_count, first_id, last_id)
}
