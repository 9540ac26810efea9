//! # acton-query
//!
//! Pagination, filtering and sorting for list endpoints.
//!
//! Untyped query-string parameters are parsed into a [`QueryRequest`], checked
//! against per-resource whitelists, applied to any [`QueryableStore`] for
//! offset or cursor pagination, and returned in a [`QueryResult`] envelope with
//! pagination metadata and navigation links.
//!
//! ## Features
//!
//! - **Fail-open parsing**: malformed parameters fall back to defaults
//! - **Whitelists**: non-whitelisted filter and sort fields never reach the store
//! - **Dual pagination**: page/page-size and opaque base64url cursors
//! - **Pluggable stores**: in-memory rows, or PostgreSQL via sqlx (`database`)
//! - **Axum integration**: `QueryRequest` extractor and `QueryResult` responses (`http`)
//!
//! ## Example
//!
//! ```rust
//! use acton_query::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! struct Product {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Record for Product {
//!     fn field(&self, name: &str) -> Option<FilterValue> {
//!         match name {
//!             "id" => Some(self.id.into()),
//!             "name" => Some(self.name.as_str().into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl Identifiable for Product {
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//! }
//!
//! # tokio_test_block(async {
//! let products = (1..=25)
//!     .map(|id| Product { id, name: format!("widget {id}") })
//!     .collect();
//! let store = MemoryStore::new(products);
//!
//! let params = RawParams::from_query("page=2&page_size=10&sort=id&search=widget");
//! let request = parse(&params, "/api/products");
//!
//! let builder = QueryBuilder::default()
//!     .with_sort_fields(["id", "name"])
//!     .with_searchable_columns(["name"]);
//! let result = builder.execute(store, &request).await.unwrap();
//!
//! assert_eq!(result.data.len(), 10);
//! assert_eq!(result.data[0].id, 11);
//! assert!(result.links.next.is_some());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod cursor;
pub mod error;
pub mod links;
pub mod model;
pub mod observability;
pub mod parser;
pub mod response;
pub mod store;

#[cfg(feature = "http")]
mod extract;

pub use builder::QueryBuilder;
pub use config::QueryConfig;
pub use error::{Error, Result};
pub use links::Links;
pub use model::{
    CursorToken, Filter, FilterOperator, FilterValue, PaginationMode, QueryRequest,
    SortDirection, SortField,
};
pub use parser::{RawParams, RequestParser};
pub use response::{
    build_response, CursorPagination, OffsetPagination, PaginationMeta, QueryResult,
    ResponseBuilder,
};
pub use store::{BuiltQuery, Identifiable, MemoryStore, QueryDescriptor, QueryableStore, Record};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::QueryBuilder;
    pub use crate::config::QueryConfig;
    pub use crate::cursor;
    pub use crate::error::{Error, Result};
    pub use crate::links::Links;
    pub use crate::model::{
        CursorToken, Filter, FilterOperator, FilterValue, PaginationMode, QueryRequest,
        SortDirection, SortField,
    };
    pub use crate::observability::init_tracing;
    pub use crate::parser::{parse, RawParams, RequestParser};
    pub use crate::response::{
        build_response, CursorPagination, OffsetPagination, PaginationMeta, QueryResult,
        ResponseBuilder,
    };
    pub use crate::store::{
        BuiltQuery, Comparison, Identifiable, MemoryStore, Predicate, QueryDescriptor,
        QueryableStore, Record,
    };
    #[cfg(feature = "database")]
    pub use crate::store::{ColumnType, SqlQuery, SqlStore};
}
