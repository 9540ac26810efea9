//! Axum extractor for list requests
//!
//! Handlers take a [`QueryRequest`] argument directly. Extraction never
//! rejects: the query string is parsed with the same fail-open rules as
//! [`crate::parser::parse`], and `base_url` is the request path.
//!
//! Page-size limits come from a [`QueryConfig`] request extension when one is
//! present (for example via `axum::Extension`), otherwise the defaults apply.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_query::prelude::*;
//! use axum::{routing::get, Router};
//!
//! async fn list_products(request: QueryRequest) -> QueryResult<Product> {
//!     let store = MemoryStore::new(load_products());
//!     products_query().execute(store, &request).await.unwrap_or_else(|e| match e {})
//! }
//!
//! let app = Router::new().route("/api/products", get(list_products));
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::config::QueryConfig;
use crate::model::QueryRequest;
use crate::parser::{RawParams, RequestParser};

impl<S> FromRequestParts<S> for QueryRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let config = parts
            .extensions
            .get::<QueryConfig>()
            .cloned()
            .unwrap_or_default();

        let params = RawParams::from_query(parts.uri.query().unwrap_or_default());
        Ok(RequestParser::new(config).parse(&params, parts.uri.path()))
    }
}
