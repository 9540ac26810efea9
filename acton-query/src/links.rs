//! Navigation links
//!
//! Every link is the request's `base_url` plus the criteria the client sent
//! (sort, filters, search) and the page or cursor that identifies the target.
//! Criteria are re-encoded from the parsed request, so a link always reproduces
//! the same result set at a different position.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::model::{PaginationMode, QueryRequest};

/// Navigation links for a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    /// The page that was returned
    #[serde(rename = "self")]
    pub self_: String,
    /// First page (offset mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    /// Last page (offset mode, when there is at least one page)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
    /// Following page, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Preceding page (offset mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

/// Where a link points
enum Position<'a> {
    Page(u64),
    Cursor(Option<&'a str>),
}

/// Links for an offset-mode page
#[must_use]
pub fn offset_links(request: &QueryRequest, page_size: u32, total_pages: u64) -> Links {
    let page = u64::from(request.page_number());
    let url = |target: u64| link(request, page_size, Position::Page(target));

    Links {
        self_: url(page),
        first: Some(url(1)),
        last: (total_pages > 0).then(|| url(total_pages)),
        next: (page < total_pages).then(|| url(page + 1)),
        prev: (page > 1).then(|| url(page - 1)),
    }
}

/// Links for a cursor-mode page
///
/// Only `self` and `next` exist: a cursor is not addressable by position.
#[must_use]
pub fn cursor_links(
    request: &QueryRequest,
    page_size: u32,
    end_cursor: Option<&str>,
    has_next_page: bool,
) -> Links {
    let next = match end_cursor {
        Some(cursor) if has_next_page => Some(link(
            request,
            page_size,
            Position::Cursor(Some(cursor)),
        )),
        _ => None,
    };

    Links {
        self_: link(
            request,
            page_size,
            Position::Cursor(request.current_cursor()),
        ),
        first: None,
        last: None,
        next,
        prev: None,
    }
}

fn link(request: &QueryRequest, page_size: u32, position: Position<'_>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());

    if request.mode == PaginationMode::Cursor {
        query.append_pair("type", "cursor");
    }
    for (key, value) in request.navigation_params() {
        query.append_pair(&key, &value);
    }
    query.append_pair("page_size", &page_size.to_string());
    match position {
        Position::Page(page) => {
            query.append_pair("page", &page.to_string());
        }
        Position::Cursor(Some(cursor)) => {
            query.append_pair("cursor", cursor);
        }
        Position::Cursor(None) => {}
    }

    let separator = if request.base_url.contains('?') { '&' } else { '?' };
    format!("{}{separator}{}", request.base_url, query.finish())
}
