//! Query-string parsing
//!
//! Turns the raw key/value pairs of a list request into a [`QueryRequest`].
//! Parsing never fails: anything malformed is dropped and the default kept,
//! because pagination parameters are advisory.
//!
//! Recognized parameters:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `type` | `cursor` selects cursor pagination, anything else offset |
//! | `page`, `page_size` | positive integers; `page_size` above the ceiling is dropped |
//! | `cursor`, `after`, `before` | opaque cursor strings |
//! | `first`, `last` | positive integers, override `page_size` |
//! | `sort` | `-created_at,name:asc` |
//! | `filter` | JSON array of filters, or `status:active,role:admin` |
//! | `field[op]` | one filter per key, e.g. `price[gte]=100` |
//! | `search`, `search_fields` | free-text search |
//! | `include_total` | `true` or `1` |
//!
//! # Example
//!
//! ```rust
//! use acton_query::{parser, FilterOperator, RawParams, SortDirection};
//!
//! let params = RawParams::from_query("sort=-created_at,name:asc&price%5Bgte%5D=100");
//! let request = parser::parse(&params, "/api/products");
//!
//! assert_eq!(request.sort[0].field, "created_at");
//! assert_eq!(request.sort[0].direction, SortDirection::Desc);
//! assert_eq!(request.filters[0].operator, FilterOperator::GreaterOrEqual);
//! assert_eq!(request.base_url, "/api/products");
//! ```

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::config::QueryConfig;
use crate::model::{
    Filter, FilterOperator, FilterValue, PaginationMode, QueryRequest, SortDirection, SortField,
};

/// Raw query parameters: each key maps to every value sent for it, in order
///
/// Keys iterate in sorted order, so bracket filters come out deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams(BTreeMap<String, Vec<String>>);

impl RawParams {
    /// Create an empty parameter map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` query string
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Append a value under `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// First value sent for `key`
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values sent for `key`
    #[must_use]
    pub fn all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterate over keys and their values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether no parameters were sent
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = RawParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Parser bound to a set of page-size limits
#[derive(Debug, Clone, Default)]
pub struct RequestParser {
    config: QueryConfig,
}

impl RequestParser {
    /// Create a parser using the given limits
    #[must_use]
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    /// Parse raw parameters; `base_path` becomes the request's `base_url`
    #[must_use]
    pub fn parse(&self, params: &RawParams, base_path: &str) -> QueryRequest {
        let mut request = QueryRequest {
            page_size: self.config.default_page_size,
            base_url: base_path.to_string(),
            ..QueryRequest::default()
        };

        if params.first("type") == Some("cursor") {
            request.mode = PaginationMode::Cursor;
        }

        if let Some(page) = params.first("page").and_then(parse_positive) {
            request.page = page;
        }

        match params.first("page_size").and_then(parse_positive) {
            Some(size) if self.config.accepts_page_size(size) => request.page_size = size,
            Some(size) => {
                tracing::debug!(page_size = size, "Ignoring out-of-range page_size");
            }
            None => {}
        }

        request.cursor = non_empty(params.first("cursor"));
        request.after = non_empty(params.first("after"));
        request.before = non_empty(params.first("before"));

        if let Some(first) = params.first("first").and_then(parse_positive) {
            request.first = Some(first);
            request.page_size = first;
        }
        if let Some(last) = params.first("last").and_then(parse_positive) {
            request.last = Some(last);
            request.page_size = last;
        }

        if let Some(sort) = params.first("sort") {
            request.sort = parse_sort(sort);
            request
                .criteria_params
                .push(("sort".to_string(), sort.to_string()));
        }

        if let Some(filter) = params.first("filter") {
            request.filters.extend(parse_filter_param(filter));
            request
                .criteria_params
                .push(("filter".to_string(), filter.to_string()));
        }

        for (key, values) in params.iter() {
            let Some((field, tag)) = split_bracket_key(key) else {
                continue;
            };
            if let Some(filter) = bracket_filter(field, tag, values) {
                request.filters.push(filter);
                for value in values {
                    request
                        .criteria_params
                        .push((key.to_string(), value.clone()));
                }
            }
        }

        request.search = non_empty(params.first("search"));
        if let Some(search) = &request.search {
            request
                .criteria_params
                .push(("search".to_string(), search.clone()));
        }

        // Fields without a term have no effect, so links do not carry them.
        for raw in params.all("search_fields") {
            let fields = split_list(raw);
            if request.search.is_some() && !fields.is_empty() {
                request
                    .criteria_params
                    .push(("search_fields".to_string(), raw.clone()));
            }
            request.search_fields.extend(fields);
        }

        request.include_total = matches!(params.first("include_total"), Some("true" | "1"));

        request
    }
}

/// Parse with the default limits
#[must_use]
pub fn parse(params: &RawParams, base_path: &str) -> QueryRequest {
    RequestParser::default().parse(params, base_path)
}

/// Parse a `sort` value: comma-separated `field`, `-field` or `field:dir`
#[must_use]
pub fn parse_sort(raw: &str) -> Vec<SortField> {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            if let Some(field) = segment.strip_prefix('-') {
                return Some(SortField::desc(field.trim()));
            }
            let (field, direction) = match segment.split_once(':') {
                Some((field, dir)) if dir.trim().eq_ignore_ascii_case("desc") => {
                    (field, SortDirection::Desc)
                }
                Some((field, _)) => (field, SortDirection::Asc),
                None => (segment, SortDirection::Asc),
            };
            let field = field.trim();
            (!field.is_empty()).then(|| SortField::new(field, direction))
        })
        .filter(|sort| !sort.field.is_empty())
        .collect()
}

/// Parse a `filter` value: a JSON array of filters, else `key:value` pairs
#[must_use]
pub fn parse_filter_param(raw: &str) -> Vec<Filter> {
    if let Ok(filters) = serde_json::from_str::<Vec<Filter>>(raw) {
        return filters;
    }

    raw.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .filter_map(|(key, value)| {
            let key = key.trim();
            (!key.is_empty()).then(|| Filter::eq(key, value.trim()))
        })
        .collect()
}

/// Split `field[op]` into its parts
fn split_bracket_key(key: &str) -> Option<(&str, &str)> {
    let inner = key.strip_suffix(']')?;
    let (field, tag) = inner.split_once('[')?;
    if field.is_empty() || tag.is_empty() {
        return None;
    }
    Some((field, tag))
}

/// Build the filter for one bracket key
fn bracket_filter(field: &str, tag: &str, values: &[String]) -> Option<Filter> {
    let operator = FilterOperator::from_tag(tag);
    let filter = match operator {
        FilterOperator::In | FilterOperator::NotIn => {
            let values: Vec<FilterValue> = values
                .iter()
                .flat_map(|raw| split_list(raw))
                .map(FilterValue::String)
                .collect();
            Filter::with_values(field, operator, values)
        }
        FilterOperator::Between => {
            let bounds: Vec<String> = if values.len() >= 2 {
                values.iter().take(2).cloned().collect()
            } else {
                values
                    .first()
                    .map(|raw| split_list(raw).into_iter().take(2).collect())
                    .unwrap_or_default()
            };
            Filter::with_values(field, operator, bounds)
        }
        FilterOperator::IsNull | FilterOperator::IsNotNull => Filter {
            field: field.to_string(),
            operator,
            value: None,
            values: Vec::new(),
        },
        _ => Filter::new(field, operator, values.first()?.as_str()),
    };
    Some(filter)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_query(query: &str) -> QueryRequest {
        parse(&RawParams::from_query(query), "/api/items")
    }

    #[test]
    fn test_defaults_for_empty_query() {
        let request = parse_query("");
        assert_eq!(request.mode, PaginationMode::Offset);
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 20);
        assert!(request.sort.is_empty());
        assert!(request.filters.is_empty());
        assert!(!request.include_total);
        assert_eq!(request.base_url, "/api/items");
    }

    #[test]
    fn test_type_selects_mode() {
        assert_eq!(parse_query("type=cursor").mode, PaginationMode::Cursor);
        assert_eq!(parse_query("type=offset").mode, PaginationMode::Offset);
        assert_eq!(parse_query("type=CURSOR").mode, PaginationMode::Offset);
    }

    #[test]
    fn test_page_and_page_size() {
        let request = parse_query("page=3&page_size=50");
        assert_eq!(request.page, 3);
        assert_eq!(request.page_size, 50);
    }

    #[test]
    fn test_invalid_page_values_keep_defaults() {
        for query in ["page=0", "page=-2", "page=abc", "page="] {
            assert_eq!(parse_query(query).page, 1, "{query}");
        }
        for query in ["page_size=0", "page_size=-1", "page_size=x", "page_size=101"] {
            assert_eq!(parse_query(query).page_size, 20, "{query}");
        }
        assert_eq!(parse_query("page_size=100").page_size, 100);
    }

    #[test]
    fn test_configured_ceiling_rejects_page_size() {
        let parser = RequestParser::new(QueryConfig {
            default_page_size: 10,
            max_page_size: 25,
            ..QueryConfig::default()
        });
        let request = parser.parse(&RawParams::from_query("page_size=30"), "/");
        assert_eq!(request.page_size, 10);
    }

    #[test]
    fn test_cursor_params_copied_verbatim() {
        let request = parse_query("type=cursor&cursor=abc_-=&after=def&before=ghi");
        assert_eq!(request.cursor.as_deref(), Some("abc_-="));
        assert_eq!(request.after.as_deref(), Some("def"));
        assert_eq!(request.before.as_deref(), Some("ghi"));
    }

    #[test]
    fn test_first_and_last_override_page_size() {
        let request = parse_query("page_size=10&first=5");
        assert_eq!(request.first, Some(5));
        assert_eq!(request.page_size, 5);

        let request = parse_query("last=7");
        assert_eq!(request.last, Some(7));
        assert_eq!(request.page_size, 7);

        let request = parse_query("page_size=10&first=0");
        assert_eq!(request.first, None);
        assert_eq!(request.page_size, 10);
    }

    #[test]
    fn test_sort_string() {
        let request = parse_query("sort=-created_at,name:asc");
        assert_eq!(
            request.sort,
            vec![SortField::desc("created_at"), SortField::asc("name")]
        );
    }

    #[test]
    fn test_sort_direction_forms() {
        assert_eq!(
            parse_sort("price:DESC,rank:sideways,,title"),
            vec![
                SortField::desc("price"),
                SortField::asc("rank"),
                SortField::asc("title"),
            ]
        );
        assert!(parse_sort(",,").is_empty());
        assert!(parse_sort("-").is_empty());
    }

    #[test]
    fn test_bracket_filter_single_value() {
        let request = parse_query("price%5Bgte%5D=100");
        assert_eq!(
            request.filters,
            vec![Filter::new("price", FilterOperator::GreaterOrEqual, "100")]
        );
    }

    #[test]
    fn test_bracket_filter_takes_first_value() {
        let request = parse_query("status[eq]=active&status[eq]=archived");
        assert_eq!(request.filters.len(), 1);
        assert_eq!(request.filters[0].value, Some(FilterValue::from("active")));
    }

    #[test]
    fn test_bracket_filter_in_collects_values() {
        let request = parse_query("status[in]=active&status[in]=pending,review");
        let filter = &request.filters[0];
        assert_eq!(filter.operator, FilterOperator::In);
        assert_eq!(
            filter.values,
            vec![
                FilterValue::from("active"),
                FilterValue::from("pending"),
                FilterValue::from("review"),
            ]
        );
    }

    #[test]
    fn test_bracket_filter_not_in_spellings() {
        for query in ["tier[not_in]=a&tier[not_in]=b", "tier[not-in]=a,b"] {
            let request = parse_query(query);
            assert_eq!(request.filters[0].operator, FilterOperator::NotIn, "{query}");
            assert_eq!(request.filters[0].values.len(), 2, "{query}");
        }
    }

    #[test]
    fn test_bracket_filter_between() {
        let request = parse_query("price[between]=10&price[between]=20&price[between]=30");
        assert_eq!(
            request.filters[0].values,
            vec![FilterValue::from("10"), FilterValue::from("20")]
        );

        let request = parse_query("price[between]=10,20");
        assert_eq!(request.filters[0].values.len(), 2);

        let request = parse_query("price[between]=10");
        assert_eq!(request.filters[0].values.len(), 1);
    }

    #[test]
    fn test_bracket_filter_null_operators() {
        let request = parse_query("deleted_at[is_null]=true");
        assert_eq!(request.filters[0].operator, FilterOperator::IsNull);
        assert!(request.filters[0].value.is_none());
    }

    #[test]
    fn test_bracket_filter_unknown_operator_is_kept() {
        let request = parse_query("name[regex]=^a");
        assert_eq!(
            request.filters[0].operator,
            FilterOperator::Unknown("regex".to_string())
        );
    }

    #[test]
    fn test_malformed_bracket_keys_ignored() {
        let request = parse_query("[eq]=x&name[]=y&name[eq=z");
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_filter_param_json() {
        let request = parse_query(
            "filter=%5B%7B%22field%22%3A%22price%22%2C%22operator%22%3A%22lt%22%2C%22value%22%3A50%7D%5D",
        );
        assert_eq!(
            request.filters,
            vec![Filter::new("price", FilterOperator::LessThan, 50_i64)]
        );
    }

    #[test]
    fn test_filter_param_pairs() {
        assert_eq!(
            parse_filter_param("status:active, role:admin,broken,:x"),
            vec![Filter::eq("status", "active"), Filter::eq("role", "admin")]
        );
    }

    #[test]
    fn test_search_and_search_fields() {
        let request = parse_query("search=foo&search_fields=name&search_fields=sku,notes");
        assert_eq!(request.search.as_deref(), Some("foo"));
        assert_eq!(request.search_fields, vec!["name", "sku", "notes"]);
    }

    #[test]
    fn test_include_total() {
        assert!(parse_query("include_total=true").include_total);
        assert!(parse_query("include_total=1").include_total);
        assert!(!parse_query("include_total=yes").include_total);
        assert!(!parse_query("include_total=0").include_total);
    }

    #[test]
    fn test_base_url_not_taken_from_params() {
        let request = parse_query("baseURL=http%3A%2F%2Fevil&base_url=x");
        assert_eq!(request.base_url, "/api/items");
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_search_fields_without_term_are_not_echoed() {
        for query in ["search=&search_fields=name", "search_fields=name,sku"] {
            let request = parse_query(query);
            assert!(request.search.is_none(), "{query}");
            assert!(request.criteria_params.is_empty(), "{query}");
        }

        let request = parse_query("search=foo&search_fields=&search_fields=name");
        assert_eq!(
            request.criteria_params,
            vec![
                ("search".to_string(), "foo".to_string()),
                ("search_fields".to_string(), "name".to_string()),
            ]
        );
    }

    #[test]
    fn test_criteria_params_record_raw_values() {
        let request = parse_query("sort=-name&status%5Beq%5D=active&search=foo&page=2");
        assert_eq!(
            request.criteria_params,
            vec![
                ("sort".to_string(), "-name".to_string()),
                ("status[eq]".to_string(), "active".to_string()),
                ("search".to_string(), "foo".to_string()),
            ]
        );
    }

    #[test]
    fn test_raw_params_from_query() {
        let params = RawParams::from_query("?a=1&a=2&b=x%20y");
        assert_eq!(params.all("a"), ["1".to_string(), "2".to_string()]);
        assert_eq!(params.first("b"), Some("x y"));
        assert!(params.all("missing").is_empty());
    }
}
