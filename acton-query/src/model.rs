//! Filter, sort and cursor model
//!
//! These types describe one list request after parsing. They are created fresh
//! per request and discarded once the response is serialized.
//!
//! # Example
//!
//! ```rust
//! use acton_query::{Filter, QueryRequest, SortField};
//!
//! let request = QueryRequest::new()
//!     .with_page(2)
//!     .with_page_size(10)
//!     .with_sort(SortField::desc("created_at"))
//!     .with_filter(Filter::eq("status", "active"));
//!
//! assert_eq!(request.page, 2);
//! assert_eq!(request.sort.len(), 1);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::QueryConfig;

/// Which pagination strategy a request uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Page number and page size
    #[default]
    Offset,
    /// Opaque cursor, forward by id
    Cursor,
}

impl fmt::Display for PaginationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset => write!(f, "offset"),
            Self::Cursor => write!(f, "cursor"),
        }
    }
}

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use acton_query::SortDirection;
///
/// assert_eq!(format!("{}", SortDirection::Desc), "desc");
/// assert_eq!(SortDirection::Asc.as_sql(), "ASC");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Sort in ascending order (A-Z, 0-9, oldest first)
    #[default]
    Asc,
    /// Sort in descending order (Z-A, 9-0, newest first)
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl SortDirection {
    /// Convert to SQL ORDER BY clause fragment
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ORDER BY key
///
/// Multiple sort fields apply in sequence, each breaking ties left by the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Column to sort by
    pub field: String,
    /// Sort direction
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    /// Create a sort field
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Ascending sort on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    /// Descending sort on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Compact query-string form: `field` or `-field`
    #[must_use]
    pub fn to_param(&self) -> String {
        match self.direction {
            SortDirection::Asc => self.field.clone(),
            SortDirection::Desc => format!("-{}", self.field),
        }
    }
}

/// Comparison operators for filters
///
/// Operators travel as short tags (`eq`, `gte`, `not_in`, ...). A tag that
/// names no known operator is kept as [`FilterOperator::Unknown`] so it can be
/// echoed back to the client; the query builder ignores such filters.
///
/// # Example
///
/// ```rust
/// use acton_query::FilterOperator;
///
/// assert_eq!(FilterOperator::from_tag("gte"), FilterOperator::GreaterOrEqual);
/// assert_eq!(FilterOperator::from_tag("not-in"), FilterOperator::NotIn);
/// assert!(!FilterOperator::from_tag("regex").is_known());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessOrEqual,
    /// Substring match (LIKE '%value%')
    Like,
    /// Case-insensitive substring match
    CaseInsensitiveLike,
    /// Value is in a list (IN)
    In,
    /// Value is not in a list (NOT IN)
    NotIn,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
    /// Value lies in an inclusive range (BETWEEN)
    Between,
    /// Unrecognized tag, kept verbatim
    Unknown(String),
}

impl FilterOperator {
    /// Resolve an operator tag; never fails
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "eq" => Self::Equal,
            "ne" | "neq" => Self::NotEqual,
            "gt" => Self::GreaterThan,
            "gte" => Self::GreaterOrEqual,
            "lt" => Self::LessThan,
            "lte" => Self::LessOrEqual,
            "like" => Self::Like,
            "ilike" => Self::CaseInsensitiveLike,
            "in" => Self::In,
            "not_in" | "not-in" | "nin" => Self::NotIn,
            "is_null" | "null" => Self::IsNull,
            "is_not_null" | "not_null" => Self::IsNotNull,
            "between" => Self::Between,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Canonical tag for this operator
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::GreaterOrEqual => "gte",
            Self::LessThan => "lt",
            Self::LessOrEqual => "lte",
            Self::Like => "like",
            Self::CaseInsensitiveLike => "ilike",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::Between => "between",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether the tag named a supported operator
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Whether the operator reads the `values` list instead of `value`
    #[must_use]
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Between)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for FilterOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for FilterOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

/// A scalar filter operand
///
/// Query-string values always arrive as [`FilterValue::String`]; JSON filters
/// may carry numbers and booleans. Store adapters coerce as needed.
///
/// # Example
///
/// ```rust
/// use acton_query::FilterValue;
///
/// let text: FilterValue = "active".into();
/// let number: FilterValue = 42_i64.into();
/// assert_eq!(text.to_string(), "active");
/// assert_eq!(number.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean value
    Boolean(bool),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// String value
    String(String),
}

impl FilterValue {
    /// Reinterpret a string value as a number or boolean when it parses as one
    ///
    /// Used by typed backends that cannot compare text with numeric columns.
    #[must_use]
    pub fn coerced(&self) -> FilterValue {
        match self {
            Self::String(s) => {
                let trimmed = s.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    Self::Integer(n)
                } else if let Ok(n) = trimmed.parse::<f64>() {
                    if n.is_finite() {
                        Self::Float(n)
                    } else {
                        self.clone()
                    }
                } else if trimmed.eq_ignore_ascii_case("true") {
                    Self::Boolean(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Self::Boolean(false)
                } else {
                    self.clone()
                }
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// A single filter condition
///
/// Single-value operators read `value`; `In`, `NotIn` and `Between` read
/// `values` (`Between` needs two).
///
/// # Example
///
/// ```rust
/// use acton_query::{Filter, FilterOperator};
///
/// let price = Filter::new("price", FilterOperator::GreaterOrEqual, "100");
/// let status = Filter::in_values("status", ["active", "pending"]);
/// let created = Filter::between("created_at", "2024-01-01", "2024-12-31");
/// assert_eq!(status.values.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// The field name to filter on
    pub field: String,
    /// The comparison operator
    #[serde(alias = "op")]
    pub operator: FilterOperator,
    /// Operand for single-value operators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
    /// Operands for `in`, `not_in` and `between`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<FilterValue>,
}

impl Filter {
    /// Create a single-value filter
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
            values: Vec::new(),
        }
    }

    /// Create a filter that carries a list of operands
    pub fn with_values<I, V>(field: impl Into<String>, operator: FilterOperator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Self {
            field: field.into(),
            operator,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value)
    }

    /// Membership filter (field IN values)
    pub fn in_values<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Self::with_values(field, FilterOperator::In, values)
    }

    /// Inclusive range filter (field BETWEEN low AND high)
    pub fn between(
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Between,
            value: None,
            values: vec![low.into(), high.into()],
        }
    }

    /// Null check (field IS NULL)
    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::IsNull,
            value: None,
            values: Vec::new(),
        }
    }

    /// Bracket-syntax query key for this filter: `field[op]`
    #[must_use]
    pub fn param_key(&self) -> String {
        format!("{}[{}]", self.field, self.operator)
    }
}

/// Decoded pagination position
///
/// A cursor is only meaningful against the sort order that produced it; the
/// engine does not check this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorToken {
    /// Id of the row the cursor points at
    pub id: i64,
    /// Creation timestamp of that row, when the resource tracks one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Value of the primary sort key of that row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_value: Option<String>,
}

impl CursorToken {
    /// Cursor that only records an id
    #[must_use]
    pub fn from_id(id: i64) -> Self {
        Self {
            id,
            created_at: None,
            sort_value: None,
        }
    }
}

/// Structured list request
///
/// Produced by [`crate::parser::parse`] or assembled directly with the
/// `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Pagination strategy
    #[serde(default)]
    pub mode: PaginationMode,
    /// Page number (1-indexed, offset mode)
    pub page: u32,
    /// Requested page size; clamped when the query is built
    pub page_size: u32,
    /// Cursor to continue from (cursor mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Alias of `cursor` for Relay-style clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Backward cursor, carried for clients but not used to build queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Relay-style page size for forward pagination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<u32>,
    /// Relay-style page size for backward pagination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<u32>,
    /// Requested ordering; empty means the resource default applies
    #[serde(default)]
    pub sort: Vec<SortField>,
    /// Requested filters
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Free-text search term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Columns to search instead of the resource's searchable columns
    #[serde(default)]
    pub search_fields: Vec<String>,
    /// Whether cursor-mode responses should also report a total
    #[serde(default)]
    pub include_total: bool,
    /// Request path used when building navigation links
    #[serde(default)]
    pub base_url: String,
    /// Criteria parameters exactly as the client sent them
    #[serde(skip)]
    pub criteria_params: Vec<(String, String)>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            mode: PaginationMode::Offset,
            page: 1,
            page_size: QueryConfig::DEFAULT_PAGE_SIZE,
            cursor: None,
            after: None,
            before: None,
            first: None,
            last: None,
            sort: Vec::new(),
            filters: Vec::new(),
            search: None,
            search_fields: Vec::new(),
            include_total: false,
            base_url: String::new(),
            criteria_params: Vec::new(),
        }
    }
}

impl QueryRequest {
    /// Create a request with default pagination
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pagination mode
    #[must_use]
    pub fn with_mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the page number
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Switch to cursor mode and continue from `cursor`
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.mode = PaginationMode::Cursor;
        self.cursor = Some(cursor.into());
        self
    }

    /// Append a sort field
    #[must_use]
    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    /// Append a filter
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the search term
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Set the path used for navigation links
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Page number with the 1-indexed floor applied
    #[must_use]
    pub fn page_number(&self) -> u32 {
        self.page.max(1)
    }

    /// Non-empty search term, if any
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    /// Cursor to continue from: `cursor`, falling back to `after`
    #[must_use]
    pub fn current_cursor(&self) -> Option<&str> {
        self.cursor
            .as_deref()
            .filter(|c| !c.is_empty())
            .or_else(|| self.after.as_deref().filter(|c| !c.is_empty()))
    }

    /// Query parameters that must survive navigation (sort, filters, search)
    ///
    /// Returns the client's own parameters when the request was parsed, or a
    /// bracket-syntax rendering of the structured criteria otherwise.
    #[must_use]
    pub fn navigation_params(&self) -> Vec<(String, String)> {
        if !self.criteria_params.is_empty() {
            return self.criteria_params.clone();
        }

        let mut params = Vec::new();
        if !self.sort.is_empty() {
            let sort = self
                .sort
                .iter()
                .map(SortField::to_param)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("sort".to_string(), sort));
        }
        for filter in &self.filters {
            let key = filter.param_key();
            if filter.operator.is_multi_valued() {
                for value in &filter.values {
                    params.push((key.clone(), value.to_string()));
                }
            } else {
                let value = filter
                    .value
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "true".to_string());
                params.push((key, value));
            }
        }
        if let Some(search) = self.search_term() {
            params.push(("search".to_string(), search.to_string()));
            for field in &self.search_fields {
                params.push(("search_fields".to_string(), field.clone()));
            }
        }
        params
    }
}
