//! Query building against a queryable store
//!
//! A [`QueryBuilder`] holds one resource's settings: which fields may be
//! filtered and sorted, which columns free-text search covers and the default
//! ordering. [`QueryBuilder::build`] turns a [`QueryRequest`] into two
//! descriptors sharing one predicate set:
//!
//! - `count`: filters and search only
//! - `data`: filters, search, ordering and pagination
//!
//! Fields outside a non-empty whitelist never reach a descriptor. An empty
//! whitelist permits every field, which suits trusted internal call sites.
//!
//! # Example
//!
//! ```rust
//! use acton_query::{Filter, QueryBuilder, QueryRequest, SortField};
//!
//! let builder = QueryBuilder::default()
//!     .with_filter_fields(["status", "price"])
//!     .with_sort_fields(["name", "created_at"])
//!     .with_searchable_columns(["name", "sku"])
//!     .with_default_sort([SortField::desc("created_at")]);
//!
//! let request = QueryRequest::new()
//!     .with_page(2)
//!     .with_page_size(10)
//!     .with_filter(Filter::eq("status", "active"))
//!     .with_filter(Filter::eq("password_hash", "x"));
//!
//! let built = builder.build(&request);
//! assert_eq!(built.data.predicates.len(), 1);
//! assert_eq!(built.data.limit, Some(10));
//! assert_eq!(built.data.offset, Some(10));
//! assert!(built.count.order.is_empty());
//! ```

use std::collections::HashSet;

use crate::config::QueryConfig;
use crate::cursor;
use crate::model::{Filter, FilterOperator, FilterValue, PaginationMode, QueryRequest, SortField};
use crate::response::{QueryResult, ResponseBuilder};
use crate::store::{
    BuiltQuery, Comparison, Identifiable, Predicate, QueryDescriptor, QueryableStore,
};

/// Per-resource query settings
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: QueryConfig,
    allowed_filter_fields: HashSet<String>,
    allowed_sort_fields: HashSet<String>,
    searchable_columns: Vec<String>,
    default_sort: Vec<SortField>,
    id_column: String,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryBuilder {
    /// Create a builder with no whitelists, no search columns and no default sort
    #[must_use]
    pub fn new(config: QueryConfig) -> Self {
        Self {
            config: config.normalized(),
            allowed_filter_fields: HashSet::new(),
            allowed_sort_fields: HashSet::new(),
            searchable_columns: Vec::new(),
            default_sort: Vec::new(),
            id_column: "id".to_string(),
        }
    }

    /// Restrict filtering to these fields
    #[must_use]
    pub fn with_filter_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.allowed_filter_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict sorting to these fields
    #[must_use]
    pub fn with_sort_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.allowed_sort_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Columns searched when the request does not name its own
    #[must_use]
    pub fn with_searchable_columns<I, F>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.searchable_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Ordering used when the request carries none
    #[must_use]
    pub fn with_default_sort<I>(mut self, sort: I) -> Self
    where
        I: IntoIterator<Item = SortField>,
    {
        self.default_sort = sort.into_iter().collect();
        self
    }

    /// Column compared against the cursor id (default `id`)
    #[must_use]
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Page-size limits in effect
    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Page size after clamping into the configured range
    #[must_use]
    pub fn page_size(&self, request: &QueryRequest) -> u32 {
        self.config.effective_page_size(request.page_size)
    }

    /// Build the count and data descriptors for `request`
    #[must_use]
    pub fn build(&self, request: &QueryRequest) -> BuiltQuery {
        let mut predicates = self.filter_predicates(&request.filters);
        if let Some(search) = self.search_predicate(request) {
            predicates.push(search);
        }

        let count = QueryDescriptor {
            predicates: predicates.clone(),
            ..QueryDescriptor::default()
        };

        let limit = u64::from(self.page_size(request));
        let mut data = QueryDescriptor {
            predicates,
            order: self.ordering(request),
            limit: Some(limit),
            offset: None,
        };

        match request.mode {
            PaginationMode::Offset => {
                data.offset = Some(u64::from(request.page_number() - 1) * limit);
            }
            PaginationMode::Cursor => {
                if let Some(id) = self.cursor_position(request) {
                    data.predicates.push(Predicate::Compare {
                        field: self.id_column.clone(),
                        op: Comparison::GreaterThan,
                        value: FilterValue::Integer(id),
                    });
                }
            }
        }

        tracing::trace!(
            mode = %request.mode,
            predicates = data.predicates.len(),
            order = data.order.len(),
            limit = ?data.limit,
            offset = ?data.offset,
            "Built list query"
        );

        BuiltQuery { count, data }
    }

    /// Build, run both descriptors against `store` and assemble the response
    ///
    /// The count query is skipped in cursor mode unless the request asks for
    /// a total.
    ///
    /// # Errors
    ///
    /// Propagates the store's execution error.
    pub async fn execute<S>(
        &self,
        store: S,
        request: &QueryRequest,
    ) -> Result<QueryResult<S::Item>, S::Error>
    where
        S: QueryableStore + Clone,
        S::Item: Identifiable,
    {
        let built = self.build(request);

        let total = if request.mode == PaginationMode::Offset || request.include_total {
            built.count.apply(store.clone()).count().await?
        } else {
            0
        };

        let data = built.data.apply(store).find().await?;
        let first_id = data.first().map_or(0, Identifiable::id);
        let last_id = data.last().map_or(0, Identifiable::id);
        let result_count = data.len() as u64;

        Ok(ResponseBuilder::new(self.config.clone()).build(
            data,
            request,
            total,
            result_count,
            first_id,
            last_id,
        ))
    }

    fn filter_predicates(&self, filters: &[Filter]) -> Vec<Predicate> {
        if self.allowed_filter_fields.is_empty() && !filters.is_empty() {
            tracing::debug!("No filter whitelist configured, permitting all fields");
        }

        filters
            .iter()
            .filter(|filter| {
                let allowed = permits(&self.allowed_filter_fields, &filter.field);
                if !allowed {
                    tracing::debug!(field = %filter.field, "Dropping filter on non-whitelisted field");
                }
                allowed
            })
            .filter_map(|filter| {
                let predicate = filter_predicate(filter);
                if predicate.is_none() {
                    tracing::debug!(
                        field = %filter.field,
                        operator = %filter.operator,
                        "Skipping filter that cannot be applied"
                    );
                }
                predicate
            })
            .collect()
    }

    fn search_predicate(&self, request: &QueryRequest) -> Option<Predicate> {
        let term = request.search_term()?;
        let columns = self.search_columns(request);
        if columns.is_empty() {
            tracing::debug!("Search term given but no searchable columns resolved");
            return None;
        }

        let pattern = format!("%{term}%");
        Some(Predicate::Any(
            columns
                .into_iter()
                .map(|column| Predicate::Like {
                    field: column.to_string(),
                    pattern: pattern.clone(),
                    case_insensitive: true,
                })
                .collect(),
        ))
    }

    /// Request search fields that pass the whitelist, else the configured columns
    fn search_columns<'a>(&'a self, request: &'a QueryRequest) -> Vec<&'a str> {
        let requested: Vec<&str> = request
            .search_fields
            .iter()
            .map(String::as_str)
            .filter(|field| {
                self.searchable_columns.iter().any(|column| column == field)
                    || permits(&self.allowed_filter_fields, field)
            })
            .collect();

        if requested.is_empty() {
            self.searchable_columns.iter().map(String::as_str).collect()
        } else {
            requested
        }
    }

    fn ordering(&self, request: &QueryRequest) -> Vec<SortField> {
        let requested = if request.sort.is_empty() {
            &self.default_sort
        } else {
            &request.sort
        };

        requested
            .iter()
            .filter(|sort| {
                let allowed = permits(&self.allowed_sort_fields, &sort.field);
                if !allowed {
                    tracing::debug!(field = %sort.field, "Dropping sort on non-whitelisted field");
                }
                allowed
            })
            .cloned()
            .collect()
    }

    fn cursor_position(&self, request: &QueryRequest) -> Option<i64> {
        let token = request.current_cursor()?;
        match cursor::decode(token) {
            Ok(position) => Some(position.id),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed cursor, starting from the beginning");
                None
            }
        }
    }
}

fn permits(whitelist: &HashSet<String>, field: &str) -> bool {
    whitelist.is_empty() || whitelist.contains(field)
}

/// Translate one filter, or `None` when it cannot be applied
fn filter_predicate(filter: &Filter) -> Option<Predicate> {
    let field = filter.field.clone();
    let predicate = match &filter.operator {
        FilterOperator::Equal => compare(filter, Comparison::Equal)?,
        FilterOperator::NotEqual => compare(filter, Comparison::NotEqual)?,
        FilterOperator::GreaterThan => compare(filter, Comparison::GreaterThan)?,
        FilterOperator::GreaterOrEqual => compare(filter, Comparison::GreaterOrEqual)?,
        FilterOperator::LessThan => compare(filter, Comparison::LessThan)?,
        FilterOperator::LessOrEqual => compare(filter, Comparison::LessOrEqual)?,
        FilterOperator::Like | FilterOperator::CaseInsensitiveLike => Predicate::Like {
            field,
            pattern: format!("%{}%", filter.value.as_ref()?),
            case_insensitive: filter.operator == FilterOperator::CaseInsensitiveLike,
        },
        FilterOperator::In | FilterOperator::NotIn => Predicate::In {
            field,
            values: filter.values.clone(),
            negated: filter.operator == FilterOperator::NotIn,
        },
        FilterOperator::IsNull | FilterOperator::IsNotNull => Predicate::Null {
            field,
            negated: filter.operator == FilterOperator::IsNotNull,
        },
        FilterOperator::Between => match filter.values.as_slice() {
            [low, high, ..] => Predicate::Between {
                field,
                low: low.clone(),
                high: high.clone(),
            },
            _ => return None,
        },
        FilterOperator::Unknown(_) => return None,
    };
    Some(predicate)
}

fn compare(filter: &Filter, op: Comparison) -> Option<Predicate> {
    Some(Predicate::Compare {
        field: filter.field.clone(),
        op,
        value: filter.value.clone()?,
    })
}
