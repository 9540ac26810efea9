//! Store capability consumed by the query builder
//!
//! The engine never talks to a database directly. It produces
//! [`QueryDescriptor`]s, and a descriptor is applied to anything implementing
//! [`QueryableStore`]: a chain of `and_where`, `order`, `limit` and `offset`
//! calls followed by a terminal `count` or `find`.
//!
//! # Adapters
//!
//! - [`MemoryStore`]: in-memory rows, for tests and small fixed datasets
//! - `SqlStore` (feature `database`): PostgreSQL via `sqlx::QueryBuilder`
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_query::store::{QueryableStore, QueryDescriptor};
//!
//! let built = builder.build(&request);
//! let total = built.count.apply(store.clone()).count().await?;
//! let rows = built.data.apply(store).find().await?;
//! ```

mod memory;
#[cfg(feature = "database")]
mod sql;

use std::future::Future;

use crate::model::{FilterValue, SortDirection, SortField};

pub use memory::{MemoryStore, Record};
#[cfg(feature = "database")]
pub use sql::{quote_identifier, ColumnType, SqlQuery, SqlStore};

/// Binary comparison used by [`Predicate::Compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// =
    Equal,
    /// !=
    NotEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterOrEqual,
    /// <
    LessThan,
    /// <=
    LessOrEqual,
}

impl Comparison {
    /// SQL operator for this comparison
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
        }
    }
}

/// One WHERE condition, already checked against the resource's whitelists
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field <op> value`
    Compare {
        field: String,
        op: Comparison,
        value: FilterValue,
    },
    /// `field LIKE pattern`, optionally with both sides case-folded
    Like {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// `field [NOT] IN (values)`
    In {
        field: String,
        values: Vec<FilterValue>,
        negated: bool,
    },
    /// `field IS [NOT] NULL`
    Null { field: String, negated: bool },
    /// `field BETWEEN low AND high`
    Between {
        field: String,
        low: FilterValue,
        high: FilterValue,
    },
    /// OR of the inner predicates
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Column names this predicate reads
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Compare { field, .. }
            | Self::Like { field, .. }
            | Self::In { field, .. }
            | Self::Null { field, .. }
            | Self::Between { field, .. } => vec![field.as_str()],
            Self::Any(inner) => inner.iter().flat_map(Predicate::fields).collect(),
        }
    }
}

/// A composable set of clauses to apply to a store
///
/// The count descriptor carries predicates only; the data descriptor adds
/// ordering and pagination on top of the same predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    /// Conditions, AND-ed together
    pub predicates: Vec<Predicate>,
    /// ORDER BY keys, primary first
    pub order: Vec<SortField>,
    /// Maximum number of rows
    pub limit: Option<u64>,
    /// Rows to skip
    pub offset: Option<u64>,
}

impl QueryDescriptor {
    /// Apply every clause to `store`, in WHERE, ORDER, LIMIT, OFFSET order
    pub fn apply<S: QueryableStore>(&self, store: S) -> S {
        let store = self
            .predicates
            .iter()
            .fold(store, |store, predicate| store.and_where(predicate));
        let store = self
            .order
            .iter()
            .fold(store, |store, sort| store.order(&sort.field, sort.direction));
        let store = match self.limit {
            Some(limit) => store.limit(limit),
            None => store,
        };
        match self.offset {
            Some(offset) => store.offset(offset),
            None => store,
        }
    }

    /// Whether any predicate reads `field`
    #[must_use]
    pub fn references(&self, field: &str) -> bool {
        self.predicates
            .iter()
            .any(|predicate| predicate.fields().contains(&field))
            || self.order.iter().any(|sort| sort.field == field)
    }
}

/// Count and data descriptors built from one request
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    /// Filters and search only, for the total
    pub count: QueryDescriptor,
    /// Filters, search, ordering and pagination
    pub data: QueryDescriptor,
}

/// Queryable store capability
///
/// Builder methods consume and return the store so adapters can accumulate
/// clauses without interior mutability. Terminal methods use RPITIT for
/// async execution without requiring `async_trait`.
pub trait QueryableStore: Sized + Send {
    /// Row type returned by [`find`](Self::find)
    type Item: Send;
    /// Adapter-specific execution error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Add a condition (AND-ed with previous ones)
    fn and_where(self, predicate: &Predicate) -> Self;

    /// Add an ORDER BY key after previous ones
    fn order(self, field: &str, direction: SortDirection) -> Self;

    /// Limit the number of rows
    fn limit(self, limit: u64) -> Self;

    /// Skip rows
    fn offset(self, offset: u64) -> Self;

    /// Count rows matching the conditions
    fn count(self) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Fetch rows
    fn find(self) -> impl Future<Output = Result<Vec<Self::Item>, Self::Error>> + Send;
}

/// Rows with an integer id usable as a cursor position
pub trait Identifiable {
    /// Row id
    fn id(&self) -> i64;
}
