//! PostgreSQL store adapter
//!
//! Renders descriptors into a `sqlx::QueryBuilder<Postgres>`. Every operand is
//! a bound parameter and every identifier is double-quoted, so neither values
//! nor column names can inject SQL even when a resource permits all fields.
//!
//! Query-string operands arrive as text. They are converted only for columns
//! declared with [`SqlStore::with_column_type`]; undeclared columns bind text
//! unchanged, so `zip[eq]=02134` keeps its leading zero.

use std::collections::HashMap;
use std::marker::PhantomData;

use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};

use super::{Predicate, QueryableStore};
use crate::model::{FilterValue, SortDirection};

/// Quote an identifier, handling `schema.table` and `table.column` forms
///
/// # Example
///
/// ```rust
/// use acton_query::store::quote_identifier;
///
/// assert_eq!(quote_identifier("created_at"), "\"created_at\"");
/// assert_eq!(quote_identifier("p.name"), "\"p\".\"name\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Declared PostgreSQL type family of a column
///
/// Decides how text operands are bound. Operands that are already typed
/// (from JSON filters or cursors) keep their own type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    /// Bind text as text
    #[default]
    Text,
    /// `smallint`, `integer`, `bigint`
    Integer,
    /// `real`, `double precision`, `numeric`
    Float,
    /// `boolean`
    Boolean,
}

impl ColumnType {
    /// Operand to bind against a column of this type
    ///
    /// Text that does not parse as the column's type is bound unchanged and
    /// left for the database to reject.
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_query::store::ColumnType;
    /// use acton_query::FilterValue;
    ///
    /// let zip = FilterValue::from("02134");
    /// assert_eq!(ColumnType::Text.bind_value(&zip), zip);
    /// assert_eq!(ColumnType::Integer.bind_value(&zip), FilterValue::Integer(2134));
    /// ```
    #[must_use]
    pub fn bind_value(self, value: &FilterValue) -> FilterValue {
        let FilterValue::String(raw) = value else {
            return value.clone();
        };
        let trimmed = raw.trim();
        match self {
            Self::Text => value.clone(),
            Self::Integer => trimmed
                .parse::<i64>()
                .map(FilterValue::Integer)
                .or_else(|_| trimmed.parse::<f64>().map(FilterValue::Float))
                .unwrap_or_else(|_| value.clone()),
            Self::Float => trimmed
                .parse::<f64>()
                .map(FilterValue::Float)
                .unwrap_or_else(|_| value.clone()),
            Self::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => FilterValue::Boolean(true),
                "false" | "f" | "0" => FilterValue::Boolean(false),
                _ => value.clone(),
            },
        }
    }
}

/// Accumulated clauses for one table, independent of any connection
#[derive(Debug, Clone)]
pub struct SqlQuery {
    table: String,
    columns: String,
    column_types: HashMap<String, ColumnType>,
    predicates: Vec<Predicate>,
    order: Vec<(String, SortDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// A builder together with the operands bound into it, in placeholder order
struct Rendered {
    qb: QueryBuilder<'static, Postgres>,
    binds: Vec<FilterValue>,
}

impl Rendered {
    fn new(sql: String) -> Self {
        Self {
            qb: QueryBuilder::new(sql),
            binds: Vec::new(),
        }
    }

    fn sql(&mut self, fragment: impl std::fmt::Display) -> &mut Self {
        self.qb.push(fragment);
        self
    }

    fn bind(&mut self, value: FilterValue) -> &mut Self {
        match &value {
            FilterValue::Boolean(b) => self.qb.push_bind(*b),
            FilterValue::Integer(n) => self.qb.push_bind(*n),
            FilterValue::Float(n) => self.qb.push_bind(*n),
            FilterValue::String(s) => self.qb.push_bind(s.clone()),
        };
        self.binds.push(value);
        self
    }
}

impl SqlQuery {
    /// Select all columns from `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            column_types: HashMap::new(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Select an explicit column list instead of `*`
    ///
    /// The list is emitted verbatim; it comes from code, never from clients.
    #[must_use]
    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    /// Declare the type of `column`; undeclared columns are [`ColumnType::Text`]
    #[must_use]
    pub fn with_column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.insert(column.into(), column_type);
        self
    }

    fn column_type(&self, column: &str) -> ColumnType {
        self.column_types.get(column).copied().unwrap_or_default()
    }

    fn push_where(&mut self, predicate: &Predicate) {
        self.predicates.push(predicate.clone());
    }

    /// `SELECT COUNT(*)` over the predicates, ignoring order and pagination
    #[must_use]
    pub fn count_builder(&self) -> QueryBuilder<'static, Postgres> {
        self.render_count().qb
    }

    /// Full `SELECT` with predicates, ordering and pagination
    #[must_use]
    pub fn select_builder(&self) -> QueryBuilder<'static, Postgres> {
        self.render_select().qb
    }

    fn render_count(&self) -> Rendered {
        let mut out = Rendered::new(format!(
            "SELECT COUNT(*) FROM {}",
            quote_identifier(&self.table)
        ));
        self.push_where_clause(&mut out);
        out
    }

    fn render_select(&self) -> Rendered {
        let mut out = Rendered::new(format!(
            "SELECT {} FROM {}",
            self.columns,
            quote_identifier(&self.table)
        ));
        self.push_where_clause(&mut out);

        if !self.order.is_empty() {
            out.sql(" ORDER BY ");
            for (i, (field, direction)) in self.order.iter().enumerate() {
                if i > 0 {
                    out.sql(", ");
                }
                out.sql(quote_identifier(field))
                    .sql(" ")
                    .sql(direction.as_sql());
            }
        }
        if let Some(limit) = self.limit {
            out.sql(" LIMIT ").bind(FilterValue::Integer(to_i64(limit)));
        }
        if let Some(offset) = self.offset {
            out.sql(" OFFSET ").bind(FilterValue::Integer(to_i64(offset)));
        }
        out
    }

    fn push_where_clause(&self, out: &mut Rendered) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            out.sql(if i == 0 { " WHERE " } else { " AND " });
            self.push_predicate(out, predicate);
        }
    }

    fn push_predicate(&self, out: &mut Rendered, predicate: &Predicate) {
        match predicate {
            Predicate::Compare { field, op, value } => {
                let column_type = self.column_type(field);
                out.sql(quote_identifier(field))
                    .sql(" ")
                    .sql(op.as_sql())
                    .sql(" ")
                    .bind(column_type.bind_value(value));
            }
            Predicate::Like {
                field,
                pattern,
                case_insensitive,
            } => {
                let column = format!("CAST({} AS TEXT)", quote_identifier(field));
                let pattern = FilterValue::String(pattern.clone());
                if *case_insensitive {
                    out.sql(format!("LOWER({column}) LIKE LOWER("))
                        .bind(pattern)
                        .sql(")");
                } else {
                    out.sql(format!("{column} LIKE ")).bind(pattern);
                }
            }
            Predicate::In {
                field,
                values,
                negated,
            } => {
                if values.is_empty() {
                    out.sql(if *negated { "TRUE" } else { "FALSE" });
                    return;
                }
                let column_type = self.column_type(field);
                out.sql(quote_identifier(field))
                    .sql(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.sql(", ");
                    }
                    out.bind(column_type.bind_value(value));
                }
                out.sql(")");
            }
            Predicate::Null { field, negated } => {
                out.sql(quote_identifier(field)).sql(if *negated {
                    " IS NOT NULL"
                } else {
                    " IS NULL"
                });
            }
            Predicate::Between { field, low, high } => {
                let column_type = self.column_type(field);
                out.sql(quote_identifier(field))
                    .sql(" BETWEEN ")
                    .bind(column_type.bind_value(low))
                    .sql(" AND ")
                    .bind(column_type.bind_value(high));
            }
            Predicate::Any(inner) => {
                if inner.is_empty() {
                    out.sql("FALSE");
                    return;
                }
                out.sql("(");
                for (i, predicate) in inner.iter().enumerate() {
                    if i > 0 {
                        out.sql(" OR ");
                    }
                    self.push_predicate(out, predicate);
                }
                out.sql(")");
            }
        }
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// PostgreSQL [`QueryableStore`] over one table
///
/// # Example
///
/// ```rust,ignore
/// let store: SqlStore<Product> = SqlStore::new(pool.clone(), "products")
///     .with_column_type("price", ColumnType::Float)
///     .with_column_type("in_stock", ColumnType::Boolean);
/// let result = builder.execute(store, &request).await?;
/// ```
pub struct SqlStore<T> {
    pool: PgPool,
    query: SqlQuery,
    _row: PhantomData<fn() -> T>,
}

impl<T> Clone for SqlStore<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            query: self.query.clone(),
            _row: PhantomData,
        }
    }
}

impl<T> SqlStore<T> {
    /// Create a store reading `table` through `pool`
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            query: SqlQuery::new(table),
            _row: PhantomData,
        }
    }

    /// Select an explicit column list
    #[must_use]
    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.query = self.query.with_columns(columns);
        self
    }

    /// Declare the type of `column` so text operands bind as that type
    #[must_use]
    pub fn with_column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.query = self.query.with_column_type(column, column_type);
        self
    }

    /// Clauses accumulated so far
    #[must_use]
    pub fn query(&self) -> &SqlQuery {
        &self.query
    }
}

impl<T> QueryableStore for SqlStore<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    type Item = T;
    type Error = sqlx::Error;

    fn and_where(mut self, predicate: &Predicate) -> Self {
        self.query.push_where(predicate);
        self
    }

    fn order(mut self, field: &str, direction: SortDirection) -> Self {
        self.query.order.push((field.to_string(), direction));
        self
    }

    fn limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    fn offset(mut self, offset: u64) -> Self {
        self.query.offset = Some(offset);
        self
    }

    async fn count(self) -> Result<u64, Self::Error> {
        let Rendered { mut qb, binds } = self.query.render_count();
        tracing::trace!(sql = qb.sql(), ?binds, "Executing count query");
        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn find(self) -> Result<Vec<T>, Self::Error> {
        let Rendered { mut qb, binds } = self.query.render_select();
        tracing::trace!(sql = qb.sql(), ?binds, "Executing data query");
        qb.build_query_as::<T>().fetch_all(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Comparison;

    fn like(field: &str, pattern: &str, case_insensitive: bool) -> Predicate {
        Predicate::Like {
            field: field.to_string(),
            pattern: pattern.to_string(),
            case_insensitive,
        }
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(
            quote_identifier("name\"; DROP TABLE users; --"),
            "\"name\"\"; DROP TABLE users; --\""
        );
    }

    #[test]
    fn test_select_without_clauses() {
        let query = SqlQuery::new("products");
        assert_eq!(query.select_builder().sql(), "SELECT * FROM \"products\"");
        assert_eq!(
            query.count_builder().sql(),
            "SELECT COUNT(*) FROM \"products\""
        );
    }

    #[test]
    fn test_select_renders_all_clauses() {
        let mut query = SqlQuery::new("products").with_columns("id, name");
        query.push_where(&Predicate::Compare {
            field: "status".to_string(),
            op: Comparison::Equal,
            value: "active".into(),
        });
        query.push_where(&Predicate::Any(vec![
            like("name", "%foo%", true),
            like("sku", "%foo%", true),
        ]));
        query.order.push(("name".to_string(), SortDirection::Desc));
        query.order.push(("id".to_string(), SortDirection::Asc));
        query.limit = Some(10);
        query.offset = Some(10);

        assert_eq!(
            query.select_builder().sql(),
            "SELECT id, name FROM \"products\" WHERE \"status\" = $1 AND \
             (LOWER(CAST(\"name\" AS TEXT)) LIKE LOWER($2) OR \
             LOWER(CAST(\"sku\" AS TEXT)) LIKE LOWER($3)) \
             ORDER BY \"name\" DESC, \"id\" ASC LIMIT $4 OFFSET $5"
        );
        assert_eq!(
            query.count_builder().sql(),
            "SELECT COUNT(*) FROM \"products\" WHERE \"status\" = $1 AND \
             (LOWER(CAST(\"name\" AS TEXT)) LIKE LOWER($2) OR \
             LOWER(CAST(\"sku\" AS TEXT)) LIKE LOWER($3))"
        );
    }

    #[test]
    fn test_membership_null_and_range() {
        let mut query = SqlQuery::new("orders");
        query.push_where(&Predicate::In {
            field: "state".to_string(),
            values: vec!["new".into(), "paid".into()],
            negated: true,
        });
        query.push_where(&Predicate::Null {
            field: "deleted_at".to_string(),
            negated: false,
        });
        query.push_where(&Predicate::Between {
            field: "total".to_string(),
            low: "10".into(),
            high: "20".into(),
        });
        query.push_where(&like("note", "%x%", false));

        assert_eq!(
            query.count_builder().sql(),
            "SELECT COUNT(*) FROM \"orders\" WHERE \"state\" NOT IN ($1, $2) AND \
             \"deleted_at\" IS NULL AND \"total\" BETWEEN $3 AND $4 AND \
             CAST(\"note\" AS TEXT) LIKE $5"
        );
    }

    #[test]
    fn test_empty_membership_is_constant() {
        let mut query = SqlQuery::new("t");
        query.push_where(&Predicate::In {
            field: "a".to_string(),
            values: Vec::new(),
            negated: false,
        });
        query.push_where(&Predicate::In {
            field: "b".to_string(),
            values: Vec::new(),
            negated: true,
        });
        assert_eq!(
            query.count_builder().sql(),
            "SELECT COUNT(*) FROM \"t\" WHERE FALSE AND TRUE"
        );
    }

    fn eq(field: &str, value: FilterValue) -> Predicate {
        Predicate::Compare {
            field: field.to_string(),
            op: Comparison::Equal,
            value,
        }
    }

    #[test]
    fn test_text_operands_bind_unchanged_on_undeclared_columns() {
        let mut query = SqlQuery::new("addresses");
        query.push_where(&eq("zip", "02134".into()));
        query.push_where(&Predicate::In {
            field: "code".to_string(),
            values: vec!["1".into(), "a".into()],
            negated: false,
        });

        assert_eq!(
            query.render_count().binds,
            vec![
                FilterValue::from("02134"),
                FilterValue::from("1"),
                FilterValue::from("a"),
            ]
        );
    }

    #[test]
    fn test_declared_columns_convert_text_operands() {
        let mut query = SqlQuery::new("products")
            .with_column_type("price", ColumnType::Integer)
            .with_column_type("weight", ColumnType::Float)
            .with_column_type("in_stock", ColumnType::Boolean);
        query.push_where(&eq("price", "100".into()));
        query.push_where(&Predicate::Between {
            field: "weight".to_string(),
            low: "0.5".into(),
            high: "2".into(),
        });
        query.push_where(&eq("in_stock", "true".into()));
        query.push_where(&eq("sku", "007".into()));
        query.limit = Some(10);

        assert_eq!(
            query.render_select().binds,
            vec![
                FilterValue::Integer(100),
                FilterValue::Float(0.5),
                FilterValue::Float(2.0),
                FilterValue::Boolean(true),
                FilterValue::from("007"),
                FilterValue::Integer(10),
            ]
        );
    }

    #[test]
    fn test_typed_operands_keep_their_type() {
        let mut query = SqlQuery::new("products").with_column_type("id", ColumnType::Text);
        query.push_where(&Predicate::Compare {
            field: "id".to_string(),
            op: Comparison::Greater,
            value: FilterValue::Integer(42),
        });
        assert_eq!(query.render_count().binds, vec![FilterValue::Integer(42)]);
    }

    #[test]
    fn test_unparseable_text_on_numeric_column_binds_as_text() {
        assert_eq!(
            ColumnType::Integer.bind_value(&"abc".into()),
            FilterValue::from("abc")
        );
        assert_eq!(
            ColumnType::Boolean.bind_value(&"maybe".into()),
            FilterValue::from("maybe")
        );
        assert_eq!(
            ColumnType::Integer.bind_value(&"1.5".into()),
            FilterValue::Float(1.5)
        );
    }
}
