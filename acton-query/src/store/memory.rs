//! In-memory store adapter
//!
//! Evaluates descriptors against a shared `Vec` of rows. Comparison follows
//! SQL conventions closely enough for tests and small fixed datasets: a
//! missing field behaves like NULL (no comparison matches it), and NULLs sort
//! last ascending and first descending.
//!
//! Sorting uses a total order: booleans before numbers before text, NaN after
//! every other number, and integers compared exactly against floats.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::sync::Arc;

use super::{Comparison, Predicate, QueryableStore};
use crate::model::{FilterValue, SortDirection};

/// Rows that expose their columns by name
///
/// # Example
///
/// ```rust
/// use acton_query::store::Record;
/// use acton_query::FilterValue;
///
/// #[derive(Clone)]
/// struct Product { id: i64, name: String, price: Option<f64> }
///
/// impl Record for Product {
///     fn field(&self, name: &str) -> Option<FilterValue> {
///         match name {
///             "id" => Some(self.id.into()),
///             "name" => Some(self.name.clone().into()),
///             "price" => self.price.map(Into::into),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record {
    /// Value of column `name`; `None` for NULL or unknown columns
    fn field(&self, name: &str) -> Option<FilterValue>;
}

/// In-memory [`QueryableStore`]
pub struct MemoryStore<T> {
    rows: Arc<Vec<T>>,
    predicates: Vec<Predicate>,
    order: Vec<(String, SortDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            predicates: self.predicates.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<T> MemoryStore<T> {
    /// Create a store over `rows`
    #[must_use]
    pub fn new(rows: Vec<T>) -> Self {
        Self::from_shared(Arc::new(rows))
    }

    /// Create a store over rows shared with other stores
    #[must_use]
    pub fn from_shared(rows: Arc<Vec<T>>) -> Self {
        Self {
            rows,
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

impl<T: Record> MemoryStore<T> {
    fn matching(&self) -> impl Iterator<Item = &T> {
        self.rows
            .iter()
            .filter(|row| self.predicates.iter().all(|p| matches(*row, p)))
    }

    fn sorted(&self) -> Vec<&T> {
        let mut rows: Vec<&T> = self.matching().collect();
        rows.sort_by(|a, b| self.compare_rows(a, b));
        rows
    }

    fn compare_rows(&self, a: &T, b: &T) -> Ordering {
        self.order
            .iter()
            .map(|(field, direction)| {
                let ordering = compare_nullable(&a.field(field), &b.field(field));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl<T> QueryableStore for MemoryStore<T>
where
    T: Record + Clone + Send + Sync,
{
    type Item = T;
    type Error = Infallible;

    fn and_where(mut self, predicate: &Predicate) -> Self {
        self.predicates.push(predicate.clone());
        self
    }

    fn order(mut self, field: &str, direction: SortDirection) -> Self {
        self.order.push((field.to_string(), direction));
        self
    }

    fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    async fn count(self) -> Result<u64, Self::Error> {
        Ok(self.matching().count() as u64)
    }

    async fn find(self) -> Result<Vec<T>, Self::Error> {
        let rows = self.sorted();
        let offset = usize::try_from(self.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        Ok(rows.into_iter().skip(offset).take(limit).cloned().collect())
    }
}

fn matches<T: Record>(row: &T, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Compare { field, op, value } => row
            .field(field)
            .and_then(|actual| compare_values(&actual, value))
            .is_some_and(|ordering| comparison_holds(*op, ordering)),
        Predicate::Like {
            field,
            pattern,
            case_insensitive,
        } => row.field(field).is_some_and(|actual| {
            let text = actual.to_string();
            if *case_insensitive {
                like_match(&text.to_lowercase(), &pattern.to_lowercase())
            } else {
                like_match(&text, pattern)
            }
        }),
        Predicate::In {
            field,
            values,
            negated,
        } => row.field(field).is_some_and(|actual| {
            let found = values
                .iter()
                .any(|v| compare_values(&actual, v) == Some(Ordering::Equal));
            found != *negated
        }),
        Predicate::Null { field, negated } => row.field(field).is_none() != *negated,
        Predicate::Between { field, low, high } => row.field(field).is_some_and(|actual| {
            compare_values(&actual, low).is_some_and(Ordering::is_ge)
                && compare_values(&actual, high).is_some_and(Ordering::is_le)
        }),
        Predicate::Any(inner) => inner.iter().any(|p| matches(row, p)),
    }
}

fn comparison_holds(op: Comparison, ordering: Ordering) -> bool {
    match op {
        Comparison::Equal => ordering.is_eq(),
        Comparison::NotEqual => ordering.is_ne(),
        Comparison::GreaterThan => ordering.is_gt(),
        Comparison::GreaterOrEqual => ordering.is_ge(),
        Comparison::LessThan => ordering.is_lt(),
        Comparison::LessOrEqual => ordering.is_le(),
    }
}

/// Compare a stored value with an operand, coercing string operands to the
/// stored value's type
fn compare_values(actual: &FilterValue, operand: &FilterValue) -> Option<Ordering> {
    use FilterValue::{Boolean, Float, Integer, String};

    match (actual, operand) {
        (Integer(a), Integer(b)) => Some(a.cmp(b)),
        (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
        (String(a), String(b)) => Some(a.cmp(b)),
        (String(a), other) => Some(a.as_str().cmp(other.to_string().as_str())),
        (_, String(_)) => match operand.coerced() {
            String(_) => None,
            coerced => compare_values(actual, &coerced),
        },
        _ => None,
    }
}

/// Total order over stored values, used for sorting
fn sort_cmp(a: &FilterValue, b: &FilterValue) -> Ordering {
    use FilterValue::{Boolean, Float, Integer, String};

    fn rank(value: &FilterValue) -> u8 {
        match value {
            Boolean(_) => 0,
            Integer(_) | Float(_) => 1,
            String(_) => 2,
        }
    }

    match (a, b) {
        (Boolean(a), Boolean(b)) => a.cmp(b),
        (Integer(a), Integer(b)) => a.cmp(b),
        (Float(a), Float(b)) => float_cmp(*a, *b),
        (Integer(a), Float(b)) => int_float_cmp(*a, *b),
        (Float(a), Integer(b)) => int_float_cmp(*b, *a).reverse(),
        (String(a), String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// NaN sorts after every number and equal to itself
fn float_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison without rounding `i` through `f64`
fn int_float_cmp(i: i64, f: f64) -> Ordering {
    // 2^63, the first float above every i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() || f >= LIMIT {
        return Ordering::Less;
    }
    if f < -LIMIT {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    #[allow(clippy::cast_possible_truncation)]
    let truncated = whole as i64;
    i.cmp(&truncated).then_with(|| 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal))
}

fn compare_nullable(a: &Option<FilterValue>, b: &Option<FilterValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => sort_cmp(a, b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, resume)) = backtrack {
            p = star + 1;
            t = resume + 1;
            backtrack = Some((star, resume + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}
