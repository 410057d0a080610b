//! Filter, sort and mutation specifications.
//!
//! # Responsibility
//! - Provide caller-facing data structures describing which records to read
//!   or change, independent of SQL text.
//!
//! # Invariants
//! - Predicates combine with AND semantics, in insertion order.
//! - Field names are plain identifiers; they are checked against the target
//!   table's columns when a plan is built.

use rusqlite::types::Value;

/// Scalar value compared against or written to a column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// Converts into a SQLite bind value.
    pub fn to_sql_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(value) => Value::Integer(*value),
            Self::Real(value) => Value::Real(*value),
            Self::Text(value) => Value::Text(value.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Comparison applied by one predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality; a null value matches `IS NULL`.
    Eq(FieldValue),
    Gt(FieldValue),
    Ge(FieldValue),
    /// Set membership; an empty set matches nothing.
    In(Vec<FieldValue>),
}

/// One `(field, operator, value)` term.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub condition: Condition,
}

/// Ordered AND-combination of predicates. Empty matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.and(field, Condition::Eq(value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.and(field, Condition::Gt(value.into()))
    }

    pub fn ge(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.and(field, Condition::Ge(value.into()))
    }

    pub fn is_in<V: Into<FieldValue>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.and(field, Condition::In(values))
    }

    /// Appends one predicate.
    pub fn and(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            condition,
        });
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// Ordered list of sort keys. Plans always finish with `id ASC`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    /// No caller ordering; results come back by id.
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(direction: Direction, field: impl Into<String>) -> Self {
        Self::unsorted().and(direction, field)
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::by(Direction::Asc, field)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::by(Direction::Desc, field)
    }

    /// Appends a secondary sort key.
    pub fn and(mut self, direction: Direction, field: impl Into<String>) -> Self {
        self.orders.push(Order {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Column change applied by a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Set(FieldValue),
    /// `column = column + delta`; null columns stay null.
    Increment(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub change: Change,
}

/// Set of column changes applied to every matched record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    assignments: Vec<Assignment>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.assignments.push(Assignment {
            field: field.into(),
            change: Change::Set(value.into()),
        });
        self
    }

    pub fn increment(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.assignments.push(Assignment {
            field: field.into(),
            change: Change::Increment(delta),
        });
        self
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Condition, FieldValue, Filter, Mutation, Sort};

    #[test]
    fn filter_keeps_predicate_order() {
        let filter = Filter::new().eq("username", "AAA").gt("age", 15);
        let fields: Vec<&str> = filter
            .predicates()
            .iter()
            .map(|predicate| predicate.field.as_str())
            .collect();
        assert_eq!(fields, ["username", "age"]);
        assert_eq!(
            filter.predicates()[1].condition,
            Condition::Gt(FieldValue::Integer(15))
        );
    }

    #[test]
    fn optional_values_convert_to_null() {
        let value: FieldValue = Option::<i32>::None.into();
        assert!(value.is_null());
        let value: FieldValue = Some("teamA").into();
        assert_eq!(value, FieldValue::Text("teamA".to_string()));
    }

    #[test]
    fn empty_specs_report_empty() {
        assert!(Filter::new().is_empty());
        assert!(Sort::unsorted().is_unsorted());
        assert!(Mutation::new().is_empty());
        assert!(!Mutation::new().increment("age", 1).is_empty());
    }
}
