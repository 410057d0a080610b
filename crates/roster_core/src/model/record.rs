//! Record contract shared by every persisted table.
//!
//! # Responsibility
//! - Describe a table (name, id column, data columns) so the generic store
//!   and query builder can render parameterized SQL for it.
//! - Own input validation that must pass before any store contact.
//!
//! # Invariants
//! - `id()` is `None` until the first persist and immutable afterwards.
//! - `values()` yields one value per entry of `COLUMNS`, in the same order.
//! - Column names in `COLUMNS` are static identifiers, never caller input.

use crate::error::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque store-assigned identifier.
pub type RecordId = i64;

/// Input validation failures raised before SQL execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty or whitespace only.
    BlankField(&'static str),
    /// Numeric field is outside its allowed range.
    OutOfRange { field: &'static str, message: String },
    /// Operation needs a persisted identifier but the record has none.
    MissingId(&'static str),
    /// Referenced parent record has not been persisted yet.
    UnsavedReference(&'static str),
    /// Filter, sort or mutation names a column the table does not have.
    UnknownField { table: &'static str, field: String },
    /// Mutation targets a column that cannot change after insert.
    ReadOnlyField(String),
    /// Mutation would null out a required column.
    RequiredField(String),
    /// Arithmetic mutation targets a column that does not hold integers.
    NonIntegerField { table: &'static str, field: String },
    /// Named query lookup failed.
    UnknownQuery(String),
    /// Named query template is malformed.
    InvalidTemplate { query: String, message: String },
    /// Named query call did not supply a declared parameter.
    MissingParameter { query: String, parameter: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::OutOfRange { field, message } => write!(f, "`{field}` out of range: {message}"),
            Self::MissingId(table) => write!(f, "{table} record has no identifier"),
            Self::UnsavedReference(relation) => {
                write!(f, "referenced {relation} must be saved before linking")
            }
            Self::UnknownField { table, field } => {
                write!(f, "unknown field `{field}` for table `{table}`")
            }
            Self::ReadOnlyField(field) => write!(f, "field `{field}` is read-only"),
            Self::RequiredField(field) => write!(f, "field `{field}` must not be null"),
            Self::NonIntegerField { table, field } => {
                write!(f, "field `{field}` of table `{table}` is not an integer column")
            }
            Self::UnknownQuery(name) => write!(f, "unknown named query `{name}`"),
            Self::InvalidTemplate { query, message } => {
                write!(f, "invalid template for named query `{query}`: {message}")
            }
            Self::MissingParameter { query, parameter } => {
                write!(f, "named query `{query}` requires parameter `:{parameter}`")
            }
        }
    }
}

impl Error for ValidationError {}

/// Table mapping for a persisted record type.
pub trait Record: Clone + 'static {
    /// Backing table name.
    const TABLE: &'static str;
    /// Primary key column (`INTEGER PRIMARY KEY AUTOINCREMENT`).
    const ID_COLUMN: &'static str;
    /// Data columns in insert/update order, excluding the id.
    const COLUMNS: &'static [&'static str];
    /// Data columns declared `NOT NULL`.
    const REQUIRED: &'static [&'static str];
    /// Data columns holding integers; only these accept increments.
    const INTEGER_COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<RecordId>;

    /// Returns the record with its identifier assigned.
    fn with_id(self, id: RecordId) -> Self;

    /// Returns the record as an unsaved copy.
    fn without_id(self) -> Self;

    /// Checks field-level invariants.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Bind values for `COLUMNS`, in order.
    fn values(&self) -> Vec<Value>;

    /// Decodes one row selected with `ID_COLUMN` and `COLUMNS` as names.
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Returns whether `field` is the id or one of the data columns.
    fn has_column(field: &str) -> bool {
        field == Self::ID_COLUMN || Self::COLUMNS.contains(&field)
    }

    fn is_integer_column(field: &str) -> bool {
        Self::INTEGER_COLUMNS.contains(&field)
    }
}
