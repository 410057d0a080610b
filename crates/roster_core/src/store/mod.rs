//! Record store layer.
//!
//! # Responsibility
//! - Own raw single-table CRUD and plan execution against SQLite.
//! - Keep the session identity cache consistent with every write.
//!
//! # Invariants
//! - Write paths validate records before any SQL runs.
//! - Each store call is a single SQL statement unless documented otherwise.

use crate::error::RepoResult;
use crate::query::builder::QueryPlan;
use rusqlite::{params_from_iter, Connection, Row};

pub mod cache;
mod record_store;

pub use record_store::{RecordStore, SqliteRecordStore};

/// Executes `plan` and maps every row with `map_row`.
pub fn query_rows<T>(
    conn: &Connection,
    plan: &QueryPlan,
    mut map_row: impl FnMut(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(plan.sql())?;
    let mut rows = stmt.query(params_from_iter(plan.params()))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(map_row(row)?);
    }
    Ok(items)
}

/// Executes a single-value `COUNT` plan.
pub fn query_count(conn: &Connection, plan: &QueryPlan) -> RepoResult<i64> {
    let total = conn.query_row(plan.sql(), params_from_iter(plan.params()), |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(total)
}

/// Executes a write plan and returns the number of changed rows.
pub fn execute_plan(conn: &Connection, plan: &QueryPlan) -> RepoResult<usize> {
    let changed = conn.execute(plan.sql(), params_from_iter(plan.params()))?;
    Ok(changed)
}
