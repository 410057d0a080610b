//! Generic single-table record store over SQLite.
//!
//! # Responsibility
//! - Provide insert/get/update/delete/count/all for any [`Record`].
//! - Execute builder plans and bulk statements atomically.
//!
//! # Invariants
//! - `insert` assigns a fresh id only when the record has none.
//! - Ids are never reused: explicit ids at or below the table's sequence
//!   are rejected.
//! - `get` misses are `Ok(None)`; `delete` misses are no-ops.
//! - `bulk_update`/`bulk_delete` clear the cached entries of the table.

use super::{execute_plan, query_count, query_rows};
use crate::error::{RepoError, RepoResult};
use crate::model::record::{Record, RecordId, ValidationError};
use crate::query::builder::{QueryBuilder, QueryPlan};
use crate::query::filter::{Filter, Mutation, Sort};
use crate::session::Session;
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, OptionalExtension};
use std::marker::PhantomData;

/// Storage contract for one record type.
pub trait RecordStore<R: Record> {
    /// Persists `record` and returns it with its id assigned.
    fn insert(&self, record: &R) -> RepoResult<R>;
    fn get(&self, id: RecordId) -> RepoResult<Option<R>>;
    /// Overwrites all data columns of an existing row.
    fn update(&self, record: &R) -> RepoResult<()>;
    fn delete(&self, id: RecordId) -> RepoResult<()>;
    fn exists(&self, id: RecordId) -> RepoResult<bool>;
    fn count(&self) -> RepoResult<i64>;
    /// All rows ordered by id.
    fn all(&self) -> RepoResult<Vec<R>>;
    /// Applies `mutation` to every row matching `filter` in one statement.
    fn bulk_update(&self, filter: &Filter, mutation: &Mutation) -> RepoResult<usize>;
    /// Deletes every row matching `filter` in one statement.
    fn bulk_delete(&self, filter: &Filter) -> RepoResult<usize>;
    fn fetch(&self, plan: &QueryPlan) -> RepoResult<Vec<R>>;
    fn fetch_count(&self, plan: &QueryPlan) -> RepoResult<i64>;
}

/// SQLite-backed store bound to a session.
pub struct SqliteRecordStore<'s, R: Record> {
    session: &'s Session,
    builder: QueryBuilder,
    _record: PhantomData<R>,
}

impl<'s, R: Record> SqliteRecordStore<'s, R> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            builder: QueryBuilder::for_record::<R>(),
            _record: PhantomData,
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Executes `plan` without registering results in the identity cache.
    pub fn fetch_detached(&self, plan: &QueryPlan) -> RepoResult<Vec<R>> {
        query_rows(self.session.connection(), plan, R::from_row)
    }

    /// Rejects an explicit id the table's id sequence has already handed out,
    /// whether or not that row still exists.
    fn ensure_unissued(&self, id: RecordId) -> RepoResult<()> {
        let issued = self
            .session
            .connection()
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = ?1;",
                [R::TABLE],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .unwrap_or(0);
        if id <= issued {
            return Err(RepoError::ConstraintViolation(format!(
                "{}#{id} was already issued (sequence at {issued})",
                R::TABLE
            )));
        }
        Ok(())
    }

    /// Runs a no-op write over matching rows, taking the database write lock
    /// for the rest of the enclosing transaction.
    pub fn lock_matching(&self, filter: &Filter) -> RepoResult<usize> {
        let plan = self.builder.lock_plan(filter)?;
        execute_plan(self.session.connection(), &plan)
    }
}

impl<R: Record> RecordStore<R> for SqliteRecordStore<'_, R> {
    fn insert(&self, record: &R) -> RepoResult<R> {
        record.validate()?;
        if let Some(id) = record.id() {
            self.ensure_unissued(id)?;
        }

        let placeholders = (1..=R::COLUMNS.len() + 1)
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES ({placeholders});",
            R::TABLE,
            R::ID_COLUMN,
            R::COLUMNS.join(", ")
        );

        let mut values = Vec::with_capacity(R::COLUMNS.len() + 1);
        values.push(record.id().map_or(Value::Null, Value::Integer));
        values.extend(record.values());

        let conn = self.session.connection();
        conn.execute(&sql, params_from_iter(values))?;

        let id = record.id().unwrap_or_else(|| conn.last_insert_rowid());
        let saved = record.clone().with_id(id);
        self.session.cache().put(&saved);
        debug!(
            "event=record_insert module=store status=ok table={} id={id}",
            R::TABLE
        );
        Ok(saved)
    }

    fn get(&self, id: RecordId) -> RepoResult<Option<R>> {
        if let Some(cached) = self.session.cache().get::<R>(id) {
            return Ok(Some(cached));
        }

        let plan = self.builder.by_id(id);
        let found = query_rows(self.session.connection(), &plan, R::from_row)?
            .into_iter()
            .next();
        if let Some(record) = found.as_ref() {
            self.session.cache().put(record);
        }
        Ok(found)
    }

    fn update(&self, record: &R) -> RepoResult<()> {
        record.validate()?;
        let id = record
            .id()
            .ok_or(ValidationError::MissingId(R::TABLE))?;

        let assignments = R::COLUMNS
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?{};",
            R::TABLE,
            R::ID_COLUMN,
            R::COLUMNS.len() + 1
        );

        let mut values = record.values();
        values.push(Value::Integer(id));

        let changed = self
            .session
            .connection()
            .execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            self.session.cache().evict::<R>(id);
            return Err(RepoError::NotFound {
                table: R::TABLE,
                id,
            });
        }

        self.session.cache().put(record);
        debug!(
            "event=record_update module=store status=ok table={} id={id}",
            R::TABLE
        );
        Ok(())
    }

    fn delete(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.session.connection().execute(
            &format!("DELETE FROM {} WHERE {} = ?1;", R::TABLE, R::ID_COLUMN),
            [id],
        )?;
        self.session.cache().evict::<R>(id);
        debug!(
            "event=record_delete module=store status=ok table={} id={id} changed={changed}",
            R::TABLE
        );
        Ok(())
    }

    fn exists(&self, id: RecordId) -> RepoResult<bool> {
        if self.session.cache().get::<R>(id).is_some() {
            return Ok(true);
        }
        let exists = self.session.connection().query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
                R::TABLE,
                R::ID_COLUMN
            ),
            [id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }

    fn count(&self) -> RepoResult<i64> {
        let plans = self.builder.build(&Filter::new(), &Sort::unsorted())?;
        self.fetch_count(&plans.count)
    }

    fn all(&self) -> RepoResult<Vec<R>> {
        let plans = self.builder.build(&Filter::new(), &Sort::unsorted())?;
        self.fetch(&plans.content)
    }

    fn bulk_update(&self, filter: &Filter, mutation: &Mutation) -> RepoResult<usize> {
        let plan = self.builder.update_plan(filter, mutation)?;
        let affected = execute_plan(self.session.connection(), &plan)?;
        self.session.cache().clear_table(R::TABLE);
        info!(
            "event=bulk_update module=store status=ok table={} affected={affected}",
            R::TABLE
        );
        Ok(affected)
    }

    fn bulk_delete(&self, filter: &Filter) -> RepoResult<usize> {
        let plan = self.builder.delete_plan(filter)?;
        let affected = execute_plan(self.session.connection(), &plan)?;
        self.session.cache().clear_table(R::TABLE);
        info!(
            "event=bulk_delete module=store status=ok table={} affected={affected}",
            R::TABLE
        );
        Ok(affected)
    }

    fn fetch(&self, plan: &QueryPlan) -> RepoResult<Vec<R>> {
        let records = self.fetch_detached(plan)?;
        for record in &records {
            self.session.cache().put(record);
        }
        Ok(records)
    }

    fn fetch_count(&self, plan: &QueryPlan) -> RepoResult<i64> {
        query_count(self.session.connection(), plan)
    }
}
