//! Generic repository facade.
//!
//! # Responsibility
//! - Compose store, query builder and pager into one typed API per record.
//! - Validate input before the store is touched.
//!
//! # Invariants
//! - Single-record lookups return `Ok(None)` on a miss.
//! - `save` inserts when the id is unset or unknown, updates otherwise;
//!   unknown ids are replaced by a freshly assigned one.
//! - `find_with_lock` only runs inside an open transaction.
//! - `bulk_update` leaves no cached copy of the table behind.

use crate::error::{RepoError, RepoResult};
use crate::model::projection::Projection;
use crate::model::record::{Record, RecordId, ValidationError};
use crate::pager::{paginate, Page, PageRequest};
use crate::query::builder::{QueryBuilder, QueryPlan};
use crate::query::filter::{Filter, Mutation, Sort};
use crate::query::named::{NamedParams, NamedQuery, NamedQueryRegistry};
use crate::session::Session;
use crate::store::{query_rows, RecordStore, SqliteRecordStore};
use log::{info, warn};
use rusqlite::{Row, TransactionBehavior};

/// Typed repository for one record type.
pub struct Repository<'s, R: Record> {
    session: &'s Session,
    store: SqliteRecordStore<'s, R>,
    named: NamedQueryRegistry,
}

impl<'s, R: Record> Repository<'s, R> {
    /// Repository without named queries.
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            store: SqliteRecordStore::new(session),
            named: NamedQueryRegistry::default(),
        }
    }

    /// Repository with named queries compiled and validated up front.
    pub fn try_new(session: &'s Session, named_queries: &[NamedQuery]) -> RepoResult<Self> {
        let named = NamedQueryRegistry::compile::<R>(named_queries)?;
        info!(
            "event=repo_init module=repo status=ok table={} named_queries={}",
            R::TABLE,
            named_queries.len()
        );
        Ok(Self {
            session,
            store: SqliteRecordStore::new(session),
            named,
        })
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    pub fn store(&self) -> &SqliteRecordStore<'s, R> {
        &self.store
    }

    /// Inserts or updates `record`.
    ///
    /// A record whose row was deleted is inserted again under a fresh id.
    pub fn save(&self, record: &R) -> RepoResult<R> {
        record.validate()?;
        match record.id() {
            None => self.store.insert(record),
            Some(id) if self.store.exists(id)? => {
                self.store.update(record)?;
                Ok(record.clone())
            }
            Some(_) => self.store.insert(&record.clone().without_id()),
        }
    }

    /// Saves every record in one transaction.
    pub fn save_all(&self, records: &[R]) -> RepoResult<Vec<R>> {
        for record in records {
            record.validate()?;
        }
        self.session.transaction(TransactionBehavior::Immediate, || {
            records.iter().map(|record| self.save(record)).collect()
        })
    }

    pub fn find_by_id(&self, id: RecordId) -> RepoResult<Option<R>> {
        self.store.get(id)
    }

    pub fn exists_by_id(&self, id: RecordId) -> RepoResult<bool> {
        self.store.exists(id)
    }

    /// All records ordered by id.
    pub fn find_all(&self) -> RepoResult<Vec<R>> {
        self.store.all()
    }

    pub fn find_all_sorted(&self, sort: &Sort) -> RepoResult<Vec<R>> {
        self.find_all_by(&Filter::new(), sort)
    }

    pub fn find_all_by(&self, filter: &Filter, sort: &Sort) -> RepoResult<Vec<R>> {
        let plans = self.store.builder().build(filter, sort)?;
        self.store.fetch(&plans.content)
    }

    /// Returns the only match, `None` for no match.
    ///
    /// # Errors
    /// - `NonUniqueResult` when more than one record matches.
    pub fn find_one_by(&self, filter: &Filter) -> RepoResult<Option<R>> {
        single(self.find_all_by(filter, &Sort::unsorted())?)
    }

    /// First `limit` matches in `sort` order.
    pub fn find_first_by(&self, filter: &Filter, sort: &Sort, limit: i64) -> RepoResult<Vec<R>> {
        if limit <= 0 {
            return Err(RepoError::InvalidArgument(format!(
                "limit must be positive, got {limit}"
            )));
        }
        let plans = self.store.builder().build(filter, sort)?;
        self.store.fetch(&plans.content.windowed(0, limit))
    }

    /// Matches in `sort` order starting at row `offset`.
    pub fn find_window(
        &self,
        filter: &Filter,
        sort: &Sort,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Vec<R>> {
        if offset < 0 || limit <= 0 {
            return Err(RepoError::InvalidArgument(format!(
                "window needs offset >= 0 and limit > 0, got offset={offset} limit={limit}"
            )));
        }
        let plans = self.store.builder().build(filter, sort)?;
        self.store.fetch(&plans.content.windowed(offset, limit))
    }

    pub fn count(&self) -> RepoResult<i64> {
        self.store.count()
    }

    pub fn count_by(&self, filter: &Filter) -> RepoResult<i64> {
        let plans = self.store.builder().build(filter, &Sort::unsorted())?;
        self.store.fetch_count(&plans.count)
    }

    /// Deletes `record` by id. Deleting an already removed record is a no-op.
    pub fn delete(&self, record: &R) -> RepoResult<()> {
        let id = record.id().ok_or(ValidationError::MissingId(R::TABLE))?;
        self.store.delete(id)
    }

    pub fn delete_by_id(&self, id: RecordId) -> RepoResult<()> {
        self.store.delete(id)
    }

    pub fn find_page(&self, filter: &Filter, request: &PageRequest) -> RepoResult<Page<R>> {
        let plans = self.store.builder().build(filter, request.sort())?;
        let page = paginate(
            self.session.connection(),
            &plans.content,
            &plans.count,
            request,
            R::from_row,
        )?;
        for record in page.content() {
            self.session.cache().put(record);
        }
        Ok(page)
    }

    /// Applies `mutation` to every match in one statement.
    ///
    /// Returns the number of matched records. Cached copies of the table are
    /// dropped, so later reads observe the new values.
    pub fn bulk_update(&self, filter: &Filter, mutation: &Mutation) -> RepoResult<usize> {
        self.store.bulk_update(filter, mutation)
    }

    pub fn find_projection<P: Projection<R>>(
        &self,
        filter: &Filter,
        sort: &Sort,
    ) -> RepoResult<Vec<P>> {
        let plans = QueryBuilder::for_projection::<R, P>().build(filter, sort)?;
        query_rows(self.session.connection(), &plans.content, P::from_row)
    }

    pub fn find_projection_page<P: Projection<R>>(
        &self,
        filter: &Filter,
        request: &PageRequest,
    ) -> RepoResult<Page<P>> {
        let plans = QueryBuilder::for_projection::<R, P>().build(filter, request.sort())?;
        paginate(
            self.session.connection(),
            &plans.content,
            &plans.count,
            request,
            P::from_row,
        )
    }

    /// Reads matches while holding the database write lock.
    ///
    /// The lock is held until the enclosing transaction ends.
    ///
    /// # Errors
    /// - `InvalidArgument` when no transaction is open.
    /// - `LockTimeout` when another writer holds the lock past the busy timeout.
    pub fn find_with_lock(&self, filter: &Filter, sort: &Sort) -> RepoResult<Vec<R>> {
        if !self.session.in_transaction() {
            return Err(RepoError::InvalidArgument(
                "find_with_lock requires an enclosing transaction".to_string(),
            ));
        }

        if let Err(err) = self.store.lock_matching(filter) {
            if matches!(err, RepoError::LockTimeout(_)) {
                warn!(
                    "event=lock_acquire module=repo status=timeout table={} busy_timeout_ms={}",
                    R::TABLE,
                    self.session.config().busy_timeout.as_millis()
                );
            }
            return Err(err);
        }
        self.find_all_by(filter, sort)
    }

    /// Reads matches without registering them in the identity cache.
    pub fn find_read_only(&self, filter: &Filter, sort: &Sort) -> RepoResult<Vec<R>> {
        let plans = self.store.builder().build(filter, sort)?;
        self.store.fetch_detached(&plans.content)
    }

    /// Runs a named query compiled at construction time.
    pub fn find_named(&self, name: &str, params: &NamedParams, sort: &Sort) -> RepoResult<Vec<R>> {
        let filter = self.named.bind(name, params)?;
        self.find_all_by(&filter, sort)
    }

    /// Runs caller-written SQL whose columns match `R`'s column names.
    pub fn find_native(&self, plan: &QueryPlan) -> RepoResult<Vec<R>> {
        self.store.fetch(plan)
    }

    /// Pages caller-written SQL with a caller-written count query.
    pub fn find_native_page<T>(
        &self,
        content: &QueryPlan,
        count: &QueryPlan,
        request: &PageRequest,
        map_row: impl FnMut(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Page<T>> {
        paginate(self.session.connection(), content, count, request, map_row)
    }
}

/// Collapses a result list to at most one item.
pub(crate) fn single<T>(mut items: Vec<T>) -> RepoResult<Option<T>> {
    match items.len() {
        0 | 1 => Ok(items.pop()),
        count => Err(RepoError::NonUniqueResult { count }),
    }
}
