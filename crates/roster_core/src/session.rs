//! Unit-of-work session.
//!
//! # Responsibility
//! - Own one migrated connection and the identity cache shared by every
//!   repository built on it.
//! - Provide the transaction boundary used by locking and multi-step writes.
//!
//! # Invariants
//! - A failed transaction rolls back and clears the cache.
//! - Nested `transaction` calls join the active transaction.

use crate::config::StoreConfig;
use crate::db::{open_db_in_memory_with_config, open_db_with_config};
use crate::error::RepoResult;
use crate::store::cache::RecordCache;
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

/// Connection, cache and settings for one logical unit of work.
pub struct Session {
    conn: Connection,
    cache: RecordCache,
    config: StoreConfig,
}

impl Session {
    /// Wraps an already migrated connection with default settings.
    pub fn new(conn: Connection) -> Self {
        Self::with_config(conn, StoreConfig::default())
    }

    /// Wraps an already migrated connection.
    ///
    /// `config.busy_timeout` is expected to have been applied at open time.
    pub fn with_config(conn: Connection, config: StoreConfig) -> Self {
        Self {
            conn,
            cache: RecordCache::new(),
            config,
        }
    }

    /// Opens and migrates a database file.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> RepoResult<Self> {
        let conn = open_db_with_config(path, &config)?;
        Ok(Self::with_config(conn, config))
    }

    /// Opens and migrates an in-memory database.
    pub fn open_in_memory(config: StoreConfig) -> RepoResult<Self> {
        let conn = open_db_in_memory_with_config(&config)?;
        Ok(Self::with_config(conn, config))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Drops every cached record.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Returns whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Runs `work` inside a transaction, committing on `Ok`.
    ///
    /// When a transaction is already open, `work` joins it and the outer
    /// caller keeps control of commit/rollback.
    pub fn transaction<T>(
        &self,
        behavior: TransactionBehavior,
        work: impl FnOnce() -> RepoResult<T>,
    ) -> RepoResult<T> {
        if self.in_transaction() {
            return work();
        }

        let tx = Transaction::new_unchecked(&self.conn, behavior)?;
        debug!("event=tx_begin module=session status=ok");
        match work() {
            Ok(value) => {
                if let Err(err) = tx.commit() {
                    self.cache.clear();
                    warn!("event=tx_commit module=session status=error error={err}");
                    return Err(err.into());
                }
                debug!("event=tx_commit module=session status=ok");
                Ok(value)
            }
            Err(err) => {
                drop(tx);
                self.cache.clear();
                debug!("event=tx_rollback module=session status=ok reason={err}");
                Err(err)
            }
        }
    }
}
