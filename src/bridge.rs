//! Lock-guarded CRUD façade over one SQLite connection.
//!
//! A [`SqliteBridge`] owns a single `rusqlite::Connection`. Every operation,
//! sync or async, takes the bridge lock for the duration of the rusqlite call
//! only. Async variants run that call on tokio's blocking pool, so the lock
//! is never held across an `.await` and a waiting task does not block the
//! executor thread.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::SqliteConfig;
use crate::error::{Error, Result};
use crate::mapping::Record;
use crate::query;
use crate::statement::{ColumnToUpdate, OrderByClause, Paging, WhereClause};

/// Transaction sub-state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    InTransaction,
}

#[derive(Debug)]
struct Session {
    connection: Connection,
    transaction: TransactionState,
}

impl Session {
    /// Drops a transaction SQLite has already ended itself, e.g. the automatic
    /// rollback after `SQLITE_FULL`.
    fn sync_transaction(&mut self) -> TransactionState {
        if self.transaction == TransactionState::InTransaction && self.connection.is_autocommit()
        {
            warn!("sqlite ended the transaction");
            self.transaction = TransactionState::Idle;
        }
        self.transaction
    }
}

#[derive(Debug, Clone, Copy)]
enum Finish {
    Commit,
    Rollback,
}

impl Finish {
    fn as_sql(self) -> &'static str {
        match self {
            Finish::Commit => "COMMIT",
            Finish::Rollback => "ROLLBACK",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteBridge {
    session: Arc<Mutex<Session>>,
    path: Option<PathBuf>,
}

impl SqliteBridge {
    /// Wraps an already open connection.
    pub fn new(connection: Connection) -> Self {
        let path = connection
            .path()
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty());
        Self {
            session: Arc::new(Mutex::new(Session {
                connection,
                transaction: TransactionState::Idle,
            })),
            path,
        }
    }

    /// Wraps `connection` and applies the connection settings of `config`.
    pub fn with_config(connection: Connection, config: &SqliteConfig) -> Result<Self> {
        connection.pragma_update(None, "foreign_keys", config.foreign_keys)?;
        if let Some(timeout) = config.busy_timeout() {
            connection.busy_timeout(timeout)?;
        }
        info!(
            path = %config.db_path.display(),
            foreign_keys = config.foreign_keys,
            "opened sqlite bridge"
        );
        Ok(Self::new(connection))
    }

    /// File backing the connection, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // Poisoning only means caller code (row mapping, predicates) panicked;
    // the connection itself is still usable.
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let session = self.lock();
        f(&session.connection)
    }

    async fn run_blocking<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            let session = session.lock().unwrap_or_else(PoisonError::into_inner);
            f(&session.connection)
        })
        .await?
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.lock().sync_transaction()
    }

    pub fn begin_transaction(&self) -> Result<()> {
        let mut session = self.lock();
        if session.sync_transaction() == TransactionState::InTransaction {
            return Err(Error::InvalidOperation(
                "a transaction is already active".to_string(),
            ));
        }
        session.connection.execute_batch("BEGIN")?;
        session.transaction = TransactionState::InTransaction;
        debug!("transaction started");
        Ok(())
    }

    /// Commits the active transaction. Does nothing when none is active.
    ///
    /// Fails with [`Error::InvalidOperation`] if SQLite already rolled the
    /// transaction back on its own.
    pub fn commit_transaction(&self) -> Result<()> {
        self.finish_transaction(Finish::Commit)
    }

    /// Rolls back the active transaction. Does nothing when none is active.
    pub fn rollback_transaction(&self) -> Result<()> {
        self.finish_transaction(Finish::Rollback)
    }

    fn finish_transaction(&self, finish: Finish) -> Result<()> {
        let sql = finish.as_sql();
        let mut session = self.lock();
        if session.transaction == TransactionState::Idle {
            warn!(sql, "no active transaction");
            return Ok(());
        }
        if session.sync_transaction() == TransactionState::Idle {
            return match finish {
                Finish::Commit => Err(Error::InvalidOperation(
                    "transaction was rolled back before commit".to_string(),
                )),
                Finish::Rollback => Ok(()),
            };
        }

        let result = session.connection.execute_batch(sql);
        if result.is_ok() || session.connection.is_autocommit() {
            session.transaction = TransactionState::Idle;
        }
        result?;
        debug!(sql, "transaction finished");
        Ok(())
    }

    pub fn get_all<T: Record>(&self) -> Result<Vec<T>> {
        self.with_connection(query::get_all::<T>)
    }

    pub async fn get_all_async<T: Record + Send>(&self) -> Result<Vec<T>> {
        self.run_blocking(query::get_all::<T>).await
    }

    /// One page of rows, optionally filtered and sorted.
    pub fn get_page<T: Record>(
        &self,
        paging: Paging,
        order_by: &OrderByClause,
        clauses: &[WhereClause],
    ) -> Result<Vec<T>> {
        self.with_connection(|conn| query::get_page(conn, paging, order_by, clauses))
    }

    pub async fn get_page_async<T: Record + Send>(
        &self,
        paging: Paging,
        order_by: &OrderByClause,
        clauses: &[WhereClause],
    ) -> Result<Vec<T>> {
        let order_by = order_by.clone();
        let clauses = clauses.to_vec();
        self.run_blocking(move |conn| query::get_page(conn, paging, &order_by, &clauses))
            .await
    }

    pub fn row_count<T: Record>(&self, clauses: &[WhereClause]) -> Result<u64> {
        self.with_connection(|conn| query::row_count::<T>(conn, clauses))
    }

    pub async fn row_count_async<T: Record>(&self, clauses: &[WhereClause]) -> Result<u64> {
        let clauses = clauses.to_vec();
        self.run_blocking(move |conn| query::row_count::<T>(conn, &clauses))
            .await
    }

    pub fn select_records<T: Record>(&self, clauses: &[WhereClause]) -> Result<Vec<T>> {
        self.with_connection(|conn| query::select_records(conn, clauses))
    }

    pub async fn select_records_async<T: Record + Send>(
        &self,
        clauses: &[WhereClause],
    ) -> Result<Vec<T>> {
        let clauses = clauses.to_vec();
        self.run_blocking(move |conn| query::select_records(conn, &clauses))
            .await
    }

    /// Rows accepted by `predicate`. The filter runs in process over the
    /// whole table.
    pub fn select_matching<T, F>(&self, predicate: F) -> Result<Vec<T>>
    where
        T: Record,
        F: FnMut(&T) -> bool,
    {
        self.with_connection(|conn| query::select_matching(conn, predicate))
    }

    pub async fn select_matching_async<T, F>(&self, predicate: F) -> Result<Vec<T>>
    where
        T: Record + Send,
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.run_blocking(move |conn| query::select_matching(conn, predicate))
            .await
    }

    /// Inserts one record; `true` if a row was written.
    pub fn insert<T: Record>(&self, item: &T) -> Result<bool> {
        self.with_connection(|conn| query::insert(conn, item))
    }

    pub async fn insert_async<T: Record>(&self, item: &T) -> Result<bool> {
        let (statement, rows) = query::plan_insert([item])?;
        self.run_blocking(move |conn| Ok(query::execute_each(conn, &statement, &rows)? > 0))
            .await
    }

    /// Inserts every record; `true` only if each produced a row.
    pub fn insert_many<T: Record>(&self, items: &[T]) -> Result<bool> {
        self.with_connection(|conn| query::insert_many(conn, items))
    }

    pub async fn insert_many_async<T: Record>(&self, items: &[T]) -> Result<bool> {
        let (statement, rows) = query::plan_insert(items)?;
        let expected = items.len();
        self.run_blocking(move |conn| {
            Ok(query::execute_each(conn, &statement, &rows)? == expected)
        })
        .await
    }

    /// Sets `columns` on every row matching `clauses`; `true` if any row changed.
    pub fn update<T: Record>(
        &self,
        columns: &[ColumnToUpdate],
        clauses: &[WhereClause],
    ) -> Result<bool> {
        self.with_connection(|conn| query::update::<T>(conn, columns, clauses))
    }

    pub async fn update_async<T: Record>(
        &self,
        columns: &[ColumnToUpdate],
        clauses: &[WhereClause],
    ) -> Result<bool> {
        let columns = columns.to_vec();
        let clauses = clauses.to_vec();
        self.run_blocking(move |conn| query::update::<T>(conn, &columns, &clauses))
            .await
    }

    /// Writes every mapped data column of `item` into the rows matching `clauses`.
    pub fn update_record<T: Record>(&self, item: &T, clauses: &[WhereClause]) -> Result<bool> {
        self.with_connection(|conn| query::update_record(conn, item, clauses))
    }

    pub async fn update_record_async<T: Record>(
        &self,
        item: &T,
        clauses: &[WhereClause],
    ) -> Result<bool> {
        let query = query::plan_update_record(item, clauses)?;
        self.run_blocking(move |conn| Ok(query::execute(conn, &query)? > 0))
            .await
    }

    /// Deletes the rows matching `clauses`, every row when `clauses` is empty.
    pub fn delete<T: Record>(&self, clauses: &[WhereClause]) -> Result<bool> {
        self.with_connection(|conn| query::delete::<T>(conn, clauses))
    }

    pub async fn delete_async<T: Record>(&self, clauses: &[WhereClause]) -> Result<bool> {
        let clauses = clauses.to_vec();
        self.run_blocking(move |conn| query::delete::<T>(conn, &clauses))
            .await
    }

    /// `CREATE INDEX <name> ON <table of T> (<column>)`.
    pub fn create_index<T: Record>(&self, name: &str, column: &str) -> Result<()> {
        self.with_connection(|conn| query::create_index::<T>(conn, name, column))
    }

    pub async fn create_index_async<T: Record>(&self, name: &str, column: &str) -> Result<()> {
        let name = name.to_string();
        let column = column.to_string();
        self.run_blocking(move |conn| query::create_index::<T>(conn, &name, &column))
            .await
    }

    /// Closes the connection, surfacing any error SQLite reports on close.
    ///
    /// Fails with [`Error::InvalidOperation`] while clones of this bridge are alive.
    pub fn close(self) -> Result<()> {
        let session = Arc::try_unwrap(self.session).map_err(|_| {
            Error::InvalidOperation("bridge is still shared and cannot be closed".to_string())
        })?;
        let session = session.into_inner().unwrap_or_else(PoisonError::into_inner);
        session.connection.close().map_err(|(_, err)| Error::Sqlite(err))?;
        debug!("sqlite bridge closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> SqliteBridge {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .execute_batch("CREATE TABLE Item (Id INTEGER PRIMARY KEY, Name TEXT);")
            .unwrap();
        SqliteBridge::new(connection)
    }

    // Ends the transaction behind the bridge's back, as SQLite does after
    // errors such as SQLITE_FULL.
    fn end_transaction_in_sqlite(bridge: &SqliteBridge) {
        bridge.lock().connection.execute_batch("ROLLBACK").unwrap();
    }

    #[test]
    fn in_memory_bridge_has_no_path() {
        assert_eq!(bridge().path(), None);
    }

    #[test]
    fn begin_after_sqlite_ended_the_transaction() {
        let bridge = bridge();
        bridge.begin_transaction().unwrap();
        end_transaction_in_sqlite(&bridge);

        assert_eq!(bridge.transaction_state(), TransactionState::Idle);
        bridge.begin_transaction().unwrap();
        assert_eq!(bridge.transaction_state(), TransactionState::InTransaction);
        bridge.commit_transaction().unwrap();
    }

    #[test]
    fn commit_after_sqlite_ended_the_transaction() {
        let bridge = bridge();
        bridge.begin_transaction().unwrap();
        end_transaction_in_sqlite(&bridge);

        assert!(matches!(
            bridge.commit_transaction(),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(bridge.transaction_state(), TransactionState::Idle);
        bridge.begin_transaction().unwrap();
        bridge.rollback_transaction().unwrap();
    }

    #[test]
    fn rollback_after_sqlite_ended_the_transaction() {
        let bridge = bridge();
        bridge.begin_transaction().unwrap();
        end_transaction_in_sqlite(&bridge);

        bridge.rollback_transaction().unwrap();
        assert_eq!(bridge.transaction_state(), TransactionState::Idle);
    }
}
