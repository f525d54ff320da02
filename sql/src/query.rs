// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Lifecycle of a single query: borrow, bind, execute and release.

use crate::pool::PoolManager;
use crate::types::{ParamList, SqlType, SqlValue};
use crate::{map_sqlx_error, DbError, DbResult};
use log::{debug, error};
use rms_core::result::{Close, Resulted};
use sqlx::any::{Any, AnyRow, AnyStatement};
use sqlx::pool::PoolConnection;
use sqlx::{Decode, Row, Statement, Type};

/// Exclusive owner of the connection and prepared statement used by one query.
///
/// The connection goes back to the `PoolManager` exactly once: when `close` is first called or
/// when the manager is dropped, whichever comes first.
pub struct QueryManager {
    /// Pool that lent us the connection.
    pm: PoolManager,

    /// Borrowed connection, or `None` once released.
    conn: Option<PoolConnection<Any>>,

    /// Statement prepared on `conn`.
    statement: AnyStatement<'static>,
}

impl QueryManager {
    /// Borrows a connection from `pm` and prepares `sql` on it.
    pub(crate) async fn open(pm: &PoolManager, sql: &str) -> DbResult<Self> {
        let (conn, statement) = pm.borrow(sql).await?;
        Ok(Self { pm: pm.clone(), conn: Some(conn), statement })
    }

    /// Binds `params` to the prepared statement and runs it, returning the affected row count.
    pub(crate) async fn execute_update(&mut self, params: &ParamList) -> DbResult<u64> {
        let conn = self.conn.as_mut().ok_or_else(closed_error)?;
        let query = params.bind_all(self.statement.query())?;
        let done = query.execute(&mut **conn).await.map_err(map_sqlx_error)?;
        Ok(done.rows_affected())
    }

    /// Binds `params` to the prepared statement and runs it, returning all rows.
    pub(crate) async fn execute_query(&mut self, params: &ParamList) -> DbResult<Vec<AnyRow>> {
        let conn = self.conn.as_mut().ok_or_else(closed_error)?;
        let query = params.bind_all(self.statement.query())?;
        query.fetch_all(&mut **conn).await.map_err(map_sqlx_error)
    }

    /// Returns true if the connection has already been released.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Releases the connection.  Subsequent calls do nothing.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pm.release(conn);
        }
    }
}

impl Close for QueryManager {
    fn close(&mut self) {
        QueryManager::close(self)
    }
}

impl Drop for QueryManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Error returned when running a statement through a released manager.
fn closed_error() -> DbError {
    DbError::BackendError("Connection already released".to_owned())
}

/// A one-shot query: SQL text plus the positional parameters to bind to it.
///
/// A query can be executed only once.  Calling `set` or any of the execute methods after the
/// first execution is a programming error and panics.
pub struct SqlQuery {
    /// Pool to borrow the connection from.
    pm: PoolManager,

    /// Text of the statement to prepare.
    sql: String,

    /// Parameters to bind, in order.
    params: ParamList,

    /// Whether the query has been executed already.
    closed: bool,
}

impl SqlQuery {
    /// Creates a new query for `sql` against the pool managed by `pm`.  Nothing is borrowed yet.
    pub fn new<S: Into<String>>(sql: S, pm: &PoolManager) -> Self {
        Self { pm: pm.clone(), sql: sql.into(), params: ParamList::new(), closed: false }
    }

    /// Appends the next positional parameter, to be encoded as `tag`.
    pub fn set<V: Into<SqlValue>>(&mut self, tag: SqlType, value: V) -> &mut Self {
        assert!(!self.closed, "SqlQuery already closed");
        self.params.push(tag, value.into());
        self
    }

    /// Returns the SQL text of the query.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the parameters set so far.
    pub fn params(&self) -> &ParamList {
        &self.params
    }

    /// Returns true if the query has been executed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the query as executed, panicking if it already was.
    fn take_once(&mut self) {
        assert!(!self.closed, "SqlQuery already closed");
        self.closed = true;
    }

    /// Executes a statement that does not return rows and yields the affected row count.
    ///
    /// The connection is released before returning, whether the statement succeeded or not.
    pub async fn execute_update(&mut self) -> Resulted<u64> {
        self.take_once();
        debug!("Executing update: {} with {} parameters", self.sql, self.params.len());

        let result = async {
            let mut qm = QueryManager::open(&self.pm, &self.sql).await?;
            let count = qm.execute_update(&self.params).await;
            qm.close();
            count
        }
        .await;
        match result {
            Ok(count) => Resulted::ok(count),
            Err(e) => {
                error!("Update failed: {}: {}", self.sql, e);
                Resulted::from_exception(e)
            }
        }
    }

    /// Executes a statement that returns rows.
    ///
    /// On success, the returned `SqlResult` keeps the connection until it is closed or dropped.
    /// On failure, the connection is released before returning.
    pub async fn execute_query(&mut self) -> Resulted<SqlResult> {
        self.take_once();
        debug!("Executing query: {} with {} parameters", self.sql, self.params.len());

        let result = async {
            let mut qm = QueryManager::open(&self.pm, &self.sql).await?;
            let rows = qm.execute_query(&self.params).await?;
            Ok::<_, DbError>(SqlResult::new(qm, rows))
        }
        .await;
        match result {
            Ok(result) => Resulted::ok(result),
            Err(e) => {
                error!("Query failed: {}: {}", self.sql, e);
                Resulted::from_exception(e)
            }
        }
    }
}

/// Rows returned by a query, together with the connection that produced them.
///
/// Rows are read by advancing a cursor with `next_row` and then extracting columns from the
/// current row with `get`.  Closing the result releases the connection and discards the rows.
pub struct SqlResult {
    /// Manager holding the connection the rows came from.
    qm: QueryManager,

    /// Fetched rows.
    rows: Vec<AnyRow>,

    /// Index of the current row, if `next_row` has been called.
    position: Option<usize>,
}

impl SqlResult {
    /// Pairs the `rows` fetched by a query with the `qm` that ran it.
    fn new(qm: QueryManager, rows: Vec<AnyRow>) -> Self {
        Self { qm, rows, position: None }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns all rows.
    pub fn rows(&self) -> &[AnyRow] {
        &self.rows
    }

    /// Advances the cursor and returns the new current row, or `None` past the last row.
    pub fn next_row(&mut self) -> Option<&AnyRow> {
        let next = self.position.map_or(0, |p| p + 1).min(self.rows.len());
        self.position = Some(next);
        self.rows.get(next)
    }

    /// Extracts `column` from the current row.
    pub fn get<'r, T>(&'r self, column: &str) -> DbResult<T>
    where
        T: Decode<'r, Any> + Type<Any>,
    {
        let row = self.position.and_then(|p| self.rows.get(p)).ok_or(DbError::NotFound)?;
        row.try_get(column).map_err(map_sqlx_error)
    }

    /// Returns true if the result has been closed.
    pub fn is_closed(&self) -> bool {
        self.qm.is_closed()
    }

    /// Releases the connection and discards the rows.  Subsequent calls do nothing.
    pub fn close(&mut self) {
        self.qm.close();
        self.rows.clear();
        self.position = None;
    }
}

impl Close for SqlResult {
    fn close(&mut self) {
        SqlResult::close(self)
    }
}
