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

//! Connection-scoped SQL query lifecycle on top of a shared pool.
//!
//! The facilities in this crate tie together three resources for the duration of a single query:
//! a connection borrowed from the pool, the statement prepared on it and the positional
//! parameters bound to that statement.
//!
//! 1.  A `PoolManager` owns the pool for the lifetime of the service and hands out connections
//!     with a freshly prepared statement.  By default, connections are evicted from the pool once
//!     a query is done with them instead of being returned; see `ReleasePolicy`.
//!
//! 1.  A `SqlQuery` accumulates the SQL text and its typed parameters.  Executing it borrows a
//!     connection through a `QueryManager`, which releases the connection exactly once no matter
//!     how the query ends.
//!
//! 1.  Updates release their connection before returning the affected row count.  Queries return
//!     a `SqlResult`, which keeps the connection until it is closed or dropped.
//!
//! Backends are selected at runtime by the connection URL.  PostgreSQL is meant for production
//! use and SQLite is primarily intended to support unit tests.  Note that SQL text is passed to
//! the backend verbatim, so placeholders must use the backend's syntax (`?` for SQLite, `$N` for
//! PostgreSQL).

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use rms_core::config::ConfigError;
use sqlx::error::ErrorKind;

mod pool;
pub use pool::{DbTarget, PoolManager, PoolOptions, PoolStats, ReleasePolicy};
mod query;
pub use query::{QueryManager, SqlQuery, SqlResult};
mod types;
pub use types::{param_list, ParamList, SqlType, SqlValue};

/// Database errors.  Any unexpected errors that come from the database are classified as
/// `BackendError`, but errors we know about have more specific types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DbError {
    /// Indicates that a request to create an entry failed because it already exists.
    #[error("Already exists")]
    AlreadyExists,

    /// Catch-all error type for unexpected database errors.
    #[error("Database error: {0}")]
    BackendError(String),

    /// Indicates that a parameter cannot be bound with the requested type.
    #[error("Bind error: {0}")]
    BindError(String),

    /// Indicates a failure processing the data that already exists in the database.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    /// Indicates that the database configuration is invalid.
    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),

    /// Indicates that a requested entry does not exist.
    #[error("Entity not found")]
    NotFound,

    /// Indicates that the database is not available (maybe because of too many active concurrent
    /// connections).
    #[error("Unavailable")]
    Unavailable,
}

impl From<ConfigError> for DbError {
    fn from(e: ConfigError) -> Self {
        DbError::InvalidConfig(e.to_string())
    }
}

/// Result type for this crate.
pub type DbResult<T> = Result<T, DbError>;

/// Converts a `sqlx::Error` into a `DbError`.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::Database(ref err) => match err.kind() {
            ErrorKind::UniqueViolation => DbError::AlreadyExists,
            ErrorKind::ForeignKeyViolation => DbError::NotFound,
            _ => DbError::BackendError(e.to_string()),
        },
        sqlx::Error::PoolTimedOut => DbError::Unavailable,
        sqlx::Error::RowNotFound => DbError::NotFound,
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::Decode(_) => DbError::DataIntegrityError(e.to_string()),
        e => DbError::BackendError(e.to_string()),
    }
}

/// Test utilities for code that talks to a database.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    pub use paste::paste;

    /// A pool manager connected to a scratch database for a single test.
    pub struct TestContext {
        /// The pool manager under test.
        pub pm: PoolManager,

        /// Whether placeholders must be numbered (`$1`) instead of positional (`?`).
        numbered: bool,

        /// Directory holding the SQLite database file, deleted on drop.
        _dir: Option<TempDir>,
    }

    impl TestContext {
        /// Connects to a new, empty SQLite database stored in a temporary file.
        ///
        /// A file is needed because every connection to an in-memory SQLite database sees a
        /// different database, and the default release policy opens a new connection for every
        /// query.
        pub fn sqlite() -> Self {
            Self::sqlite_with_policy(ReleasePolicy::Evict)
        }

        /// Same as `sqlite` but with a specific connection release `policy`.
        pub fn sqlite_with_policy(policy: ReleasePolicy) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();

            let dir = tempfile::tempdir().unwrap();
            let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
            let opts = PoolOptions::from_url(url).with_release_policy(policy);
            let pm = PoolManager::connect(opts).unwrap();
            Self { pm, numbered: false, _dir: Some(dir) }
        }

        /// Connects to the PostgreSQL database given in the `PGSQL_TEST_URL` environment
        /// variable.
        pub fn postgres() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();

            let url = env::var("PGSQL_TEST_URL").expect("PGSQL_TEST_URL must be set");
            let pm = PoolManager::connect(PoolOptions::from_url(url)).unwrap();
            Self { pm, numbered: true, _dir: None }
        }

        /// Adapts the `?` placeholders in `sql` to the syntax of the backend.
        pub fn sql(&self, sql: &str) -> String {
            if !self.numbered {
                return sql.to_owned();
            }
            let mut adapted = String::with_capacity(sql.len());
            let mut index = 0;
            for ch in sql.chars() {
                if ch == '?' {
                    index += 1;
                    adapted.push_str(&format!("${}", index));
                } else {
                    adapted.push(ch);
                }
            }
            adapted
        }

        /// Runs the statements in `script`, panicking on failure.
        pub async fn exec(&self, script: &str) {
            self.pm.execute_script(script).await.unwrap();
        }
    }

    /// Instantiates the `module::name` test against the context created by `setup`.
    ///
    /// The `extra` metadata parameter can be used to tag the generated tests.
    #[macro_export]
    macro_rules! generate_one_test [
        ( $name:ident, $setup:expr, $module:path $(, #[$extra:meta] )? ) => {
            #[tokio::test]
            $(#[$extra])?
            async fn $name() {
                $crate::testutils::paste! {
                    $module :: [< $name >]($setup).await;
                }
            }
        }
    ];

    pub use generate_one_test;

    /// Instantiates a collection of tests for a specific database system.
    ///
    /// The database to run the tests against is determined by the `setup` expression, which
    /// needs to return a `TestContext`.
    ///
    /// The `extra` metadata parameter can be used to tag the generated tests.
    #[macro_export]
    macro_rules! generate_tests [
        ( #[$extra:meta], $setup:expr, $module:path $(, $name:ident)+ ) => {
            $(
                $crate::testutils::generate_one_test!($name, $setup, $module, #[$extra]);
            )+
        };

        ( $setup:expr, $module:path $(, $name:ident)+ ) => {
            $(
                $crate::testutils::generate_one_test!($name, $setup, $module);
            )+
        };
    ];

    pub use generate_tests;
}
