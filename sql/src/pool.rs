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

//! Ownership of the connection pool and of the connections borrowed from it.

use crate::query::SqlQuery;
use crate::{map_sqlx_error, DbError, DbResult};
use derivative::Derivative;
use log::{debug, info, warn};
use rms_core::config::{ConfigError, ConfigResult, Properties};
use serde::Deserialize;
use sqlx::any::{Any, AnyPoolOptions, AnyStatement};
use sqlx::pool::PoolConnection;
use sqlx::{AnyPool, Executor};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_POOL_SIZE: u32 = 10;

/// Default maximum lifetime of a pooled connection.
const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Default time to wait for a connection to become available.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Paths that only apply when the database is given in driver mode.
const DRIVER_PATHS: &[&str] = &["db.driver", "db.hostname", "db.port", "db.name"];

/// What to do with a connection once a query is done with it.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReleasePolicy {
    /// Close the connection so that the pool opens a new one for the next query.
    #[default]
    Evict,

    /// Return the connection to the pool for reuse.
    Reuse,
}

/// Location of the database, in one of two mutually exclusive forms.
#[derive(Clone, Debug, PartialEq)]
pub enum DbTarget {
    /// A complete connection URL such as `postgres://host:5432/db` or `sqlite://file.db`.
    Url(String),

    /// The components of a connection URL.
    Driver {
        /// URL scheme of the backend, such as `postgres`.
        driver: String,

        /// Host to connect to.
        hostname: String,

        /// Port to connect to.
        port: u16,

        /// Database name.
        name: String,
    },
}

/// Options to establish connections to a database.
#[derive(Clone, Derivative)]
#[derivative(Debug, PartialEq)]
pub struct PoolOptions {
    /// Where the database lives.
    pub target: DbTarget,

    /// Username to establish connections with.  Ignored if empty.
    pub username: String,

    /// Password to establish connections with.  Ignored if empty.
    #[derivative(Debug = "ignore")]
    pub password: String,

    /// Maximum lifetime of a pooled connection.
    pub max_lifetime: Duration,

    /// Maximum number of connections to keep open against the database.
    pub max_pool_size: u32,

    /// Maximum time to wait for a connection to become available.
    pub acquire_timeout: Duration,

    /// Extra parameters appended to the query string of the connection URL.
    pub properties: BTreeMap<String, String>,

    /// What to do with connections once a query is done with them.
    pub release_policy: ReleasePolicy,
}

impl PoolOptions {
    /// Creates a set of options for the database at `url` with default settings.
    pub fn from_url<U: Into<String>>(url: U) -> Self {
        Self {
            target: DbTarget::Url(url.into()),
            username: String::new(),
            password: String::new(),
            max_lifetime: DEFAULT_MAX_LIFETIME,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            properties: BTreeMap::default(),
            release_policy: ReleasePolicy::default(),
        }
    }

    /// Overrides the connection release `policy`.
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    /// Initializes a set of options from the `db` section of a configuration document.
    ///
    /// Returns `None` if `db.type` is absent or `none`.  Otherwise, `db.type` must be `url`, which
    /// requires `db.url`, or `driver`, which requires `db.driver`, `db.hostname`, `db.port` and
    /// `db.name`.  Settings of the mode that was not selected must be absent.  In both modes,
    /// `db.username`, `db.password`, `db.maxLifetime` (in milliseconds) and `db.maxPoolSize` are
    /// required, while `db.properties`, `db.acquireTimeout` (in milliseconds) and
    /// `db.releasePolicy` are optional.
    pub fn from_properties(props: &Properties) -> ConfigResult<Option<Self>> {
        let target = match props.get_str_or("db.type", "none")?.as_str() {
            "none" => {
                props.check_ignored("db.url");
                for path in DRIVER_PATHS {
                    props.check_ignored(path);
                }
                return Ok(None);
            }
            "url" => {
                if let Some(path) = DRIVER_PATHS.iter().find(|path| props.contains(path)) {
                    return Err(ConfigError::Conflict(format!(
                        "'{}' cannot be set when db.type is url",
                        path
                    )));
                }
                DbTarget::Url(props.get_req_str("db.url")?)
            }
            "driver" => {
                if props.contains("db.url") {
                    return Err(ConfigError::Conflict(
                        "'db.url' cannot be set when db.type is driver".to_owned(),
                    ));
                }
                DbTarget::Driver {
                    driver: props.get_req_str("db.driver")?,
                    hostname: props.get_req_str("db.hostname")?,
                    port: props.get_req("db.port")?,
                    name: props.get_req_str("db.name")?,
                }
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    path: "db.type".to_owned(),
                    message: format!("Unknown database type '{}'", other),
                })
            }
        };

        Ok(Some(Self {
            target,
            username: props.get_req_str("db.username")?,
            password: props.get_req_str("db.password")?,
            max_lifetime: Duration::from_millis(props.get_req("db.maxLifetime")?),
            max_pool_size: props.get_req("db.maxPoolSize")?,
            acquire_timeout: props
                .get::<u64>("db.acquireTimeout")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT),
            properties: props.get_or("db.properties", BTreeMap::default())?,
            release_policy: props.get_or("db.releasePolicy", ReleasePolicy::default())?,
        }))
    }

    /// Computes the connection URL, including credentials and extra properties.
    fn url(&self) -> DbResult<Url> {
        let base = match &self.target {
            DbTarget::Url(url) => url.clone(),
            DbTarget::Driver { driver, hostname, port, name } => {
                format!("{}://{}:{}/{}", driver, hostname, port, name)
            }
        };
        let mut url = Url::parse(&base)
            .map_err(|e| DbError::InvalidConfig(format!("Invalid database URL: {}", e)))?;

        if !self.username.is_empty() {
            url.set_username(&self.username)
                .map_err(|_| DbError::InvalidConfig("URL cannot hold a username".to_owned()))?;
        }
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| DbError::InvalidConfig("URL cannot hold a password".to_owned()))?;
        }
        if !self.properties.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.properties {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Snapshot of the connection accounting of a `PoolManager`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PoolStats {
    /// Number of connections handed out to queries.
    pub borrowed: u64,

    /// Number of connections closed after use.
    pub evicted: u64,

    /// Number of connections returned to the pool after use.
    pub returned: u64,
}

/// Live counters behind `PoolStats`.
#[derive(Debug, Default)]
struct Counters {
    /// Number of connections handed out to queries.
    borrowed: AtomicU64,

    /// Number of connections closed after use.
    evicted: AtomicU64,

    /// Number of connections returned to the pool after use.
    returned: AtomicU64,
}

/// Owner of the connection pool.  Cloning is cheap and shares the same pool.
#[derive(Clone, Debug)]
pub struct PoolManager {
    /// Shared connection pool.
    pool: AnyPool,

    /// What to do with connections once a query is done with them.
    policy: ReleasePolicy,

    /// Connection accounting.
    counters: Arc<Counters>,
}

impl PoolManager {
    /// Creates a pool manager with the `opts` connection options.
    ///
    /// This operation is lazy: connections are only established when queries need them.  It must
    /// be called from within a Tokio runtime because the pool spawns its maintenance task here.
    pub fn connect(opts: PoolOptions) -> DbResult<Self> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DbError::BackendError(
                "Pool manager must be created within a Tokio runtime".to_owned(),
            ));
        }

        sqlx::any::install_default_drivers();

        let url = opts.url()?;
        info!(
            "Initializing pool manager for {} with up to {} connections (release policy {:?})",
            url.scheme(),
            opts.max_pool_size,
            opts.release_policy
        );
        let pool = AnyPoolOptions::new()
            .max_connections(opts.max_pool_size)
            .max_lifetime(Some(opts.max_lifetime))
            .acquire_timeout(opts.acquire_timeout)
            .connect_lazy(url.as_str())
            .map_err(map_sqlx_error)?;

        Ok(Self { pool, policy: opts.release_policy, counters: Arc::from(Counters::default()) })
    }

    /// Creates a new query for the `sql` statement against this pool.
    pub fn create_query<S: Into<String>>(&self, sql: S) -> SqlQuery {
        SqlQuery::new(sql, self)
    }

    /// Runs the statements in `script` directly on the pool, without parameters.
    ///
    /// This is meant for schema initialization and does not count towards `stats`.
    pub async fn execute_script(&self, script: &str) -> DbResult<()> {
        sqlx::raw_sql(script).execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Borrows a connection from the pool and prepares `sql` on it.
    ///
    /// A connection on which `sql` cannot be prepared is evicted right away.
    pub(crate) async fn borrow(
        &self,
        sql: &str,
    ) -> DbResult<(PoolConnection<Any>, AnyStatement<'static>)> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        self.counters.borrowed.fetch_add(1, Ordering::SeqCst);
        debug!("Borrowed connection to prepare: {}", sql);

        let prepared = (&mut *conn).prepare(sql).await.map(|stmt| sqlx::Statement::to_owned(&stmt));
        match prepared {
            Ok(stmt) => Ok((conn, stmt)),
            Err(e) => {
                warn!("Evicting connection after failing to prepare statement: {}", e);
                self.evict(conn);
                Err(map_sqlx_error(e))
            }
        }
    }

    /// Gives back a connection previously obtained with `borrow`.
    pub(crate) fn release(&self, conn: PoolConnection<Any>) {
        match self.policy {
            ReleasePolicy::Evict => self.evict(conn),
            ReleasePolicy::Reuse => {
                drop(conn);
                self.counters.returned.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Closes a connection instead of returning it to the pool.
    fn evict(&self, mut conn: PoolConnection<Any>) {
        conn.close_on_drop();
        drop(conn);
        self.counters.evicted.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the connection accounting so far.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            borrowed: self.counters.borrowed.load(Ordering::SeqCst),
            evicted: self.counters.evicted.load(Ordering::SeqCst),
            returned: self.counters.returned.load(Ordering::SeqCst),
        }
    }

    /// Closes the pool, waiting for all borrowed connections to be released.
    pub async fn close(&self) {
        info!("Closing pool manager");
        self.pool.close().await;
    }
}
