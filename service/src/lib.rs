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

//! Bootstrap of a service from its configuration document.
//!
//! A `Service` is built from a `ServiceConfig`, which says where to listen and, optionally, which
//! database to connect to.  The application then obtains the `PoolManager` from the service to
//! build its router, and hands the router back to the service to be served under the configured
//! path prefix.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use axum::Router;
use log::{error, info};
use rms_core::config::ConfigError;
use rms_sql::{DbError, PoolManager};
use std::future::Future;
use std::io;
use tokio::net::TcpListener;

mod config;
pub use config::ServiceConfig;

/// Service bootstrap errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Indicates an invalid configuration document.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Indicates a failure setting up the database.
    #[error("{0}")]
    Db(#[from] DbError),

    /// Indicates a failure binding or serving the listening socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for this crate.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A configured service, ready to serve an application router.
pub struct Service {
    /// Configuration the service was built from.
    config: ServiceConfig,

    /// Database pool, if a database is configured.
    pm: Option<PoolManager>,
}

impl Service {
    /// Prepares the service described by `config`, creating the database pool if needed.
    ///
    /// When a database is configured, this must be called from within a Tokio runtime.
    pub fn new(config: ServiceConfig) -> ServiceResult<Self> {
        let pm = match config.db.as_ref() {
            Some(opts) => Some(PoolManager::connect(opts.clone())?),
            None => {
                info!("No database configured");
                None
            }
        };
        Ok(Self { config, pm })
    }

    /// Returns the configuration of the service.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the database pool, or `None` if no database is configured.
    pub fn pool_manager(&self) -> Option<&PoolManager> {
        self.pm.as_ref()
    }

    /// Mounts `app` under the configured path prefix.
    pub fn router(&self, app: Router) -> Router {
        let base_path = self.config.base_path();
        if base_path.is_empty() {
            app
        } else {
            Router::new().nest(&base_path, app)
        }
    }

    /// Binds the listening socket on the configured host and port.
    pub async fn bind(&self) -> ServiceResult<TcpListener> {
        let listener =
            TcpListener::bind((self.config.hostname.as_str(), self.config.port)).await?;
        Ok(listener)
    }

    /// Serves `app` until the process receives Ctrl+C.
    pub async fn serve(self, app: Router) -> ServiceResult<()> {
        let listener = self.bind().await?;
        self.serve_with_shutdown(listener, app, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for Ctrl+C: {}", e);
            }
        })
        .await
    }

    /// Serves `app` on `listener` until `signal` completes, then closes the database pool.
    pub async fn serve_with_shutdown<F>(
        self,
        listener: TcpListener,
        app: Router,
        signal: F,
    ) -> ServiceResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router(app);
        info!("Serving {} on {}", self.config.base_url(), listener.local_addr()?);
        axum::serve(listener, router).with_graceful_shutdown(signal).await?;

        info!("Shutting down");
        if let Some(pm) = self.pm {
            pm.close().await;
        }
        Ok(())
    }
}
