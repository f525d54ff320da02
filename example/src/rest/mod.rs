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

//! Entry point to the REST server.

use crate::driver::Driver;
use axum::extract::FromRef;
use axum::Router;
use rms_core::result::ResultBank;
use std::sync::Arc;

mod key_delete;
mod key_get;
mod key_put;
mod keys_get;
mod outcome_get;
#[cfg(test)]
mod testutils;

/// State shared by all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Business logic.
    driver: Driver,

    /// Every outcome the service can report, by code.
    bank: Arc<ResultBank>,
}

impl FromRef<AppState> for Driver {
    fn from_ref(state: &AppState) -> Self {
        state.driver.clone()
    }
}

impl FromRef<AppState> for Arc<ResultBank> {
    fn from_ref(state: &AppState) -> Self {
        state.bank.clone()
    }
}

/// Creates the router for the application.
pub(crate) fn app(driver: Driver, bank: ResultBank) -> Router {
    use axum::routing::get;
    let state = AppState { driver, bank: Arc::from(bank) };
    Router::new()
        .route(
            "/keys/:key",
            get(key_get::handler).put(key_put::handler).delete(key_delete::handler),
        )
        .route("/keys", get(keys_get::handler))
        .route("/outcomes/:code", get(outcome_get::handler))
        .with_state(state)
}
