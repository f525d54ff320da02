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

//! Test utilities for the REST API.

use crate::db;
use crate::driver::Driver;
use crate::model::*;
use crate::outcomes;
use crate::rest::app;
use axum::Router;
use rms_core::result::{Outcome, Resulted};

/// State of a REST test: an app backed by a scratch database.
pub(crate) struct TestContext {
    /// Scratch database, kept alive for as long as the app.
    db: rms_sql::testutils::TestContext,

    /// The app under test.
    app: Router,
}

impl TestContext {
    /// Creates an app on top of an empty store.
    pub(crate) async fn setup() -> Self {
        let db = rms_sql::testutils::TestContext::sqlite();
        db::init_schema(&db.pm).await.unwrap();
        let app = app(Driver::new(db.pm.clone()), outcomes::bank());
        Self { db, app }
    }

    /// Returns a copy of the app.
    ///
    /// The app shares the scratch database with this context, so the context must outlive any
    /// request sent to the returned app.
    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    /// Stores `value` under `key` with an explicit `version`.
    pub(crate) async fn set_key<K: Into<String>, V: Into<String>>(
        &self,
        key: K,
        value: V,
        version: u32,
    ) {
        let entry = Entry::new(value.into(), Version::from_u32(version));
        let outcome = db::set_key(&self.db.pm, &Key::new(key.into()), &entry).await;
        assert_eq!(Outcome::VALID, outcome);
    }

    /// Returns true if `key` exists.
    pub(crate) async fn has_key<K: Into<String>>(&self, key: K) -> bool {
        db::get_key_version(&self.db.pm, &Key::new(key.into())).await.into_value().is_some()
    }

    /// Gets the current contents of `key`, which must exist.
    pub(crate) async fn get_key<K: Into<String>>(&self, key: K) -> Entry {
        let entry: Resulted<Entry> = db::get_key(&self.db.pm, &Key::new(key.into())).await;
        entry.into_value()
    }
}
