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

//! Business logic for the service.

use crate::db;
use crate::model::*;
use rms_core::result::{Outcome, Resulted};
use rms_sql::PoolManager;

/// Business logic.
///
/// The public operations exposed by the driver are all "one shot": they borrow a connection for
/// every query they issue and give it back as soon as the query is done.
#[derive(Clone)]
pub(crate) struct Driver {
    /// The pool that the driver uses for persistence.
    pm: PoolManager,
}

impl Driver {
    /// Creates a new driver backed by the given injected components.
    pub(crate) fn new(pm: PoolManager) -> Self {
        Self { pm }
    }

    /// Deletes an existing `key`.
    pub(crate) async fn delete_key(self, key: &Key) -> Outcome {
        db::delete_key(&self.pm, key).await
    }

    /// Gets the current value of the given `key`.
    pub(crate) async fn get_key(self, key: &Key) -> Resulted<Entry> {
        db::get_key(&self.pm, key).await
    }

    /// Gets a list of all existing keys.
    pub(crate) async fn get_keys(self) -> Resulted<KeyList> {
        db::get_keys(&self.pm).await.map(|keys| KeyList::new(keys.into_iter().collect()))
    }

    /// Sets `key` to `value`, incrementing its version.
    pub(crate) async fn set_key(self, key: &Key, value: String) -> Resulted<Entry> {
        let version = db::get_key_version(&self.pm, key).await;
        if version.with_result() {
            return Resulted::propagate(version);
        }
        let version = match version.into_value() {
            Some(current) => match current.next() {
                Ok(next) => next,
                Err(e) => return Resulted::from_exception(e),
            },
            None => Version::initial(),
        };

        let entry = Entry::new(value, version);
        let outcome = db::set_key(&self.pm, key, &entry).await;
        if outcome.is_valid() {
            Resulted::ok(entry)
        } else {
            Resulted::from_result(outcome)
        }
    }
}
