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

//! Data types for the key/value store.

use derive_getters::Getters;
use derive_more::{AsRef, Constructor};
use rms_core::result::Outcome;
use rms_sql::{DbError, DbResult};
use serde::{Deserialize, Serialize};

/// Name of an entry in the store.
#[derive(AsRef, Clone, Constructor, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub(crate) struct Key(String);

/// Revision number of a key, starting at 1 and bumped on every update.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct Version(u32);

impl Version {
    /// Returns the initial version assigned to new keys.
    pub(crate) fn initial() -> Version {
        Version(1)
    }

    /// Returns the next version to assign to an existing key.
    pub(crate) fn next(self) -> DbResult<Version> {
        match self.0.checked_add(1) {
            Some(version) => Ok(Version(version)),
            None => Err(DbError::DataIntegrityError(format!(
                "Version {} cannot be incremented",
                self.0
            ))),
        }
    }

    /// Creates a version from its database representation with range validation.
    pub(crate) fn from_i64(version: i64) -> DbResult<Version> {
        match u32::try_from(version) {
            Ok(version) => Ok(Version(version)),
            Err(e) => Err(DbError::DataIntegrityError(format!(
                "Version {} cannot be represented: {}",
                version, e
            ))),
        }
    }

    /// Creates a version from a `u32`.
    #[cfg(test)]
    pub(crate) fn from_u32(version: u32) -> Version {
        Version(version)
    }

    /// Returns the version in its database representation.
    pub(crate) fn as_i64(&self) -> i64 {
        i64::from(self.0)
    }
}

/// Current contents of a key.
#[derive(Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub(crate) struct Entry {
    /// The key's raw value.
    value: String,

    /// The key's current version number.
    version: Version,
}

/// Body of a request to set a key.
#[derive(Deserialize)]
#[cfg_attr(test, derive(Serialize))]
pub(crate) struct PutRequest {
    /// New value for the key.
    pub(crate) value: String,
}

/// Listing of all keys in the store.
#[derive(Constructor, Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct KeyList {
    /// Names of all keys, sorted.
    keys: Vec<Key>,
}

/// Details of a result code that the service can report.
#[derive(Constructor, Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct OutcomeDetails {
    /// The outcome registered under the requested code.
    outcome: Outcome,
}
