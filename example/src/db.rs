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

//! Database abstraction to persist the key/value store.
//!
//! Statements use numbered placeholders, which both PostgreSQL and SQLite understand.

use crate::model::*;
use crate::outcomes::{KEY_NOT_FOUND, KEY_VERSION_CONFLICT};
use rms_core::result::{Outcome, Resulted};
use rms_sql::{DbError, DbResult, PoolManager, SqlResult, SqlType};
use std::collections::BTreeSet;

/// Schema of the store.
const SCHEMA: &str = include_str!("schema.sql");

/// Creates the schema of the store if it does not exist yet.
pub(crate) async fn init_schema(pm: &PoolManager) -> DbResult<()> {
    pm.execute_script(SCHEMA).await
}

/// Reads an `Entry` from the current row of `rows`.
fn read_entry(rows: &SqlResult) -> DbResult<Entry> {
    let value: String = rows.get("value")?;
    let version = Version::from_i64(rows.get("version")?)?;
    Ok(Entry::new(value, version))
}

/// Gets a list of all existing keys.
pub(crate) async fn get_keys(pm: &PoolManager) -> Resulted<BTreeSet<Key>> {
    let mut query = pm.create_query("SELECT key FROM store ORDER BY key");
    let mut rows = query.execute_query().await;
    if rows.with_result() {
        return Resulted::propagate(rows);
    }

    let rows = rows.value_mut();
    let mut keys = BTreeSet::default();
    while rows.next_row().is_some() {
        match rows.get::<String>("key") {
            Ok(key) => keys.insert(Key::new(key)),
            Err(e) => return Resulted::from_exception(e),
        };
    }
    Resulted::ok(keys)
}

/// Gets the current value of the given `key`.
pub(crate) async fn get_key(pm: &PoolManager, key: &Key) -> Resulted<Entry> {
    let mut query = pm.create_query("SELECT value, version FROM store WHERE key = $1");
    query.set(SqlType::Varchar, key.as_ref());
    let mut rows = query.execute_query().await;
    if rows.with_result() {
        return Resulted::propagate(rows);
    }

    let rows = rows.value_mut();
    if rows.next_row().is_none() {
        return Resulted::from_result(KEY_NOT_FOUND);
    }
    read_entry(rows).into()
}

/// Gets the current version of the given `key`, or `None` if it does not exist.
pub(crate) async fn get_key_version(pm: &PoolManager, key: &Key) -> Resulted<Option<Version>> {
    let mut query = pm.create_query("SELECT version FROM store WHERE key = $1");
    query.set(SqlType::Varchar, key.as_ref());
    let mut rows = query.execute_query().await;
    if rows.with_result() {
        return Resulted::propagate(rows);
    }

    let rows = rows.value_mut();
    if rows.next_row().is_none() {
        return Resulted::ok(None);
    }
    rows.get::<i64>("version").and_then(Version::from_i64).map(Some).into()
}

/// Sets `key` to `entry`, which includes its value and version.
///
/// `entry` must carry the version that follows the one currently stored, or the initial version
/// for new keys.  Otherwise, somebody else updated the key in the meantime and this fails with
/// `KEY_VERSION_CONFLICT`.
pub(crate) async fn set_key(pm: &PoolManager, key: &Key, entry: &Entry) -> Outcome {
    let mut query = pm.create_query(
        "INSERT INTO store (key, value, version) VALUES ($1, $2, $3)
        ON CONFLICT (key) DO UPDATE SET value = excluded.value, version = excluded.version
        WHERE store.version = excluded.version - 1",
    );
    query
        .set(SqlType::Varchar, key.as_ref())
        .set(SqlType::LongVarchar, entry.value())
        .set(SqlType::BigInt, entry.version().as_i64());
    match query.execute_update().await.into_result() {
        Ok(1) => Outcome::VALID,
        Ok(0) => KEY_VERSION_CONFLICT,
        Ok(n) => Outcome::from_exception(DbError::BackendError(format!(
            "Update affected {} rows",
            n
        ))),
        Err(outcome) => {
            let duplicate = outcome
                .exception()
                .and_then(|e| e.error().downcast_ref::<DbError>())
                .is_some_and(|e| *e == DbError::AlreadyExists);
            if duplicate {
                KEY_VERSION_CONFLICT
            } else {
                outcome
            }
        }
    }
}

/// Deletes `key`.
pub(crate) async fn delete_key(pm: &PoolManager, key: &Key) -> Outcome {
    let mut query = pm.create_query("DELETE FROM store WHERE key = $1");
    query.set(SqlType::Varchar, key.as_ref());
    match query.execute_update().await.into_result() {
        Ok(0) => KEY_NOT_FOUND,
        Ok(_) => Outcome::VALID,
        Err(outcome) => outcome,
    }
}
