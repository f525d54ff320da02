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

//! Outcomes declared by the key/value store.

use axum::http::StatusCode;
use rms_core::result::{Outcome, ResultBank};

/// The requested key does not exist.
pub(crate) const KEY_NOT_FOUND: Outcome =
    Outcome::declare(1000, "Key not found", StatusCode::NOT_FOUND);

/// The key was modified concurrently by another request.
pub(crate) const KEY_VERSION_CONFLICT: Outcome =
    Outcome::declare(1001, "Key was modified concurrently", StatusCode::CONFLICT);

/// All outcomes of this service.
pub(crate) const ALL: &[Outcome] = &[KEY_NOT_FOUND, KEY_VERSION_CONFLICT];

/// Builds the bank of every outcome this service can report.
pub(crate) fn bank() -> ResultBank {
    let mut bank = ResultBank::with_builtins();
    bank.load(ALL);
    bank
}

#[cfg(test)]
mod tests {
    use super::*;
    use rms_core::result::builtin;

    #[test]
    fn test_bank_has_app_and_builtin_outcomes() {
        let bank = bank();
        assert_eq!(Some(&KEY_NOT_FOUND), bank.lookup(1000));
        assert_eq!("Key was modified concurrently", bank.get(1001).message());
        assert_eq!(Some(&builtin::JSON_PARSE), bank.lookup(builtin::JSON_PARSE.code()));
    }
}
