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

//! Registry of declared outcomes indexed by code.

use super::{builtin, Outcome};
use log::warn;
use std::collections::HashMap;

/// Registry of declared outcomes indexed by code.
///
/// The bank is populated once during startup with `load` and is then meant to be shared
/// read-only, typically behind an `Arc`.
#[derive(Debug, Default)]
pub struct ResultBank {
    /// Declared outcomes keyed by their code.
    outcomes: HashMap<i32, Outcome>,
}

impl ResultBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bank that contains the framework's builtin outcomes.
    pub fn with_builtins() -> Self {
        let mut bank = Self::new();
        bank.load(builtin::ALL);
        bank
    }

    /// Registers every outcome in `group`.
    ///
    /// Registering an outcome whose code is already known replaces the previous entry and logs a
    /// warning, as this almost always indicates a copy/paste mistake in a catalogue.
    pub fn load(&mut self, group: &[Outcome]) {
        for outcome in group {
            if let Some(previous) = self.outcomes.insert(outcome.code(), outcome.clone()) {
                warn!(
                    "Duplicate result code {}: '{}' replaced by '{}'",
                    outcome.code(),
                    previous.message(),
                    outcome.message()
                );
            }
        }
    }

    /// Returns the outcome registered under `code`, or a captured error if there is none.
    pub fn get(&self, code: i32) -> Outcome {
        match self.outcomes.get(&code) {
            Some(outcome) => outcome.clone(),
            None => Outcome::from_message(format!("Could not find code: {}", code)),
        }
    }

    /// Returns the outcome registered under `code`, if any.
    pub fn lookup(&self, code: i32) -> Option<&Outcome> {
        self.outcomes.get(&code)
    }

    /// Returns the number of registered outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no outcomes have been registered.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::EXCEPTION_CODE;
    use http::StatusCode;

    const FIRST: Outcome = Outcome::declare(100, "First", StatusCode::BAD_REQUEST);
    const SECOND: Outcome = Outcome::declare(101, "Second", StatusCode::NOT_FOUND);
    const CLASH: Outcome = Outcome::declare(100, "Clash", StatusCode::CONFLICT);

    #[test]
    fn test_load_and_get() {
        let mut bank = ResultBank::new();
        assert!(bank.is_empty());
        bank.load(&[FIRST, SECOND]);
        assert_eq!(2, bank.len());

        let first = bank.get(100);
        assert_eq!("First", first.message());
        assert_eq!(StatusCode::BAD_REQUEST, first.status());
        assert_eq!(Some(&SECOND), bank.lookup(101));
    }

    #[test]
    fn test_get_missing() {
        let bank = ResultBank::new();
        let outcome = bank.get(55);
        assert_eq!(EXCEPTION_CODE, outcome.code());
        assert_eq!("Could not find code: 55", outcome.exception().unwrap().error().to_string());
        assert!(bank.lookup(55).is_none());
    }

    #[test]
    fn test_duplicate_code_keeps_last() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut bank = ResultBank::new();
        bank.load(&[FIRST]);
        bank.load(&[SECOND, CLASH]);
        assert_eq!(2, bank.len());
        assert_eq!("Clash", bank.get(100).message());
        assert_eq!(StatusCode::CONFLICT, bank.get(100).status());

        // The earlier constant remains usable on its own.
        assert_eq!("First", FIRST.message());
    }

    #[test]
    fn test_with_builtins() {
        let bank = ResultBank::with_builtins();
        assert_eq!(builtin::ALL.len(), bank.len());
        assert_eq!(Some(&Outcome::UNDECLARED), bank.lookup(-2));
        assert_eq!("Valid", bank.get(0).message());
    }
}
