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

//! API to describe a result code.

use crate::model::OutcomeDetails;
use axum::extract::{Path, State};
use rms_core::rest::EmptyBody;
use rms_core::result::{builtin, ResultBank, Resulted};
use std::sync::Arc;

/// API handler.
pub(crate) async fn handler(
    State(bank): State<Arc<ResultBank>>,
    Path(code): Path<i32>,
    _: EmptyBody,
) -> Resulted<OutcomeDetails> {
    match bank.lookup(code) {
        Some(outcome) => Resulted::ok(OutcomeDetails::new(outcome.clone())),
        None => Resulted::from_result(builtin::NO_VALUE_FOUND),
    }
}
