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

//! API to create or update a key.

use crate::driver::Driver;
use crate::model::{Key, PutRequest, Version};
use axum::extract::{Path, State};
use axum::http;
use axum::response::{IntoResponse, Response};
use rms_core::rest::JsonBody;

/// API handler.
///
/// Responds with `201 Created` when the key did not exist before.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(key): Path<Key>,
    JsonBody(request): JsonBody<PutRequest>,
) -> Response {
    let entry = driver.set_key(&key, request.value).await;
    let created = entry.as_value().is_some_and(|entry| *entry.version() == Version::initial());

    let mut response = entry.into_response();
    if created {
        *response.status_mut() = http::StatusCode::CREATED;
    }
    response
}
